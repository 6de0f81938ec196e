mod bit;
mod config;
mod distributor;
mod instance;
mod lease;

pub use bit::*;
pub use config::*;
pub use distributor::*;
pub use instance::*;
pub use lease::*;
