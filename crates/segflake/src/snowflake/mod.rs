mod config;
mod generator;
mod layout;
mod policy;
mod status;

pub use config::*;
pub use generator::*;
pub use layout::*;
pub use policy::*;
pub use status::*;
