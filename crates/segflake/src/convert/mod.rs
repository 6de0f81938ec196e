mod converter;
mod crockford;
mod radix62;

pub use converter::*;
pub use crockford::*;
pub use radix62::*;
