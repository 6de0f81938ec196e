mod interface;
mod memory_coordinator;
mod memory_repository;

pub use interface::*;
pub use memory_coordinator::*;
pub use memory_repository::*;
