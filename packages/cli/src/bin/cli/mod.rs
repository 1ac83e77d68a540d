pub mod bridge;
pub mod fleet;
pub mod queue;
pub mod utils;
pub mod worker;
