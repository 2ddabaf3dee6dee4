pub mod agent;
pub mod flow;
pub mod task;

pub use agent::*;
pub use flow::*;
pub use task::*;
