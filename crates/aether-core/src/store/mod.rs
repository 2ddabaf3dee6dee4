pub mod agent_store;
pub mod flow_store;
pub mod task_store;

pub use agent_store::{AgentStore, StatusUpdate};
pub use flow_store::FlowStore;
pub use task_store::TaskStore;
