//! Flow execution: invokers, the executor and their error types.

pub mod error;
pub mod executor;
pub mod invoker;

pub use error::{DispatchError, ExecutionError, ExecutionFailure, InvokeError};
pub use executor::{ExecutionResult, FlowExecutor, StepOutcome, StepStatus};
pub use invoker::{join_endpoint, merge_config, HttpEndpointInvoker, InvokerRegistry, TaskInvoker};
