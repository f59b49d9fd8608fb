pub mod context;
pub mod endpoint;
pub mod promise;
pub mod retry;
pub mod runtime;
pub mod saga;

pub use context::{
    Awakeable, Context, ObjectContext, SharedObjectContext, SharedWorkflowContext,
    WorkflowContext,
};
pub use endpoint::{
    decode_input, encode_output, unknown_handler, Endpoint, HandlerDef, HandlerKind, Service,
    ServiceKind,
};
pub use retry::RetryPolicy;
pub use runtime::{LocalRuntime, Target};
pub use saga::Compensations;
pub use crate::utils::error::Result;
