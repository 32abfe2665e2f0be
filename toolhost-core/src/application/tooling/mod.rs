mod connection;
mod error;
pub mod glob;
mod registry;
mod rpc;
mod transport;

pub use connection::{CallOutput, ToolServerConnection};
pub use error::ToolInvokeError;
pub use registry::{
    ConnectReport, DEFAULT_HANDSHAKE_TIMEOUT, ServerFailure, TRUNCATION_MARKER, ToolRegistry,
    filter_tools, resolve_target, to_external_tool_schema, truncate_output,
};
