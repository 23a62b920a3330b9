//! Component B — Tool Registry, plus the schema validator and default
//! built-in tool implementations.

pub mod builtin;
pub mod registry;
pub mod schema;

pub use registry::{ToolExecutor, ToolOutcome, ToolRegistry};
pub use schema::ToolSchema;
