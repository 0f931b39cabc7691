//! Input collection: named step inputs and the ambient run context.

pub mod context;
pub mod inputs;

pub use context::RunContext;
pub use inputs::{CollectedInputs, EnvInputSource, InputSource, InputSpec, InputTable, collect};
