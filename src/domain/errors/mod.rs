//! Domain error types.

mod invalid_request;
mod pipeline_error;

pub use invalid_request::InvalidRequest;
pub use pipeline_error::{PipelineError, PipelineResult};
