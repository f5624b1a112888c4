//! Domain layer with core entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{CacheKey, ImageRequest};
pub use errors::{InvalidRequest, PipelineError, PipelineResult};
pub use ports::{ImageCodecPort, ImageFetchPort};
