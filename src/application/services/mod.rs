pub mod singleflight;

pub use singleflight::{Abandoned, Role, Singleflight};
