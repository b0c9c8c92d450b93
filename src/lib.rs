pub mod config;
pub mod errors;
pub mod model;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod traits;
pub mod web;

pub mod mocks;

pub use config::Config;
pub use errors::{Result, SegError};
pub use model::{OnnxModel, RawOutput, Variant};
pub use store::MaskStore;
pub use traits::*;
pub use web::{router, AppState};
