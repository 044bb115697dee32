mod identity_extractor;
mod tracing_layer;
mod metrics_layer;

pub use identity_extractor::*;
pub use tracing_layer::*;
pub use metrics_layer::*;
