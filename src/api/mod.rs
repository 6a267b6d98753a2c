pub mod http;

pub use http::{build_router, encode_metrics, ApiError, AppState, MetricsServer};
