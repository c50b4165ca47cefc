pub mod auth;
pub mod cors;
pub mod latency;
pub mod tracing;

pub use auth::*;
pub use cors::*;
pub use latency::*;
pub use tracing::*;
