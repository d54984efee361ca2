mod health;
mod streaming;

pub use health::health_routes;
pub use streaming::{streaming_routes, STREAMING_PATH};
