pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod workflow;

pub use error::{PipelineError, Result};

/// Installs the fmt subscriber used by the binaries.
///
/// `json` switches to one JSON object per line for serverless log collectors.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rust_image_resizer=info,resize_client=info,resize_handler=info".into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().without_time())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}
