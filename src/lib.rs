pub mod config;
pub mod pipeline;
pub mod report;

pub use pipeline::imaging::{
    DeidentifiedImages, DocumentImageProcessor, ImageArtifact, ImagePipeline, ImagingError,
    ProcessingSummary, Variant,
};
pub use pipeline::import::{MediaType, RawImageInput, RejectReason, ValidationResult};

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` wins over the default
/// filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}
