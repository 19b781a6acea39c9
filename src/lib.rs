pub mod config;
pub mod normalizer;
pub mod server;

pub use normalizer::{ImageAsset, NormalizeError, NormalizedImage, Normalizer};

/// Shared helpers for the binaries and the HTTP front end
pub mod util {
    use tracing_subscriber::EnvFilter;

    /// Prefix the source application puts in front of stored logos for display
    pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

    /// Install the global tracing subscriber. `RUST_LOG` wins over the
    /// configured `default_filter`
    pub fn init_tracing(default_filter: &str) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        // A subscriber may already be installed (tests, embedding apps)
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }

    /// Strip a `data:<mime>;base64,` prefix, if any, returning the declared
    /// mime type alongside the base64 body
    pub fn split_data_uri(input: &str) -> (Option<&str>, &str) {
        let trimmed = input.trim();
        let Some(rest) = trimmed.strip_prefix("data:") else {
            return (None, trimmed);
        };
        match rest.split_once(',') {
            Some((meta, body)) => {
                let mime = meta.strip_suffix(";base64").unwrap_or(meta);
                let mime = (!mime.is_empty()).then_some(mime);
                (mime, body)
            }
            None => (None, trimmed),
        }
    }

}
