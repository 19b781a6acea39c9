use serde::Deserialize;

/// A logo upload, encoded as base 64. A `data:` URI is accepted too
#[derive(Deserialize)]
pub struct NormalizeRequest {
    pub image: String,

    /// Declared content type, if the client knows it
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl std::fmt::Debug for NormalizeRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NormalizeRequest {{ image: <data>, mime_type: {:?} }}",
            self.mime_type
        )
    }
}
