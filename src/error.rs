use thiserror::Error;

#[derive(Error, Debug)]
pub enum PixelsError {
    #[error("Invalid dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: &'static str,
    },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Palette is empty")]
    EmptyPalette,

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Processing error: {0}")]
    Processing(String),
}

impl PixelsError {
    /// Whether the error came from the access gate rather than the transform.
    pub fn is_access_error(&self) -> bool {
        matches!(self, PixelsError::AccessDenied(_))
    }
}

pub type Result<T> = std::result::Result<T, PixelsError>;

// Boundary responses carry the message only
impl serde::Serialize for PixelsError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serializes_as_message() {
        let err = PixelsError::InvalidDimensions {
            width: 0,
            height: 4,
            reason: "image is empty",
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, "\"Invalid dimensions 0x4: image is empty\"");
    }

    #[test]
    fn test_access_errors_are_distinct() {
        assert!(PixelsError::AccessDenied("expired".into()).is_access_error());
        assert!(!PixelsError::EmptyPalette.is_access_error());
    }
}
