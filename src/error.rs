use std::fmt;

#[derive(Debug)]
pub enum ChirographError {
    /// The certificate input or a slot definition is unusable. Raised before
    /// any layout work starts.
    Config(String),
    /// An encoder refused the payload of one slot.
    Encoding {
        slot: String,
        symbology: String,
        message: String,
    },
    /// Fonts, raster surfaces, or the output destination failed.
    RenderBackend(String),
    UnsupportedFormat(String),
    /// The injected random source failed or produced a value outside `[0, 1)`.
    Randomness(String),
    Io(std::io::Error),
}

impl ChirographError {
    /// Short stable tag for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ChirographError::Config(_) => "config",
            ChirographError::Encoding { .. } => "encoding",
            ChirographError::RenderBackend(_) => "render_backend",
            ChirographError::UnsupportedFormat(_) => "unsupported_format",
            ChirographError::Randomness(_) => "randomness",
            ChirographError::Io(_) => "io",
        }
    }
}

impl fmt::Display for ChirographError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChirographError::Config(message) => write!(f, "invalid configuration: {}", message),
            ChirographError::Encoding {
                slot,
                symbology,
                message,
            } => write!(
                f,
                "{} encoder rejected payload for slot {}: {}",
                symbology, slot, message
            ),
            ChirographError::RenderBackend(message) => {
                write!(f, "render backend error: {}", message)
            }
            ChirographError::UnsupportedFormat(format) => {
                write!(
                    f,
                    "unsupported output format '{}' (expected svg, pdf, eps or png)",
                    format
                )
            }
            ChirographError::Randomness(message) => {
                write!(f, "randomness source failed: {}", message)
            }
            ChirographError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for ChirographError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChirographError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ChirographError {
    fn from(value: std::io::Error) -> Self {
        ChirographError::Io(value)
    }
}
