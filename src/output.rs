use crate::error::ChirographError;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Svg,
    Pdf,
    Eps,
    Png,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Svg,
        OutputFormat::Pdf,
        OutputFormat::Eps,
        OutputFormat::Png,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Pdf => "pdf",
            OutputFormat::Eps => "eps",
            OutputFormat::Png => "png",
        }
    }

    pub fn extension(self) -> &'static str {
        self.as_str()
    }

    /// `prefix` with this format's extension appended, as the command line
    /// names its output files.
    pub fn output_path(self, prefix: &str) -> PathBuf {
        PathBuf::from(format!("{prefix}.{}", self.extension()))
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ChirographError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        OutputFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == normalized)
            .ok_or_else(|| ChirographError::UnsupportedFormat(value.to_string()))
    }
}

/// Writes `bytes` to `path` through a temporary file in the same directory.
/// The destination only appears once every byte is on disk.
pub fn write_output_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> Result<(), ChirographError> {
    let path = path.as_ref();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let backend = |err: std::io::Error| {
        ChirographError::RenderBackend(format!("cannot write {}: {err}", path.display()))
    };
    let mut file = tempfile::NamedTempFile::new_in(&dir).map_err(backend)?;
    file.write_all(bytes).map_err(backend)?;
    file.as_file().sync_all().map_err(backend)?;
    file.persist(path).map_err(|err| backend(err.error))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("svg".parse::<OutputFormat>().unwrap(), OutputFormat::Svg);
        assert_eq!(" PDF ".parse::<OutputFormat>().unwrap(), OutputFormat::Pdf);
        assert_eq!("png".parse::<OutputFormat>().unwrap().extension(), "png");
        let err = "docx".parse::<OutputFormat>().unwrap_err();
        assert!(matches!(err, ChirographError::UnsupportedFormat(ref f) if f == "docx"));
    }

    #[test]
    fn output_path_appends_the_extension() {
        assert_eq!(OutputFormat::Eps.output_path("out"), PathBuf::from("out.eps"));
    }

    #[test]
    fn atomic_write_replaces_the_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.svg");
        std::fs::write(&path, b"old").unwrap();
        write_output_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn missing_directory_is_a_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("sheet.pdf");
        let err = write_output_atomic(&path, b"x").unwrap_err();
        assert_eq!(err.kind(), "render_backend");
        assert!(!path.exists());
    }
}
