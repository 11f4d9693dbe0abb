use std::fmt;
use std::path::PathBuf;

/// Custom error types for guardian
#[derive(Debug)]
pub enum GuardianError {
    /// File system related errors
    FileSystem { source: std::io::Error, path: PathBuf },

    /// FFmpeg/ffprobe invocation errors
    FFmpeg { message: String, stderr: Option<String> },

    /// Configuration validation errors
    Config { field: String, message: String },

    /// An embedded subtitle track could not be read
    Subtitle { message: String },

    /// Unsupported file format
    UnsupportedFormat { extension: String, supported: Vec<String> },

    /// Missing external dependency
    MissingDependency { name: String, suggestion: String },

    /// Input media file does not exist
    InputNotFound { path: PathBuf },

    /// Neither a sidecar nor an embedded subtitle track could be loaded
    NoSubtitles { path: PathBuf },

    /// A subprocess exceeded its time budget
    Timeout { command: String, seconds: u64 },

    /// General processing error
    Processing { message: String },
}

impl fmt::Display for GuardianError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardianError::FileSystem { source, path } => {
                write!(f, "File system error for '{}': {}", path.display(), source)
            }
            GuardianError::FFmpeg { message, stderr } => {
                write!(f, "FFmpeg error: {}", message)?;
                if let Some(stderr) = stderr {
                    write!(f, "\nStderr: {}", stderr)?;
                }
                Ok(())
            }
            GuardianError::Config { field, message } => {
                write!(f, "Configuration error in '{}': {}", field, message)
            }
            GuardianError::Subtitle { message } => {
                write!(f, "Subtitle error: {}", message)
            }
            GuardianError::UnsupportedFormat { extension, supported } => {
                write!(
                    f,
                    "Unsupported file format '{}'. Supported formats: {}",
                    extension,
                    supported.join(", ")
                )
            }
            GuardianError::MissingDependency { name, suggestion } => {
                write!(f, "Missing dependency '{}': {}", name, suggestion)
            }
            GuardianError::InputNotFound { path } => {
                write!(f, "Input file not found: {}", path.display())
            }
            GuardianError::NoSubtitles { path } => {
                write!(
                    f,
                    "No subtitle data available for '{}' (no sidecar .srt and no usable embedded track)",
                    path.display()
                )
            }
            GuardianError::Timeout { command, seconds } => {
                write!(f, "'{}' timed out after {} seconds", command, seconds)
            }
            GuardianError::Processing { message } => {
                write!(f, "Processing error: {}", message)
            }
        }
    }
}

impl std::error::Error for GuardianError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GuardianError::FileSystem { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for guardian operations
pub type Result<T> = std::result::Result<T, GuardianError>;

/// Helper function to create FFmpeg errors
pub fn ffmpeg_error(message: impl Into<String>, stderr: Option<String>) -> GuardianError {
    GuardianError::FFmpeg {
        message: message.into(),
        stderr,
    }
}

/// Helper function to create configuration errors
pub fn config_error(field: impl Into<String>, message: impl Into<String>) -> GuardianError {
    GuardianError::Config {
        field: field.into(),
        message: message.into(),
    }
}

/// Helper function to create file system errors
pub fn fs_error(source: std::io::Error, path: PathBuf) -> GuardianError {
    GuardianError::FileSystem { source, path }
}

/// Trait for converting io errors to GuardianError
pub trait IntoGuardianError<T> {
    fn with_path(self, path: PathBuf) -> Result<T>;
}

impl<T> IntoGuardianError<T> for std::result::Result<T, std::io::Error> {
    fn with_path(self, path: PathBuf) -> Result<T> {
        self.map_err(|e| fs_error(e, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffmpeg_error_includes_stderr() {
        let err = ffmpeg_error("transcode failed", Some("Permission denied".to_string()));
        let text = err.to_string();
        assert!(text.contains("transcode failed"));
        assert!(text.contains("Permission denied"));
    }

    #[test]
    fn test_with_path_preserves_source() {
        let io: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        ));
        let err = io.with_path(PathBuf::from("/tmp/missing.srt")).unwrap_err();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/tmp/missing.srt"));
    }

    #[test]
    fn test_timeout_display() {
        let err = GuardianError::Timeout {
            command: "ffmpeg".to_string(),
            seconds: 30,
        };
        assert_eq!(err.to_string(), "'ffmpeg' timed out after 30 seconds");
    }
}
