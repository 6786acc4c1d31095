use serde::Deserialize;
use std::sync::Arc;

use charsets::{CharsetError, Charsets, ConvertOptions};

use crate::event_loop::LoopHandle;
use crate::handle::HandleContext;

/// Kernel settings, read from JSON; every field has a default
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    /// Encoding used when a text write names none
    pub default_encoding: String,
    /// Upper bound on the size of one read chunk
    pub read_chunk_size: usize,
    /// Writes outstanding at which a handle counts as congested
    pub write_high_water_mark: usize,
    /// Report malformed and unmappable sequences instead of replacing them
    pub strict_conversions: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            default_encoding: "utf8".to_string(),
            read_chunk_size: 64 * 1024,
            write_high_water_mark: 16,
            strict_conversions: false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read kernel config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse kernel config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid kernel config: {0}")]
    Invalid(String),
    #[error("Invalid kernel config: {0}")]
    Charset(#[from] CharsetError),
}

impl KernelConfig {
    /// Read and validate JSON from `reader`
    ///
    /// # Errors
    ///
    /// I/O and JSON errors, and the validation errors of `validate`.
    pub fn from_reader(mut reader: impl std::io::Read) -> Result<Self, ConfigError> {
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        let config: Self = serde_json::from_slice(&buffer)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// As `from_reader`.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::from_reader(json.as_bytes())
    }

    /// # Errors
    ///
    /// Zero sizes, or a default encoding the registry does not know.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_chunk_size == 0 {
            return Err(ConfigError::Invalid("read_chunk_size must be positive".into()));
        }
        if self.write_high_water_mark == 0 {
            return Err(ConfigError::Invalid(
                "write_high_water_mark must be positive".into(),
            ));
        }
        self.charsets().map(|_| ())
    }

    /// # Errors
    ///
    /// `default_encoding` is unknown.
    pub fn charsets(&self) -> Result<Charsets, ConfigError> {
        Ok(Charsets::with_default(&self.default_encoding)?)
    }

    #[must_use]
    pub fn convert_options(&self) -> ConvertOptions {
        if self.strict_conversions {
            ConvertOptions::strict()
        } else {
            ConvertOptions::default()
        }
    }

    /// Context for handles driven by `loop_handle`
    ///
    /// # Errors
    ///
    /// `default_encoding` is unknown.
    pub fn context(&self, loop_handle: LoopHandle) -> Result<HandleContext, ConfigError> {
        let mut ctx = HandleContext::new(loop_handle, Arc::new(self.charsets()?));
        ctx.read_chunk_size = self.read_chunk_size;
        ctx.convert_options = self.convert_options();
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charsets::{Encoding, ErrorAction};

    #[test]
    fn test_defaults_for_missing_fields() {
        let config = KernelConfig::from_json_str(r#"{ "read_chunk_size": 4096 }"#).unwrap();
        assert_eq!(config.read_chunk_size, 4096);
        assert_eq!(config.default_encoding, "utf8");
        assert_eq!(config.convert_options().on_malformed, ErrorAction::Replace);
    }

    #[test]
    fn test_strict_and_default_encoding() {
        let config = KernelConfig::from_json_str(
            r#"{ "default_encoding": "latin1", "strict_conversions": true }"#,
        )
        .unwrap();
        assert_eq!(config.convert_options(), ConvertOptions::strict());
        let default = config.charsets().unwrap().default_encoding();
        assert_eq!(default.name(), "windows-1252");
        assert_ne!(default, Encoding::Utf8);
    }

    #[test]
    fn test_rejects_unknown_encoding() {
        let err = KernelConfig::from_json_str(r#"{ "default_encoding": "klingon" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Charset(_)));
    }

    #[test]
    fn test_rejects_zero_chunk() {
        let err = KernelConfig::from_json_str(r#"{ "read_chunk_size": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(matches!(
            KernelConfig::from_json_str("{ nope"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_errors_keep_their_source() {
        use crate::completion::IoError;
        use crate::handle::HandleError;
        use std::error::Error;

        let err = KernelConfig::from_json_str(r#"{ "default_encoding": "klingon" }"#).unwrap_err();
        assert!(err.to_string().starts_with("Invalid kernel config: "));
        assert!(err.source().is_some());

        let err = KernelConfig::from_reader(std::io::empty()).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));

        let err = HandleError::from(CharsetError::UnknownEncoding("klingon".into()));
        assert_eq!(err.code(), "EINVAL");
        assert!(err.source().is_some());

        let err = IoError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe));
        assert!(err.to_string().starts_with("EPIPE: "));
    }
}
