//! Lookup and conversion errors.
//!
//! Every error carries a POSIX-style code so that the scripting layer can
//! build its error objects without knowing the variant details:
//!
//! - `EINVAL`: unknown encoding name, malformed arguments
//! - `EILSEQ`: illegal or unmappable sequence found while converting

use std::fmt;

/// POSIX error codes produced by this crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Errno {
    Einval,
    Eilseq,
}

impl Errno {
    /// Numeric value (Linux numbering)
    #[must_use]
    pub fn errno(self) -> i32 {
        match self {
            Self::Einval => 22,
            Self::Eilseq => 84,
        }
    }

    /// Symbolic name, as shown to scripts in `err.code`
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Einval => "EINVAL",
            Self::Eilseq => "EILSEQ",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors from the registry, one-shot conversions and converters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharsetError {
    /// The name resolves to no encoding
    UnknownEncoding(String),
    /// The call itself is malformed (e.g. missing input on a non-final chunk)
    InvalidArgument(String),
    /// Input bytes that cannot be decoded, or residue left at the end of a stream
    InvalidSequence {
        encoding: &'static str,
        reason: String,
    },
    /// A character the target encoding cannot represent, with reporting enabled
    Unmappable { encoding: &'static str, ch: char },
}

impl CharsetError {
    #[must_use]
    pub fn errno(&self) -> Errno {
        match self {
            Self::UnknownEncoding(_) | Self::InvalidArgument(_) => Errno::Einval,
            Self::InvalidSequence { .. } | Self::Unmappable { .. } => Errno::Eilseq,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        self.errno().code()
    }

    pub(crate) fn invalid_sequence(encoding: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSequence {
            encoding,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for CharsetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownEncoding(name) => write!(f, "Invalid character set {name}"),
            Self::InvalidArgument(msg) => write!(f, "Invalid argument: {msg}"),
            Self::InvalidSequence { encoding, reason } => {
                write!(f, "Illegal byte sequence for {encoding}: {reason}")
            }
            Self::Unmappable { encoding, ch } => write!(
                f,
                "Character {ch:?} (U+{:04X}) cannot be mapped to {encoding}",
                u32::from(*ch)
            ),
        }
    }
}

impl std::error::Error for CharsetError {}
