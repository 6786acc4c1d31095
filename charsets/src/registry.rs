//! Name → encoding resolution
//!
//! Aliases are looked up by exact spelling first, then the names of 7-bit
//! ASCII in any case; everything else goes to the WHATWG label lookup of
//! `encoding_rs`, which is case-insensitive and knows the legacy encodings.

use std::collections::HashMap;

use tracing::debug;

use crate::encoding::Encoding;
use crate::error::CharsetError;
use crate::options::ConvertOptions;

/// Names of 7-bit ASCII, matched ignoring case; the WHATWG table maps
/// these to windows-1252
const ASCII_LABELS: &[&str] = &[
    "ascii",
    "us-ascii",
    "us",
    "iso-ir-6",
    "iso646-us",
    "iso_646.irv:1983",
    "iso_646.irv:1991",
    "ansi_x3.4-1968",
    "ansi_x3.4-1986",
    "646",
    "ascii7",
    "cp367",
    "ibm367",
    "csascii",
];

const ALIASES: &[(&str, Encoding)] = &[
    ("utf8", Encoding::Utf8),
    ("UTF8", Encoding::Utf8),
    ("utf-8", Encoding::Utf8),
    ("UTF-8", Encoding::Utf8),
    ("utf16le", Encoding::Utf16Le),
    ("UTF16LE", Encoding::Utf16Le),
    ("utf-16le", Encoding::Utf16Le),
    ("UTF-16LE", Encoding::Utf16Le),
    ("ucs2", Encoding::Utf16Le),
    ("UCS2", Encoding::Utf16Le),
    ("ucs-2", Encoding::Utf16Le),
    ("UCS-2", Encoding::Utf16Le),
    ("utf16be", Encoding::Utf16Be),
    ("UTF16BE", Encoding::Utf16Be),
    ("utf-16be", Encoding::Utf16Be),
    ("UTF-16BE", Encoding::Utf16Be),
    ("utf32le", Encoding::Utf32Le),
    ("UTF32LE", Encoding::Utf32Le),
    ("utf-32le", Encoding::Utf32Le),
    ("UTF-32LE", Encoding::Utf32Le),
    ("utf32be", Encoding::Utf32Be),
    ("UTF32BE", Encoding::Utf32Be),
    ("utf-32be", Encoding::Utf32Be),
    ("UTF-32BE", Encoding::Utf32Be),
    ("ascii", Encoding::Ascii),
    ("ASCII", Encoding::Ascii),
    ("binary", Encoding::Binary),
    ("raw", Encoding::Binary),
    ("hex", Encoding::Hex),
    ("base64", Encoding::Base64),
];

/// Encoding registry
///
/// Immutable once built. Share it as `Arc<Charsets>`.
#[derive(Debug, Clone)]
pub struct Charsets {
    aliases: HashMap<&'static str, Encoding>,
    default: Encoding,
}

impl Default for Charsets {
    fn default() -> Self {
        Self::new()
    }
}

impl Charsets {
    #[must_use]
    pub fn new() -> Self {
        Self::build(Encoding::Utf8)
    }

    /// Registry whose default encoding is `name`
    ///
    /// # Errors
    ///
    /// `EINVAL` if `name` is not a known encoding.
    pub fn with_default(name: &str) -> Result<Self, CharsetError> {
        let default = Self::new().lookup_strict(name)?;
        debug!(default = %default, "charset registry with custom default");
        Ok(Self::build(default))
    }

    fn build(default: Encoding) -> Self {
        let mut aliases: HashMap<&'static str, Encoding> = ALIASES.iter().copied().collect();
        aliases.insert("undefined", default);
        Self { aliases, default }
    }

    #[must_use]
    pub fn default_encoding(&self) -> Encoding {
        self.default
    }

    /// Resolve a name, or `None` for an unknown one
    ///
    /// An absent or empty name means the default encoding.
    #[must_use]
    pub fn resolve(&self, name: Option<&str>) -> Option<Encoding> {
        let name = match name {
            None | Some("") => return Some(self.default),
            Some(name) => name,
        };
        if let Some(encoding) = self.aliases.get(name) {
            return Some(*encoding);
        }
        if ASCII_LABELS
            .iter()
            .any(|label| label.eq_ignore_ascii_case(name.trim()))
        {
            return Some(Encoding::Ascii);
        }
        let platform = encoding_rs::Encoding::for_label(name.as_bytes())?;
        if platform == encoding_rs::REPLACEMENT {
            return None;
        }
        Some(if platform == encoding_rs::UTF_8 {
            Encoding::Utf8
        } else if platform == encoding_rs::UTF_16LE {
            Encoding::Utf16Le
        } else if platform == encoding_rs::UTF_16BE {
            Encoding::Utf16Be
        } else {
            Encoding::Platform(platform)
        })
    }

    /// For implicit requests, where an unknown name silently means the default
    #[must_use]
    pub fn resolve_or_default(&self, name: Option<&str>) -> Encoding {
        self.resolve(name).unwrap_or(self.default)
    }

    /// # Errors
    ///
    /// `EINVAL` for an unknown name.
    pub fn lookup_strict(&self, name: &str) -> Result<Encoding, CharsetError> {
        self.resolve(Some(name))
            .ok_or_else(|| CharsetError::UnknownEncoding(name.to_string()))
    }

    #[must_use]
    pub fn supports(&self, name: &str) -> bool {
        self.resolve(Some(name)).is_some()
    }

    #[must_use]
    pub fn encoding_exists(&self, name: &str) -> bool {
        self.supports(name)
    }

    /// Convert a whole string to bytes, replacing what cannot be mapped
    ///
    /// # Errors
    ///
    /// `EINVAL` for an unknown encoding, `EILSEQ` for an incomplete hex or
    /// base64 representation.
    pub fn encode_string(&self, text: &str, name: &str) -> Result<Vec<u8>, CharsetError> {
        self.encode_string_with(text, name, ConvertOptions::default())
    }

    /// # Errors
    ///
    /// As [`Charsets::encode_string`], plus whatever `options` asks to report.
    pub fn encode_string_with(
        &self,
        text: &str,
        name: &str,
        options: ConvertOptions,
    ) -> Result<Vec<u8>, CharsetError> {
        self.lookup_strict(name)?.encode(text, options)
    }

    /// Convert a whole buffer to a string
    ///
    /// # Errors
    ///
    /// `EINVAL` for an unknown encoding, `EILSEQ` for a truncated sequence at
    /// the end of `bytes`.
    pub fn decode_buffer(&self, bytes: &[u8], name: &str) -> Result<String, CharsetError> {
        self.decode_buffer_with(bytes, name, ConvertOptions::default())
    }

    /// # Errors
    ///
    /// As [`Charsets::decode_buffer`], plus whatever `options` asks to report.
    pub fn decode_buffer_with(
        &self,
        bytes: &[u8],
        name: &str,
        options: ConvertOptions,
    ) -> Result<String, CharsetError> {
        self.lookup_strict(name)?.decode(bytes, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_follows_default() {
        let charsets = Charsets::with_default("latin1").unwrap();
        assert_eq!(charsets.resolve(Some("undefined")), Some(charsets.default_encoding()));
        assert_eq!(charsets.default_encoding().name(), "windows-1252");
    }

    #[test]
    fn test_platform_utf_labels_map_to_builtins() {
        let charsets = Charsets::new();
        assert_eq!(charsets.resolve(Some("unicode-1-1-utf-8")), Some(Encoding::Utf8));
        assert_eq!(charsets.resolve(Some("utf-16")), Some(Encoding::Utf16Le));
        assert_eq!(charsets.resolve(Some("Utf-16BE")), Some(Encoding::Utf16Be));
    }

    #[test]
    fn test_replacement_is_unsupported() {
        let charsets = Charsets::new();
        assert!(!charsets.supports("iso-2022-kr"));
        assert!(!charsets.supports("replacement"));
    }

    #[test]
    fn test_with_default_rejects_unknown() {
        let err = Charsets::with_default("klingon").unwrap_err();
        assert_eq!(err, CharsetError::UnknownEncoding("klingon".into()));
    }
}
