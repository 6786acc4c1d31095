//! Encoding identifiers and one-shot conversions
//!
//! An [`Encoding`] is a cheap `Copy` token. Codec-backed encodings convert
//! between text and bytes through a codec; custom streaming encodings
//! (`binary`, `hex`, `base64`) are byte transforms whose *text* side is their
//! printable representation, so `decode` of `[0xff, 0x00]` as hex gives
//! `"ff00"` and `encode` of `"TWFu"` as base64 gives `b"Man"`.

use std::fmt;
use std::hash::{Hash, Hasher};

use base64::Engine as _;

use crate::codec::{TextDecoder, TextEncoder};
use crate::error::CharsetError;
use crate::options::ConvertOptions;
use crate::streaming::{octets_to_text, text_to_octets, Base64Parser, HexParser};

/// Whether an encoding is served by a codec or by a hand-written transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingKind {
    Codec,
    Custom,
}

#[derive(Debug, Clone, Copy)]
pub enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
    Ascii,
    /// Each byte is the character U+0000..=U+00FF with the same value
    Binary,
    Hex,
    Base64,
    /// Any other encoding known to the platform codec library
    Platform(&'static encoding_rs::Encoding),
}

impl Encoding {
    /// Canonical name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf8",
            Self::Utf16Le => "utf16le",
            Self::Utf16Be => "utf16be",
            Self::Utf32Le => "utf32le",
            Self::Utf32Be => "utf32be",
            Self::Ascii => "ascii",
            Self::Binary => "binary",
            Self::Hex => "hex",
            Self::Base64 => "base64",
            Self::Platform(encoding) => encoding.name(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> EncodingKind {
        match self {
            Self::Binary | Self::Hex | Self::Base64 => EncodingKind::Custom,
            _ => EncodingKind::Codec,
        }
    }

    /// Convert a complete string into bytes of this encoding
    ///
    /// # Errors
    ///
    /// `EILSEQ` when `options` asks to report unmappable characters (codec
    /// encodings) or malformed representations (hex, base64), and when a hex
    /// or base64 string ends in the middle of a unit.
    pub fn encode(&self, text: &str, options: ConvertOptions) -> Result<Vec<u8>, CharsetError> {
        let mut out = Vec::with_capacity(text.len());
        match self {
            Self::Binary => text_to_octets(text, self.name(), options.on_unmappable, &mut out)?,
            Self::Hex => {
                let mut parser = HexParser::default();
                parser.feed(text.as_bytes(), options.on_malformed, &mut out)?;
                parser.finish()?;
            }
            Self::Base64 => {
                let mut parser = Base64Parser::default();
                parser.feed(text.as_bytes(), options.on_malformed, &mut out)?;
                parser.finish(&mut out)?;
            }
            codec => {
                let mut encoder = TextEncoder::new(*codec);
                encoder.encode(text, true, options.on_unmappable, &mut out)?;
            }
        }
        Ok(out)
    }

    /// Convert a complete buffer of this encoding into a string
    ///
    /// # Errors
    ///
    /// `EILSEQ` for malformed input when `options` reports it, and always for a
    /// multi-byte sequence truncated at the end of the buffer.
    pub fn decode(&self, bytes: &[u8], options: ConvertOptions) -> Result<String, CharsetError> {
        let mut out = String::with_capacity(bytes.len());
        match self {
            Self::Binary => octets_to_text(bytes, &mut out),
            Self::Hex => out.push_str(&hex::encode(bytes)),
            Self::Base64 => {
                base64::engine::general_purpose::STANDARD.encode_string(bytes, &mut out);
            }
            codec => {
                let mut decoder = TextDecoder::new(*codec);
                decoder.decode(bytes, true, options.on_malformed, &mut out)?;
            }
        }
        Ok(out)
    }
}

impl PartialEq for Encoding {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Platform(a), Self::Platform(b)) => a.name() == b.name(),
            (a, b) => std::mem::discriminant(a) == std::mem::discriminant(b),
        }
    }
}

impl Eq for Encoding {}

impl Hash for Encoding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        if let Self::Platform(encoding) = self {
            encoding.name().hash(state);
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
