//! Streaming conversion between two encodings
//!
//! Input bytes in the `from` encoding are decoded to text and the text is
//! encoded to `to`. Custom encodings take part through their octets: hex and
//! base64 input is parsed to octets, octets are seen as Latin-1 text, and the
//! same holds in reverse on the output side.

use tracing::{debug, trace};

use crate::codec::{TextDecoder, TextEncoder};
use crate::encoding::Encoding;
use crate::error::CharsetError;
use crate::options::ConvertOptions;
use crate::registry::Charsets;
use crate::streaming::{octets_to_text, text_to_octets, Base64Formatter, Base64Parser, HexParser};

enum DecodeStage {
    Codec(TextDecoder),
    Binary,
    Hex(HexParser),
    Base64(Base64Parser),
}

enum EncodeStage {
    Codec(TextEncoder),
    Binary,
    Hex,
    Base64(Base64Formatter),
}

impl DecodeStage {
    fn new(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Binary => Self::Binary,
            Encoding::Hex => Self::Hex(HexParser::default()),
            Encoding::Base64 => Self::Base64(Base64Parser::default()),
            codec => Self::Codec(TextDecoder::new(codec)),
        }
    }

    fn run(
        &mut self,
        input: &[u8],
        last: bool,
        options: ConvertOptions,
        text: &mut String,
    ) -> Result<(), CharsetError> {
        let mut octets = Vec::new();
        match self {
            Self::Codec(decoder) => return decoder.decode(input, last, options.on_malformed, text),
            Self::Binary => {
                octets_to_text(input, text);
                return Ok(());
            }
            Self::Hex(parser) => {
                parser.feed(input, options.on_malformed, &mut octets)?;
                if last {
                    parser.finish()?;
                }
            }
            Self::Base64(parser) => {
                parser.feed(input, options.on_malformed, &mut octets)?;
                if last {
                    parser.finish(&mut octets)?;
                }
            }
        }
        octets_to_text(&octets, text);
        Ok(())
    }

    fn reset(&mut self) {
        match self {
            Self::Codec(decoder) => decoder.reset(),
            Self::Binary => {}
            Self::Hex(parser) => parser.reset(),
            Self::Base64(parser) => parser.reset(),
        }
    }
}

impl EncodeStage {
    fn new(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Binary => Self::Binary,
            Encoding::Hex => Self::Hex,
            Encoding::Base64 => Self::Base64(Base64Formatter::default()),
            codec => Self::Codec(TextEncoder::new(codec)),
        }
    }

    fn run(
        &mut self,
        text: &str,
        last: bool,
        encoding: Encoding,
        options: ConvertOptions,
        out: &mut Vec<u8>,
    ) -> Result<(), CharsetError> {
        if let Self::Codec(encoder) = self {
            return encoder.encode(text, last, options.on_unmappable, out);
        }
        let mut octets = Vec::with_capacity(text.len());
        text_to_octets(text, encoding.name(), options.on_unmappable, &mut octets)?;
        match self {
            Self::Codec(_) | Self::Binary => out.extend_from_slice(&octets),
            Self::Hex => out.extend_from_slice(hex::encode(&octets).as_bytes()),
            Self::Base64(formatter) => {
                let mut repr = String::new();
                formatter.feed(&octets, &mut repr);
                if last {
                    formatter.finish(&mut repr);
                }
                out.extend_from_slice(repr.as_bytes());
            }
        }
        Ok(())
    }

    fn reset(&mut self) {
        match self {
            Self::Codec(encoder) => encoder.reset(),
            Self::Binary | Self::Hex => {}
            Self::Base64(formatter) => formatter.reset(),
        }
    }
}

/// Stateful converter bound to one `(from, to)` pair
///
/// Feed it chunks with `last == false` and finish with `last == true`; the
/// concatenated output does not depend on where the input was split. After a
/// final call, or any failed call, the converter starts over from a clean
/// state.
///
/// Converting text into `hex`, `base64` or `binary` writes one octet per
/// character, not the UTF-8 bytes of the text. Characters above U+00FF are
/// unmappable: replaced by `?` (0x3F), or `EILSEQ` under
/// [`ConvertOptions::strict`]. So `utf8 → base64` turns `"é€"` into `"6T8="`.
/// Encode the text as UTF-8 first and convert from `binary` to get its bytes.
pub struct Converter {
    from: Encoding,
    to: Encoding,
    options: ConvertOptions,
    decoder: DecodeStage,
    encoder: EncodeStage,
}

impl Converter {
    /// # Errors
    ///
    /// `EINVAL` if either name is unknown.
    pub fn open(charsets: &Charsets, from: &str, to: &str) -> Result<Self, CharsetError> {
        Self::open_with(charsets, from, to, ConvertOptions::default())
    }

    /// # Errors
    ///
    /// `EINVAL` if either name is unknown.
    pub fn open_with(
        charsets: &Charsets,
        from: &str,
        to: &str,
        options: ConvertOptions,
    ) -> Result<Self, CharsetError> {
        let from = charsets.lookup_strict(from)?;
        let to = charsets.lookup_strict(to)?;
        Ok(Self::new(from, to, options))
    }

    #[must_use]
    pub fn new(from: Encoding, to: Encoding, options: ConvertOptions) -> Self {
        debug!(%from, %to, ?options, "open converter");
        Self {
            from,
            to,
            options,
            decoder: DecodeStage::new(from),
            encoder: EncodeStage::new(to),
        }
    }

    #[must_use]
    pub fn from(&self) -> Encoding {
        self.from
    }

    #[must_use]
    pub fn to(&self) -> Encoding {
        self.to
    }

    #[must_use]
    pub fn options(&self) -> ConvertOptions {
        self.options
    }

    /// Convert one chunk and return the bytes it produced
    ///
    /// `input` may be `None` only to flush (`last == true`).
    ///
    /// # Errors
    ///
    /// - `EINVAL` for `None` input on a non-final call
    /// - `EILSEQ` for malformed or unmappable input when reporting is on, and
    ///   for residue that cannot be completed at the end of the stream
    pub fn convert(&mut self, input: Option<&[u8]>, last: bool) -> Result<Vec<u8>, CharsetError> {
        let input = match (input, last) {
            (Some(input), _) => input,
            (None, true) => &[],
            (None, false) => {
                return Err(CharsetError::InvalidArgument(
                    "input is required unless flushing".to_string(),
                ))
            }
        };
        trace!(len = input.len(), last, "convert chunk");

        let result = self.run(input, last);
        if last || result.is_err() {
            self.reset();
        }
        result
    }

    fn run(&mut self, input: &[u8], last: bool) -> Result<Vec<u8>, CharsetError> {
        let mut text = String::with_capacity(input.len());
        self.decoder.run(input, last, self.options, &mut text)?;
        let mut out = Vec::with_capacity(text.len());
        self.encoder.run(&text, last, self.to, self.options, &mut out)?;
        Ok(out)
    }

    /// Drop partial sequences and residuals on both sides
    pub fn reset(&mut self) {
        self.decoder.reset();
        self.encoder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lenient(from: Encoding, to: Encoding) -> Converter {
        Converter::new(from, to, ConvertOptions::default())
    }

    #[test]
    fn test_flush_without_input() {
        let mut converter = lenient(Encoding::Utf8, Encoding::Utf16Le);
        assert_eq!(converter.convert(Some(b"a"), false).unwrap(), vec![0x61, 0x00]);
        assert!(converter.convert(None, true).unwrap().is_empty());
    }

    #[test]
    fn test_none_without_last_is_einval() {
        let mut converter = lenient(Encoding::Utf8, Encoding::Utf8);
        let err = converter.convert(None, false).unwrap_err();
        assert_eq!(err.code(), "EINVAL");
    }

    #[test]
    fn test_state_cleared_after_failed_flush() {
        let mut converter = lenient(Encoding::Hex, Encoding::Binary);
        assert_eq!(converter.convert(Some(b"616"), false).unwrap(), b"a");
        assert!(converter.convert(None, true).is_err());
        assert_eq!(converter.convert(Some(b"62"), true).unwrap(), b"b");
    }

    #[test]
    fn test_base64_output_padded_on_flush() {
        let mut converter = lenient(Encoding::Utf8, Encoding::Base64);
        assert_eq!(converter.convert(Some(b"Ma"), false).unwrap(), b"");
        assert_eq!(converter.convert(None, true).unwrap(), b"TWE=");
    }

    #[test]
    fn test_custom_encoder_unmappable() {
        let mut converter = lenient(Encoding::Utf8, Encoding::Hex);
        assert_eq!(converter.convert(Some("a€".as_bytes()), true).unwrap(), b"613f");

        let mut strict = Converter::new(Encoding::Utf8, Encoding::Hex, ConvertOptions::strict());
        assert!(matches!(
            strict.convert(Some("a€".as_bytes()), true),
            Err(CharsetError::Unmappable { encoding: "hex", ch: '€' })
        ));
    }

    #[test]
    fn test_text_to_base64_writes_one_octet_per_char() {
        let mut converter = lenient(Encoding::Utf8, Encoding::Base64);
        assert_eq!(converter.convert(Some("é€".as_bytes()), true).unwrap(), b"6T8=");

        let mut via_binary = lenient(Encoding::Binary, Encoding::Base64);
        assert_eq!(via_binary.convert(Some("é".as_bytes()), true).unwrap(), b"w6k=");
    }
}
