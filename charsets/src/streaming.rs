//! Hand-written transforms for encodings without a codec
//!
//! Hex and base64 are parsed and formatted incrementally. Each transform keeps
//! a residual of at most three bytes between calls: one pending hex digit, up
//! to three base64 characters waiting for their group, or up to two octets
//! waiting to be formatted as a base64 group.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;

use crate::error::CharsetError;
use crate::options::ErrorAction;

/// Accepts unpadded final groups and non-zero trailing bits
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

pub(crate) fn octets_to_text(octets: &[u8], out: &mut String) {
    out.extend(octets.iter().map(|&b| char::from(b)));
}

/// Characters above U+00FF have no octet; they are replaced by `?` or reported
pub(crate) fn text_to_octets(
    text: &str,
    encoding: &'static str,
    action: ErrorAction,
    out: &mut Vec<u8>,
) -> Result<(), CharsetError> {
    for ch in text.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(b) => out.push(b),
            Err(_) => match action {
                ErrorAction::Replace => out.push(b'?'),
                ErrorAction::Report => return Err(CharsetError::Unmappable { encoding, ch }),
            },
        }
    }
    Ok(())
}

fn malformed(
    encoding: &'static str,
    byte: u8,
    action: ErrorAction,
) -> Result<(), CharsetError> {
    match action {
        ErrorAction::Replace => Ok(()),
        ErrorAction::Report => Err(CharsetError::invalid_sequence(
            encoding,
            format!("unexpected byte 0x{byte:02x}"),
        )),
    }
}

/// Hex digits to octets, carrying an odd digit to the next call
#[derive(Debug, Default)]
pub(crate) struct HexParser {
    pending: Option<u8>,
}

impl HexParser {
    pub(crate) fn feed(
        &mut self,
        src: &[u8],
        action: ErrorAction,
        out: &mut Vec<u8>,
    ) -> Result<(), CharsetError> {
        let mut digits = Vec::with_capacity(src.len() + 1);
        digits.extend(self.pending.take());
        for &b in src {
            if b.is_ascii_hexdigit() {
                digits.push(b);
            } else {
                malformed("hex", b, action)?;
            }
        }
        if digits.len() % 2 == 1 {
            self.pending = digits.pop();
        }

        let start = out.len();
        out.resize(start + digits.len() / 2, 0);
        hex::decode_to_slice(&digits, &mut out[start..])
            .map_err(|e| CharsetError::invalid_sequence("hex", e.to_string()))
    }

    /// End of stream: a lone digit cannot form an octet
    pub(crate) fn finish(&mut self) -> Result<(), CharsetError> {
        match self.pending.take() {
            Some(digit) => Err(CharsetError::invalid_sequence(
                "hex",
                format!("odd number of hex digits, dangling '{}'", char::from(digit)),
            )),
            None => Ok(()),
        }
    }

    pub(crate) fn reset(&mut self) {
        self.pending = None;
    }
}

/// Base64 text to octets
///
/// Whitespace is skipped, URL-safe characters are accepted, padding is
/// optional. A `=` closes the current group early.
#[derive(Debug, Default)]
pub(crate) struct Base64Parser {
    pending: Vec<u8>,
}

impl Base64Parser {
    pub(crate) fn feed(
        &mut self,
        src: &[u8],
        action: ErrorAction,
        out: &mut Vec<u8>,
    ) -> Result<(), CharsetError> {
        let mut group = std::mem::take(&mut self.pending);
        group.reserve(src.len());
        for &b in src {
            match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' => group.push(b),
                b'-' => group.push(b'+'),
                b'_' => group.push(b'/'),
                b'=' => Self::drain(&mut group, action, out)?,
                b' ' | b'\t' | b'\r' | b'\n' => {}
                other => malformed("base64", other, action)?,
            }
        }

        let whole = group.len() - group.len() % 4;
        if whole > 0 {
            LENIENT
                .decode_vec(&group[..whole], out)
                .map_err(|e| CharsetError::invalid_sequence("base64", e.to_string()))?;
        }
        self.pending = group.split_off(whole);
        Ok(())
    }

    /// Decode everything collected so far, including a short final group
    fn drain(
        group: &mut Vec<u8>,
        action: ErrorAction,
        out: &mut Vec<u8>,
    ) -> Result<(), CharsetError> {
        if group.len() % 4 == 1 {
            // six bits cannot make an octet
            if let Some(dangling) = group.pop() {
                if action == ErrorAction::Report {
                    group.clear();
                    return Err(CharsetError::invalid_sequence(
                        "base64",
                        format!("dangling character '{}'", char::from(dangling)),
                    ));
                }
            }
        }
        if !group.is_empty() {
            LENIENT
                .decode_vec(group.as_slice(), out)
                .map_err(|e| CharsetError::invalid_sequence("base64", e.to_string()))?;
            group.clear();
        }
        Ok(())
    }

    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) -> Result<(), CharsetError> {
        let mut group = std::mem::take(&mut self.pending);
        if group.len() == 1 {
            return Err(CharsetError::invalid_sequence(
                "base64",
                "stream ends with a single character",
            ));
        }
        Self::drain(&mut group, ErrorAction::Report, out)
    }

    pub(crate) fn reset(&mut self) {
        self.pending.clear();
    }
}

/// Octets to padded base64 text, carrying up to two octets
#[derive(Debug, Default)]
pub(crate) struct Base64Formatter {
    pending: Vec<u8>,
}

impl Base64Formatter {
    pub(crate) fn feed(&mut self, octets: &[u8], out: &mut String) {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(octets);
        let whole = data.len() - data.len() % 3;
        STANDARD.encode_string(&data[..whole], out);
        self.pending = data.split_off(whole);
    }

    pub(crate) fn finish(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            STANDARD.encode_string(&self.pending, out);
            self.pending.clear();
        }
    }

    pub(crate) fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parser_carries_nibble() {
        let mut parser = HexParser::default();
        let mut out = Vec::new();
        parser.feed(b"ff0", ErrorAction::Replace, &mut out).unwrap();
        assert_eq!(out, vec![0xff]);
        parser.feed(b"0", ErrorAction::Replace, &mut out).unwrap();
        assert_eq!(out, vec![0xff, 0x00]);
        assert!(parser.finish().is_ok());
    }

    #[test]
    fn test_hex_parser_odd_tail_is_error() {
        let mut parser = HexParser::default();
        let mut out = Vec::new();
        parser.feed(b"abc", ErrorAction::Replace, &mut out).unwrap();
        let err = parser.finish().unwrap_err();
        assert_eq!(err.code(), "EILSEQ");
        // the residue is gone after the error
        assert!(parser.finish().is_ok());
    }

    #[test]
    fn test_hex_parser_invalid_digit() {
        let mut out = Vec::new();
        HexParser::default()
            .feed(b"6g8", ErrorAction::Replace, &mut out)
            .unwrap();
        assert_eq!(out, vec![0x68]);

        let err = HexParser::default()
            .feed(b"6g8", ErrorAction::Report, &mut Vec::new())
            .unwrap_err();
        assert!(matches!(err, CharsetError::InvalidSequence { encoding: "hex", .. }));
    }

    #[test]
    fn test_base64_parser_across_calls() {
        let mut parser = Base64Parser::default();
        let mut out = Vec::new();
        parser.feed(b"TW", ErrorAction::Replace, &mut out).unwrap();
        assert!(out.is_empty());
        parser.feed(b"FuTW", ErrorAction::Replace, &mut out).unwrap();
        assert_eq!(out, b"Man");
        parser.feed(b"E=", ErrorAction::Replace, &mut out).unwrap();
        assert_eq!(out, b"ManMa");
        parser.finish(&mut out).unwrap();
        assert_eq!(out, b"ManMa");
    }

    #[test]
    fn test_base64_parser_unpadded_tail() {
        let mut parser = Base64Parser::default();
        let mut out = Vec::new();
        parser.feed(b"TWE", ErrorAction::Replace, &mut out).unwrap();
        parser.finish(&mut out).unwrap();
        assert_eq!(out, b"Ma");
    }

    #[test]
    fn test_base64_parser_skips_whitespace_and_url_alphabet() {
        let mut parser = Base64Parser::default();
        let mut out = Vec::new();
        parser.feed(b"-_-_\r\nTWFu", ErrorAction::Report, &mut out).unwrap();
        parser.finish(&mut out).unwrap();
        assert_eq!(out, vec![0xfb, 0xff, 0xbf, b'M', b'a', b'n']);
    }

    #[test]
    fn test_base64_parser_single_char_at_end() {
        let mut parser = Base64Parser::default();
        let mut out = Vec::new();
        parser.feed(b"TWFuT", ErrorAction::Replace, &mut out).unwrap();
        assert!(parser.finish(&mut out).is_err());
    }

    #[test]
    fn test_base64_formatter_residue() {
        let mut formatter = Base64Formatter::default();
        let mut out = String::new();
        formatter.feed(b"M", &mut out);
        assert_eq!(out, "");
        formatter.feed(b"an", &mut out);
        assert_eq!(out, "TWFu");
        formatter.feed(b"Ma", &mut out);
        formatter.finish(&mut out);
        assert_eq!(out, "TWFuTWE=");
    }

    #[test]
    fn test_text_to_octets_report() {
        let mut out = Vec::new();
        let err = text_to_octets("a€", "hex", ErrorAction::Report, &mut out).unwrap_err();
        assert_eq!(err, CharsetError::Unmappable { encoding: "hex", ch: '€' });
    }
}
