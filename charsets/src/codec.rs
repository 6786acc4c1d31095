//! Incremental codecs for text encodings
//!
//! UTF-8, UTF-16 and the platform encodings decode through `encoding_rs`.
//! `encoding_rs` has no UTF-32, only encodes to UTF-8 for the UTF-16 labels
//! and maps `ascii` to windows-1252, so those directions are written here.

use encoding_rs::{CoderResult, DecoderResult, EncoderResult};

use crate::encoding::Encoding;
use crate::error::CharsetError;
use crate::options::ErrorAction;

const REPLACEMENT: char = '\u{FFFD}';

fn rs_encoding(encoding: Encoding) -> Option<&'static encoding_rs::Encoding> {
    match encoding {
        Encoding::Utf8 => Some(encoding_rs::UTF_8),
        Encoding::Utf16Le => Some(encoding_rs::UTF_16LE),
        Encoding::Utf16Be => Some(encoding_rs::UTF_16BE),
        Encoding::Platform(e) => Some(e),
        _ => None,
    }
}

fn reserve_utf8(decoder: &encoding_rs::Decoder, src_len: usize, out: &mut String) {
    let needed = decoder
        .max_utf8_buffer_length_without_replacement(src_len)
        .unwrap_or_else(|| src_len.saturating_mul(3));
    out.reserve(needed.max(4));
}

pub(crate) enum TextDecoder {
    Rs(encoding_rs::Decoder),
    Utf32 { big_endian: bool, pending: Vec<u8> },
    Ascii,
}

impl TextDecoder {
    pub(crate) fn new(encoding: Encoding) -> Self {
        if let Some(rs) = rs_encoding(encoding) {
            return Self::Rs(rs.new_decoder_without_bom_handling());
        }
        match encoding {
            Encoding::Utf32Be => Self::Utf32 {
                big_endian: true,
                pending: Vec::with_capacity(4),
            },
            Encoding::Utf32Le => Self::Utf32 {
                big_endian: false,
                pending: Vec::with_capacity(4),
            },
            _ => Self::Ascii,
        }
    }

    /// Decode `src` and append the text to `out`
    ///
    /// With `last`, a sequence still incomplete after `src` is an error
    /// whatever `action` says.
    pub(crate) fn decode(
        &mut self,
        src: &[u8],
        last: bool,
        action: ErrorAction,
        out: &mut String,
    ) -> Result<(), CharsetError> {
        match self {
            Self::Rs(decoder) => decode_rs(decoder, src, last, action, out),
            Self::Utf32 {
                big_endian,
                pending,
            } => decode_utf32(*big_endian, pending, src, last, action, out),
            Self::Ascii => {
                for &b in src {
                    if b.is_ascii() {
                        out.push(char::from(b));
                    } else if action == ErrorAction::Replace {
                        out.push(REPLACEMENT);
                    } else {
                        return Err(CharsetError::invalid_sequence(
                            "ascii",
                            format!("byte 0x{b:02x} is not ASCII"),
                        ));
                    }
                }
                Ok(())
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        match self {
            Self::Rs(decoder) => {
                *decoder = decoder.encoding().new_decoder_without_bom_handling();
            }
            Self::Utf32 { pending, .. } => pending.clear(),
            Self::Ascii => {}
        }
    }
}

fn decode_rs(
    decoder: &mut encoding_rs::Decoder,
    src: &[u8],
    last: bool,
    action: ErrorAction,
    out: &mut String,
) -> Result<(), CharsetError> {
    let name = decoder.encoding().name();
    let mut rest = src;
    loop {
        reserve_utf8(decoder, rest.len(), out);
        let (result, read) = decoder.decode_to_string_without_replacement(rest, out, false);
        rest = &rest[read..];
        match result {
            DecoderResult::InputEmpty => break,
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(bad, _) => match action {
                ErrorAction::Replace => out.push(REPLACEMENT),
                ErrorAction::Report => {
                    return Err(CharsetError::invalid_sequence(
                        name,
                        format!("malformed sequence of {bad} byte(s)"),
                    ))
                }
            },
        }
    }
    if last {
        // only the decoder's pending bytes are left
        reserve_utf8(decoder, 0, out);
        let (result, _) = decoder.decode_to_string_without_replacement(&[], out, true);
        if let DecoderResult::Malformed(bad, _) = result {
            return Err(CharsetError::invalid_sequence(
                name,
                format!("input ends inside a sequence ({bad} byte(s) pending)"),
            ));
        }
    }
    Ok(())
}

fn decode_utf32(
    big_endian: bool,
    pending: &mut Vec<u8>,
    src: &[u8],
    last: bool,
    action: ErrorAction,
    out: &mut String,
) -> Result<(), CharsetError> {
    let name = if big_endian { "utf32be" } else { "utf32le" };
    let mut data = std::mem::take(pending);
    data.extend_from_slice(src);
    let mut units = data.chunks_exact(4);
    for unit in &mut units {
        let bytes = [unit[0], unit[1], unit[2], unit[3]];
        let value = if big_endian {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        };
        match char::from_u32(value) {
            Some(ch) => out.push(ch),
            None if action == ErrorAction::Replace => out.push(REPLACEMENT),
            None => {
                return Err(CharsetError::invalid_sequence(
                    name,
                    format!("0x{value:08x} is not a Unicode scalar value"),
                ))
            }
        }
    }
    let remainder = units.remainder();
    if last && !remainder.is_empty() {
        return Err(CharsetError::invalid_sequence(
            name,
            format!("input ends inside a code unit ({} byte(s) pending)", remainder.len()),
        ));
    }
    pending.extend_from_slice(remainder);
    Ok(())
}

pub(crate) enum TextEncoder {
    Utf8,
    Utf16 { big_endian: bool },
    Utf32 { big_endian: bool },
    Ascii,
    Rs(encoding_rs::Encoder),
}

impl TextEncoder {
    pub(crate) fn new(encoding: Encoding) -> Self {
        match encoding {
            Encoding::Utf8 => Self::Utf8,
            Encoding::Utf16Le => Self::Utf16 { big_endian: false },
            Encoding::Utf16Be => Self::Utf16 { big_endian: true },
            Encoding::Utf32Le => Self::Utf32 { big_endian: false },
            Encoding::Utf32Be => Self::Utf32 { big_endian: true },
            Encoding::Platform(e) => Self::Rs(e.new_encoder()),
            // custom encodings never reach a text encoder
            Encoding::Ascii | Encoding::Binary | Encoding::Hex | Encoding::Base64 => Self::Ascii,
        }
    }

    /// Encode `text` and append the bytes to `out`
    ///
    /// `last` lets stateful encoders (ISO-2022-JP) return to their initial
    /// state.
    pub(crate) fn encode(
        &mut self,
        text: &str,
        last: bool,
        action: ErrorAction,
        out: &mut Vec<u8>,
    ) -> Result<(), CharsetError> {
        match self {
            Self::Utf8 => out.extend_from_slice(text.as_bytes()),
            Self::Utf16 { big_endian } => {
                let mut buf = [0u16; 2];
                for ch in text.chars() {
                    for unit in ch.encode_utf16(&mut buf).iter() {
                        let bytes = if *big_endian {
                            unit.to_be_bytes()
                        } else {
                            unit.to_le_bytes()
                        };
                        out.extend_from_slice(&bytes);
                    }
                }
            }
            Self::Utf32 { big_endian } => {
                for ch in text.chars() {
                    let value = u32::from(ch);
                    let bytes = if *big_endian {
                        value.to_be_bytes()
                    } else {
                        value.to_le_bytes()
                    };
                    out.extend_from_slice(&bytes);
                }
            }
            Self::Ascii => {
                for ch in text.chars() {
                    if ch.is_ascii() {
                        out.push(ch as u8);
                    } else if action == ErrorAction::Replace {
                        out.push(b'?');
                    } else {
                        return Err(CharsetError::Unmappable {
                            encoding: "ascii",
                            ch,
                        });
                    }
                }
            }
            Self::Rs(encoder) => encode_rs(encoder, text, last, action, out)?,
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        if let Self::Rs(encoder) = self {
            *encoder = encoder.encoding().new_encoder();
        }
    }
}

fn encode_rs(
    encoder: &mut encoding_rs::Encoder,
    text: &str,
    last: bool,
    action: ErrorAction,
    out: &mut Vec<u8>,
) -> Result<(), CharsetError> {
    let name = encoder.encoding().name();
    let mut rest = text;
    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(rest.len())
            .unwrap_or_else(|| rest.len().saturating_mul(4));
        out.reserve(needed.max(8));
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(rest, out, last);
        rest = &rest[read..];
        match result {
            EncoderResult::InputEmpty => return Ok(()),
            EncoderResult::OutputFull => {}
            EncoderResult::Unmappable(ch) => match action {
                ErrorAction::Replace => {
                    out.reserve(8);
                    let (result, _, _) = encoder.encode_from_utf8_to_vec("?", out, false);
                    debug_assert_eq!(result, CoderResult::InputEmpty);
                }
                ErrorAction::Report => {
                    return Err(CharsetError::Unmappable { encoding: name, ch })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(
        encoding: Encoding,
        bytes: &[u8],
        action: ErrorAction,
    ) -> Result<String, CharsetError> {
        let mut out = String::new();
        TextDecoder::new(encoding).decode(bytes, true, action, &mut out)?;
        Ok(out)
    }

    #[test]
    fn test_utf8_split_sequence() {
        let mut decoder = TextDecoder::new(Encoding::Utf8);
        let mut out = String::new();
        decoder.decode(&[0x68, 0xc3], false, ErrorAction::Report, &mut out).unwrap();
        assert_eq!(out, "h");
        decoder.decode(&[0xa9], true, ErrorAction::Report, &mut out).unwrap();
        assert_eq!(out, "hé");
    }

    #[test]
    fn test_truncated_utf8_is_error_even_when_replacing() {
        let err =
            decode_all(Encoding::Utf8, &[0x61, 0xe2, 0x82], ErrorAction::Replace).unwrap_err();
        assert_eq!(err.code(), "EILSEQ");
    }

    #[test]
    fn test_invalid_utf8_replaced() {
        let text = decode_all(Encoding::Utf8, &[0x61, 0xff, 0x62], ErrorAction::Replace).unwrap();
        assert_eq!(text, "a\u{FFFD}b");
    }

    #[test]
    fn test_utf16_surrogate_pair() {
        let mut out = Vec::new();
        TextEncoder::new(Encoding::Utf16Be)
            .encode("𝄞", true, ErrorAction::Report, &mut out)
            .unwrap();
        assert_eq!(out, vec![0xd8, 0x34, 0xdd, 0x1e]);
        assert_eq!(decode_all(Encoding::Utf16Be, &out, ErrorAction::Report).unwrap(), "𝄞");
    }

    #[test]
    fn test_utf32_pending_unit() {
        let mut decoder = TextDecoder::new(Encoding::Utf32Le);
        let mut out = String::new();
        decoder.decode(&[0x41, 0x00], false, ErrorAction::Report, &mut out).unwrap();
        assert_eq!(out, "");
        decoder.decode(&[0x00, 0x00, 0x42], false, ErrorAction::Report, &mut out).unwrap();
        assert_eq!(out, "A");
        assert!(decoder.decode(&[], true, ErrorAction::Replace, &mut out).is_err());
    }

    #[test]
    fn test_utf32_rejects_surrogates() {
        let bytes = 0xd800u32.to_be_bytes();
        assert_eq!(
            decode_all(Encoding::Utf32Be, &bytes, ErrorAction::Replace).unwrap(),
            "\u{FFFD}"
        );
        assert!(decode_all(Encoding::Utf32Be, &bytes, ErrorAction::Report).is_err());
    }

    #[test]
    fn test_ascii_unmappable() {
        let mut out = Vec::new();
        TextEncoder::new(Encoding::Ascii)
            .encode("é", true, ErrorAction::Replace, &mut out)
            .unwrap();
        assert_eq!(out, vec![0x3f]);
    }

    #[test]
    fn test_platform_unmappable_replaced() {
        let mut out = Vec::new();
        TextEncoder::new(Encoding::Platform(encoding_rs::WINDOWS_1252))
            .encode("é€✓", true, ErrorAction::Replace, &mut out)
            .unwrap();
        assert_eq!(out, vec![0xe9, 0x80, b'?']);
    }

    #[test]
    fn test_decoder_reset_drops_pending() {
        let mut decoder = TextDecoder::new(Encoding::Utf16Le);
        let mut out = String::new();
        decoder.decode(&[0x41], false, ErrorAction::Report, &mut out).unwrap();
        decoder.reset();
        decoder.decode(&[0x42, 0x00], true, ErrorAction::Report, &mut out).unwrap();
        assert_eq!(out, "B");
    }
}
