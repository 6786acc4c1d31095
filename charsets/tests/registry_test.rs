#[macro_use]
extern crate hamcrest;
use charsets::{Charsets, ConvertOptions, Encoding, EncodingKind};
use hamcrest::prelude::*;

#[test]
fn all_alias_spellings_resolve_identically() {
    let charsets = Charsets::new();
    let groups: &[(&[&str], Encoding)] = &[
        (&["utf8", "UTF8", "utf-8", "UTF-8"], Encoding::Utf8),
        (
            &["utf16le", "UTF16LE", "utf-16le", "UTF-16LE", "ucs2", "UCS2", "ucs-2", "UCS-2"],
            Encoding::Utf16Le,
        ),
        (&["utf16be", "UTF16BE", "utf-16be", "UTF-16BE"], Encoding::Utf16Be),
        (&["utf32le", "UTF32LE", "utf-32le", "UTF-32LE"], Encoding::Utf32Le),
        (&["utf32be", "UTF32BE", "utf-32be", "UTF-32BE"], Encoding::Utf32Be),
        (&["ascii", "ASCII"], Encoding::Ascii),
        (&["binary", "raw"], Encoding::Binary),
        (&["hex"], Encoding::Hex),
        (&["base64"], Encoding::Base64),
    ];
    for (names, expected) in groups {
        for name in *names {
            assert_that!(charsets.resolve(Some(name)), is(equal_to(Some(*expected))));
        }
    }
}

#[test]
fn empty_and_absent_names_mean_default() {
    let charsets = Charsets::new();
    let utf8 = charsets.resolve(Some("utf8"));
    assert_that!(charsets.resolve(None), is(equal_to(utf8)));
    assert_that!(charsets.resolve(Some("")), is(equal_to(utf8)));
    assert_that!(charsets.resolve(Some("undefined")), is(equal_to(utf8)));
}

#[test]
fn unknown_names() {
    let charsets = Charsets::new();
    assert_that!(charsets.resolve(Some("klingon")), is(equal_to(None)));
    assert_that!(charsets.supports("klingon"), is(equal_to(false)));
    assert_that!(charsets.resolve_or_default(Some("klingon")), is(equal_to(Encoding::Utf8)));

    let err = charsets.lookup_strict("klingon").unwrap_err();
    assert_that!(err.code(), is(equal_to("EINVAL")));
    assert_that!(err.errno().errno(), is(equal_to(22)));
}

#[test]
fn platform_lookup_for_other_names() {
    let charsets = Charsets::new();
    let sjis = charsets.lookup_strict("shift_jis").unwrap();
    assert_that!(sjis.kind(), is(equal_to(EncodingKind::Codec)));
    assert_that!(sjis.name(), is(equal_to("Shift_JIS")));
    assert_that!(charsets.encoding_exists("latin1"), is(equal_to(true)));
    assert_that!(charsets.lookup_strict("hex").unwrap().kind(), is(equal_to(EncodingKind::Custom)));
}

#[test]
fn canonical_names() {
    let charsets = Charsets::new();
    assert_that!(charsets.lookup_strict("UCS-2").unwrap().name(), is(equal_to("utf16le")));
    assert_that!(
        charsets.lookup_strict("raw").unwrap().to_string(),
        is(equal_to("binary".to_string()))
    );
}

#[test]
fn encode_non_ascii_to_ascii_replaces() {
    let charsets = Charsets::new();
    assert_that!(charsets.encode_string("é", "ascii").unwrap(), is(equal_to(vec![0x3f])));

    let err = charsets
        .encode_string_with("é", "ascii", ConvertOptions::strict())
        .unwrap_err();
    assert_that!(err.code(), is(equal_to("EILSEQ")));
}

#[test]
fn decode_ascii() {
    let charsets = Charsets::new();
    assert_that!(
        charsets.decode_buffer(&[0x68, 0x65, 0x6c, 0x6c, 0x6f], "ascii").unwrap(),
        is(equal_to("hello".to_string()))
    );
}

#[test]
fn custom_encodings_text_side_is_representation() {
    let charsets = Charsets::new();
    assert_that!(
        charsets.decode_buffer(&[0xff, 0x00], "hex").unwrap(),
        is(equal_to("ff00".to_string()))
    );
    assert_that!(
        charsets.decode_buffer(&[0x4d, 0x61, 0x6e], "base64").unwrap(),
        is(equal_to("TWFu".to_string()))
    );
    assert_that!(
        charsets.encode_string("TWFu", "base64").unwrap(),
        is(equal_to(vec![0x4d, 0x61, 0x6e]))
    );
    assert_that!(charsets.encode_string("FF00", "hex").unwrap(), is(equal_to(vec![0xff, 0x00])));
}

#[test]
fn incomplete_hex_string_is_eilseq() {
    let charsets = Charsets::new();
    let err = charsets.encode_string("abc", "hex").unwrap_err();
    assert_that!(err.code(), is(equal_to("EILSEQ")));
}

#[test]
fn codec_round_trip() {
    let charsets = Charsets::new();
    let text = "Grüße, 世界! 𝄞";
    for name in ["utf8", "utf16le", "utf16be", "utf32le", "utf32be", "gb18030"] {
        let bytes = charsets.encode_string(text, name).unwrap();
        assert_that!(charsets.decode_buffer(&bytes, name).unwrap(), is(equal_to(text.to_string())));
    }
}

#[test]
fn truncated_buffer_is_eilseq() {
    let charsets = Charsets::new();
    let err = charsets.decode_buffer(&[0x3d, 0xd8], "utf16le").unwrap_err();
    assert_that!(err.code(), is(equal_to("EILSEQ")));
}

#[test]
fn custom_default_encoding() {
    let charsets = Charsets::with_default("utf16be").unwrap();
    assert_that!(charsets.default_encoding(), is(equal_to(Encoding::Utf16Be)));
    assert_that!(charsets.encode_string("A", "").unwrap(), is(equal_to(vec![0x00, 0x41])));
}

#[test]
fn ascii_names_in_any_case_are_seven_bit() {
    let charsets = Charsets::new();
    for name in ["Ascii", "us-ascii", "US-ASCII", "ISO646-US", "ANSI_X3.4-1968", "iso-ir-6"] {
        assert_that!(charsets.resolve(Some(name)), is(equal_to(Some(Encoding::Ascii))));
        assert_that!(charsets.encode_string("é", name).unwrap(), is(equal_to(vec![0x3f])));
    }
    assert_that!(
        charsets.resolve(Some("latin1")).map(|e| e.name()),
        is(equal_to(Some("windows-1252")))
    );
}
