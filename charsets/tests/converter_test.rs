#[macro_use]
extern crate hamcrest;
use charsets::{Charsets, ConvertOptions, Converter, Encoding};
use hamcrest::prelude::*;

fn open(from: &str, to: &str) -> Converter {
    Converter::open(&Charsets::new(), from, to).unwrap()
}

#[test]
fn hex_to_utf8() {
    let mut converter = open("hex", "utf8");
    let out = converter.convert(Some(b"68656c6c6f"), true).unwrap();
    assert_that!(out, is(equal_to(b"hello".to_vec())));
}

#[test]
fn binary_to_hex() {
    let mut converter = open("binary", "hex");
    let out = converter.convert(Some(&[0xff, 0x00]), true).unwrap();
    assert_that!(out, is(equal_to(b"ff00".to_vec())));
}

#[test]
fn base64_to_binary() {
    let mut converter = open("base64", "binary");
    let mut out = converter.convert(Some(b"TW"), false).unwrap();
    out.extend(converter.convert(Some(b"Fu"), false).unwrap());
    out.extend(converter.convert(None, true).unwrap());
    assert_that!(out, is(equal_to(b"Man".to_vec())));
}

#[test]
fn utf8_to_ascii_replaces() {
    let mut converter = open("utf8", "ascii");
    let out = converter.convert(Some("é".as_bytes()), true).unwrap();
    assert_that!(out, is(equal_to(vec![0x3f])));
}

#[test]
fn split_utf8_sequence_is_carried() {
    let mut converter = open("utf8", "utf16be");
    let first = converter.convert(Some(&[0xe2, 0x82]), false).unwrap();
    assert_that!(first.len(), is(equal_to(0)));
    let second = converter.convert(Some(&[0xac]), true).unwrap();
    assert_that!(second, is(equal_to(vec![0x20, 0xac])));
}

#[test]
fn truncated_at_flush_is_eilseq_then_clean() {
    let mut converter = open("utf8", "utf8");
    converter.convert(Some(&[0x61, 0xe2]), false).unwrap();
    let err = converter.convert(None, true).unwrap_err();
    assert_that!(err.code(), is(equal_to("EILSEQ")));
    // state was reset
    let out = converter.convert(Some(b"ok"), true).unwrap();
    assert_that!(out, is(equal_to(b"ok".to_vec())));
}

#[test]
fn dangling_base64_char_at_flush() {
    let mut converter = open("base64", "hex");
    converter.convert(Some(b"TWFuT"), false).unwrap();
    assert_that!(converter.convert(None, true).is_err(), is(equal_to(true)));
}

#[test]
fn flush_after_complete_stream_is_empty() {
    let mut converter = open("utf16le", "utf8");
    let out = converter.convert(Some(&[0x68, 0x00, 0x69, 0x00]), false).unwrap();
    assert_that!(out, is(equal_to(b"hi".to_vec())));
    assert_that!(converter.convert(None, true).unwrap(), is(equal_to(Vec::<u8>::new())));
}

#[test]
fn reset_discards_partial_state() {
    let mut converter = open("hex", "binary");
    converter.convert(Some(b"f"), false).unwrap();
    converter.reset();
    let out = converter.convert(Some(b"41"), true).unwrap();
    assert_that!(out, is(equal_to(b"A".to_vec())));
}

#[test]
fn strict_reports_malformed_input() {
    let charsets = Charsets::new();
    let mut converter =
        Converter::open_with(&charsets, "utf8", "utf16le", ConvertOptions::strict()).unwrap();
    let err = converter.convert(Some(&[0x61, 0xff]), false).unwrap_err();
    assert_that!(err.code(), is(equal_to("EILSEQ")));

    let mut lenient = open("utf8", "utf8");
    let out = lenient.convert(Some(&[0x61, 0xff]), true).unwrap();
    assert_that!(out, is(equal_to("a\u{FFFD}".as_bytes().to_vec())));
}

#[test]
fn unknown_encoding_on_open() {
    let err = Converter::open(&Charsets::new(), "utf8", "klingon").err().unwrap();
    assert_that!(err.code(), is(equal_to("EINVAL")));
}

#[test]
fn accessors() {
    let converter = open("UCS-2", "latin1");
    assert_that!(converter.from(), is(equal_to(Encoding::Utf16Le)));
    assert_that!(converter.to().name(), is(equal_to("windows-1252")));
}
