//! Named text encodings: registry, one-shot conversion and streaming converters

mod codec;
pub mod converter;
pub mod encoding;
pub mod error;
pub mod options;
pub mod registry;
mod streaming;

pub use converter::Converter;
pub use encoding::{Encoding, EncodingKind};
pub use error::{CharsetError, Errno};
pub use options::{ConvertOptions, ErrorAction};
pub use registry::Charsets;
