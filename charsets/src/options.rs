/// What to do when input cannot be converted as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorAction {
    /// Substitute U+FFFD (decoding) or `?` (encoding) and keep going
    #[default]
    Replace,
    /// Fail the call with an `EILSEQ` error
    Report,
}

/// Error policy for one conversion session
///
/// The default replaces both malformed input and unmappable characters, so
/// conversions are lossy-safe unless a caller asks for strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertOptions {
    pub on_malformed: ErrorAction,
    pub on_unmappable: ErrorAction,
}

impl ConvertOptions {
    /// Report every malformed or unmappable sequence
    #[must_use]
    pub fn strict() -> Self {
        Self {
            on_malformed: ErrorAction::Report,
            on_unmappable: ErrorAction::Report,
        }
    }
}
