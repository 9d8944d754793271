//! Form-body markers and URL unescaping.

use smol_str::SmolStr;

use crate::error::SyntaxError;

/// Markers must appear entirely within this many leading body bytes.
pub const MARKER_SCAN_LIMIT: usize = 180;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// `screenshot=<percent-encoded base64 image>`
    Screenshot,
    /// `payload=<form-encoded statement batch>`
    Payload,
}

impl BodyKind {
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            BodyKind::Screenshot => "screenshot=",
            BodyKind::Payload => "payload=",
        }
    }
}

/// Finds the earliest marker in the scan window and returns the body kind with
/// the offset of the first data byte after it.
#[must_use]
pub fn classify_body(body: &[u8]) -> Option<(BodyKind, usize)> {
    let window = &body[..body.len().min(MARKER_SCAN_LIMIT)];
    [BodyKind::Screenshot, BodyKind::Payload]
        .into_iter()
        .filter_map(|kind| {
            let marker = kind.marker().as_bytes();
            window
                .windows(marker.len())
                .position(|candidate| candidate == marker)
                .map(|at| (kind, at, at + marker.len()))
        })
        .min_by_key(|(_, at, _)| *at)
        .map(|(kind, _, data_start)| (kind, data_start))
}

/// Percent-decoding only. `+` is preserved, which matters for base64 data.
pub fn percent_unescape(text: &str) -> Result<String, SyntaxError> {
    urlencoding::decode(text)
        .map(std::borrow::Cow::into_owned)
        .map_err(|err| SyntaxError::InvalidEncoding(SmolStr::new(err.to_string())))
}

#[must_use]
pub fn percent_unescape_bytes(data: &[u8]) -> Vec<u8> {
    urlencoding::decode_binary(data).into_owned()
}

/// `application/x-www-form-urlencoded` decoding: `+` is a space.
pub fn form_unescape(text: &str) -> Result<String, SyntaxError> {
    percent_unescape(&text.replace('+', " "))
}
