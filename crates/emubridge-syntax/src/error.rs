use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("unknown verb '{0}'")]
    UnknownVerb(SmolStr),
    #[error("{verb} takes no arguments")]
    UnexpectedArguments { verb: &'static str },
    #[error("missing variable name after {verb}")]
    MissingName { verb: &'static str },
    #[error("missing value in SET '{0}'")]
    MissingValue(SmolStr),
    #[error("invalid index '{text}' in {verb}")]
    InvalidIndex { verb: &'static str, text: SmolStr },
    #[error("unexpected trailing text in GET: '{0}'")]
    TrailingTokens(SmolStr),
    #[error("POST head has no Content-Length")]
    MissingContentLength,
    #[error("invalid Content-Length '{0}'")]
    InvalidContentLength(SmolStr),
    #[error("POST head is not terminated by a blank line")]
    UnterminatedHead,
    #[error("invalid percent-encoding: {0}")]
    InvalidEncoding(SmolStr),
}

impl SyntaxError {
    /// Framing errors leave the byte stream in an unknown position, so the
    /// connection cannot continue after one.
    #[must_use]
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::MissingContentLength | Self::InvalidContentLength(_) | Self::UnterminatedHead
        )
    }

    /// The verb of the statement that failed to parse, when it got that far.
    #[must_use]
    pub fn verb(&self) -> Option<&'static str> {
        match self {
            Self::UnknownVerb(_) => None,
            Self::UnexpectedArguments { verb }
            | Self::MissingName { verb }
            | Self::InvalidIndex { verb, .. } => Some(verb),
            Self::MissingValue(_) => Some("SET"),
            Self::TrailingTokens(_) => Some("GET"),
            Self::MissingContentLength
            | Self::InvalidContentLength(_)
            | Self::UnterminatedHead
            | Self::InvalidEncoding(_) => Some("POST"),
        }
    }
}
