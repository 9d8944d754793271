//! Runtime error taxonomy.

use emubridge_syntax::SyntaxError;
use smol_str::SmolStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("malformed statement: {0}")]
    MalformedStatement(SmolStr),
    #[error("unknown variable '{0}'")]
    UnknownVariable(SmolStr),
    #[error("type mismatch: {0}")]
    TypeMismatch(SmolStr),
    #[error("'{0}' is read-only")]
    ReadOnly(SmolStr),
    #[error("index {index} out of range for '{name}' (len {len})")]
    IndexOutOfRange {
        name: SmolStr,
        index: usize,
        len: usize,
    },
    #[error("protocol framing: {0}")]
    ProtocolFraming(SmolStr),
    #[error("screenshot: {0}")]
    Screenshot(SmolStr),
    #[error("connection reset by peer")]
    ConnectionReset,
    #[error("read timed out")]
    Timeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    InvalidConfig(SmolStr),
}

impl RuntimeError {
    /// Connection-fatal errors end the handler for that socket. Everything else is
    /// scoped to a single statement.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::ProtocolFraming(_) | Self::ConnectionReset | Self::Timeout | Self::Io(_)
        )
    }
}

impl From<SyntaxError> for RuntimeError {
    fn from(err: SyntaxError) -> Self {
        let message = SmolStr::new(err.to_string());
        if err.is_framing() {
            Self::ProtocolFraming(message)
        } else {
            Self::MalformedStatement(message)
        }
    }
}
