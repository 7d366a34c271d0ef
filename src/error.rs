use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    General(String),
    /// Malformed N5URL.
    #[error("invalid address {address:?}: {reason}")]
    AddressSyntax { address: String, reason: String },
    /// The attribute path does not resolve in the document.
    #[error("attribute not found: {0}")]
    AttributeNotFound(String),
    /// A token was applied to a node of the wrong kind.
    #[error("cannot apply {token} to {found}")]
    TypeMismatch { token: String, found: &'static str },
    #[error("interrupted while acquiring lock on {}", .0.display())]
    LockInterrupted(PathBuf),
    /// Corrupt or unrecognised block.
    #[error("invalid block: {0}")]
    Format(String),
    #[error("grid position {grid_position:?} is outside of grid {grid:?}")]
    BlockOutOfBounds {
        grid_position: Vec<u64>,
        grid: Vec<u64>,
    },
    #[error("string {index} contains the null terminator")]
    EmbeddedTerminator { index: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Codec(#[from] zarrs_codec::CodecError),
    #[error(transparent)]
    Wrapped(Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn general(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub fn address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AddressSyntax {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn wrap(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Wrapped(Box::new(error))
    }

    /// Whether the error means "the thing is not there" rather than "something went wrong".
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::AttributeNotFound(_) => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
