use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Process access failed: {0}")]
    ProcessAccess(String),

    #[error("Unreadable remote address {address:#x}")]
    ReadFault { address: u64 },

    #[error("Malformed asset: {0}")]
    MalformedAsset(String),

    #[error("Content key {key:#018x} not resolvable locally or remotely")]
    ArchiveMissing { key: u64 },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Unsupported game build {0:#018x}")]
    UnsupportedBuild(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error invalidates the whole session.
    ///
    /// Only loss of the target process is fatal; everything else is
    /// handled by skipping the affected asset or sub-part.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ProcessAccess(_) | Error::ProcessNotFound(_))
    }

    /// Cancellation stops iteration but is not reported as a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_classification() {
        assert!(Error::ProcessAccess("handle closed".into()).is_fatal());
        assert!(!Error::ReadFault { address: 0xdead }.is_fatal());
        assert!(!Error::ArchiveMissing { key: 1 }.is_fatal());
        assert!(!Error::Cancelled.is_fatal());
        assert!(Error::Cancelled.is_cancelled());
    }
}
