use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Network failure, non-200 status, or an empty body.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The page lacks a markup signature a record cannot be built without.
    #[error("malformed page {url}: {reason}")]
    MalformedPage { url: String, reason: String },

    /// A lookup row the aggregate refers to is missing from the store.
    #[error("store integrity: {0}")]
    StoreIntegrity(String),

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ScrapeError {
    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        ScrapeError::MalformedPage {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub fn fetch(url: &str, reason: impl Into<String>) -> Self {
        ScrapeError::Fetch {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Process exit code for a run aborted by this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            ScrapeError::Fetch { .. } | ScrapeError::MalformedPage { .. } => 1,
            ScrapeError::StoreIntegrity(_) | ScrapeError::Sql(_) | ScrapeError::Io(_) => 2,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;
