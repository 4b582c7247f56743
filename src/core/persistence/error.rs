use std::error::Error;
use std::fmt;

/// Failure talking to the account backend.
#[derive(Debug)]
pub enum RemoteError {
    Http(reqwest::Error),
    /// 401/403: the token is missing, invalid or expired.
    Unauthorized,
    Status {
        status: u16,
        message: Option<String>,
    },
    Decode(String),
    InvalidUrl(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::Http(err) => write!(f, "request failed: {err}"),
            RemoteError::Unauthorized => write!(f, "not signed in or session expired"),
            RemoteError::Status {
                status,
                message: Some(message),
            } => write!(f, "server returned {status}: {message}"),
            RemoteError::Status {
                status,
                message: None,
            } => write!(f, "server returned {status}"),
            RemoteError::Decode(detail) => write!(f, "unexpected response: {detail}"),
            RemoteError::InvalidUrl(url) => write!(f, "invalid backend URL: {url}"),
        }
    }
}

impl Error for RemoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RemoteError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Http(err)
    }
}

#[derive(Debug)]
pub enum PersistenceError {
    Read {
        key: String,
        source: std::io::Error,
    },
    Write {
        key: String,
        source: std::io::Error,
    },
    Serialize {
        key: String,
        source: serde_json::Error,
    },
    Remote(RemoteError),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Read { key, source } => write!(f, "failed to read {key}: {source}"),
            PersistenceError::Write { key, source } => {
                write!(f, "failed to write {key}: {source}")
            }
            PersistenceError::Serialize { key, source } => {
                write!(f, "failed to encode or decode {key}: {source}")
            }
            PersistenceError::Remote(err) => write!(f, "remote storage: {err}"),
        }
    }
}

impl Error for PersistenceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PersistenceError::Read { source, .. } | PersistenceError::Write { source, .. } => {
                Some(source)
            }
            PersistenceError::Serialize { source, .. } => Some(source),
            PersistenceError::Remote(err) => Some(err),
        }
    }
}

impl From<RemoteError> for PersistenceError {
    fn from(err: RemoteError) -> Self {
        PersistenceError::Remote(err)
    }
}
