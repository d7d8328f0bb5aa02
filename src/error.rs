use reqwest::StatusCode;
use thiserror::Error;

/// Document fetch failure, raised only once retries are exhausted or the
/// status is not worth retrying.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{url} returned {status} after {attempts} attempt(s)")]
    Status {
        url: String,
        status: StatusCode,
        attempts: u32,
    },
    #[error("request to {url} failed after {attempts} attempt(s): {source}")]
    Transport {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    pub fn attempts(&self) -> u32 {
        match self {
            FetchError::Status { attempts, .. } | FetchError::Transport { attempts, .. } => {
                *attempts
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("column '{0}' not found in input table")]
    MissingColumn(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
