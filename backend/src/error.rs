use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use common::req::MessageResponse;
use thiserror::Error;

/// Low-level failure of the SQLite medium or of the store's worker plumbing.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("query failed: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("failed to open database: {0}")]
    Connection(#[from] diesel::ConnectionError),
    #[error("read pool unavailable: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database worker is not running")]
    WorkerGone,
    #[error("blocking read task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage write failed")]
    StorageWrite(#[source] StorageError),
    #[error("storage read failed")]
    StorageRead(#[source] StorageError),
    #[error("unrecognized measurement field '{0}'")]
    InvalidField(String),
    #[error("unrecognized bucket width '{0}'")]
    InvalidBucketWidth(String),
    #[error("window of {0} minutes is out of range")]
    InvalidWindow(u64),
    #[error("failed to ingest reading")]
    Ingestion(#[source] Box<Error>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidField(_) | Error::InvalidBucketWidth(_) | Error::InvalidWindow(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            Error::InvalidField(_) | Error::InvalidBucketWidth(_) | Error::InvalidWindow(_) => {
                self.to_string()
            }
            Error::Ingestion(_) | Error::StorageWrite(_) => "Error storing sensor data".to_owned(),
            Error::StorageRead(_) => "Error fetching sensor data".to_owned(),
        };
        HttpResponse::build(self.status_code()).json(MessageResponse { message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_errors_are_bad_requests() {
        assert_eq!(
            Error::InvalidField("wind".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::InvalidBucketWidth("week".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn storage_errors_are_opaque() {
        let err = Error::Ingestion(Box::new(Error::StorageWrite(StorageError::WorkerGone)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "failed to ingest reading");
        assert_eq!(
            Error::InvalidWindow(u64::MAX).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
