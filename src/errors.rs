use std::path::PathBuf;

use axum::{
    extract::multipart::MultipartError,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Structured error types for the segmentation front-end.
///
/// Only [`SegError::Upload`] and [`SegError::Multipart`] are meant for the
/// client. Everything else is an internal failure and is reported as a bare 500.
#[derive(Error, Debug)]
pub enum SegError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Filesystem error: {operation} failed for {path:?}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Image processing error: {operation} failed")]
    ImageProcessing {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Model error: {operation} failed")]
    Model {
        operation: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{reason}")]
    Upload { reason: &'static str },

    #[error("Malformed upload: {0}")]
    Multipart(#[from] MultipartError),
}

pub type Result<T> = std::result::Result<T, SegError>;

impl SegError {
    pub fn model(operation: impl Into<String>, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self::Model {
            operation: operation.into(),
            source: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Upload { .. } => StatusCode::BAD_REQUEST,
            Self::Multipart(err) => err.status(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SegError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::Upload { reason } => reason.to_string(),
            Self::Multipart(err) => err.body_text(),
            other => {
                tracing::error!(error = ?other, "request failed");
                "Internal Server Error".to_string()
            }
        };
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

impl From<anyhow::Error> for SegError {
    fn from(err: anyhow::Error) -> Self {
        Self::Configuration {
            message: err.to_string(),
        }
    }
}

/// Fallback for I/O errors raised without path context. Call sites that know
/// the path build [`SegError::FileSystem`] themselves.
impl From<std::io::Error> for SegError {
    fn from(err: std::io::Error) -> Self {
        Self::FileSystem {
            path: PathBuf::from("unknown"),
            operation: "unknown".to_string(),
            source: err,
        }
    }
}

impl From<image::ImageError> for SegError {
    fn from(err: image::ImageError) -> Self {
        Self::ImageProcessing {
            operation: "image processing".to_string(),
            source: Box::new(err),
        }
    }
}

impl From<ort::Error> for SegError {
    fn from(err: ort::Error) -> Self {
        Self::Model {
            operation: "ort operation".to_string(),
            source: Box::new(err),
        }
    }
}

/// Shape errors come out of tensor reshaping around inference, so they are
/// filed as model errors.
impl From<ndarray::ShapeError> for SegError {
    fn from(err: ndarray::ShapeError) -> Self {
        Self::Model {
            operation: "tensor shape conversion".to_string(),
            source: Box::new(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_errors_are_client_errors() {
        let err = SegError::Upload {
            reason: "Empty file.",
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Empty file.");
    }

    #[test]
    fn everything_else_is_a_server_error() {
        let err = SegError::model("inference", "output missing");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: SegError = std::io::Error::other("disk full").into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
