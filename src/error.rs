use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the workflows and their adapters.
#[derive(Error, Diagnostic, Debug)]
pub enum HostelError {
    #[error("{0} not found")]
    #[diagnostic(code(hostel::not_found))]
    NotFound(String),

    #[error("Conflict: {0}")]
    #[diagnostic(
        code(hostel::conflict),
        help("this room was just taken or the request was already decided; refresh and review the latest state instead of retrying")
    )]
    Conflict(String),

    #[error("Validation error: {0}")]
    #[diagnostic(code(hostel::validation))]
    ValidationError(String),

    #[error("Payment gateway error: {0}")]
    #[diagnostic(
        code(hostel::gateway),
        help("check your M-Pesa app or messages before paying again; do not resubmit a payment for the same reference")
    )]
    GatewayError(String),

    #[error("Write rejected: {0}")]
    #[diagnostic(code(hostel::write))]
    WriteError(String),

    #[error("Timed out: {0}")]
    #[diagnostic(
        code(hostel::timeout),
        help("check your M-Pesa app or messages before paying again; do not resubmit a payment for the same reference")
    )]
    Timeout(String),

    #[error("Forbidden: {0}")]
    #[diagnostic(code(hostel::forbidden))]
    Forbidden(String),

    #[error("Store error: {0}")]
    #[diagnostic(code(hostel::store))]
    StoreError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// The taxonomy kind of a [`HostelError`], for structured reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Gateway,
    Write,
    Timeout,
    Forbidden,
    Internal,
}

impl HostelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::ValidationError(_) => ErrorKind::Validation,
            Self::GatewayError(_) => ErrorKind::Gateway,
            Self::WriteError(_) => ErrorKind::Write,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::StoreError(_)
            | Self::HttpError(_)
            | Self::JsonError(_)
            | Self::CsvError(_)
            | Self::IoError(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, HostelError>;
