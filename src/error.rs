use std::path::PathBuf;

use strum_macros::Display;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Clone)]
pub enum TransformError {
    #[error("Unknown coordinate system: {0:?}")]
    UnknownCoordinateSystem(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Provider {
    Nominatim,
    Amap,
    Baidu,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
pub enum ProviderErrorKind {
    Transport,
    Status,
    Parse,
}

/// A remote geocoder failed. `status` and `payload` are what the provider
/// sent back, kept verbatim for diagnostics.
#[derive(Error, Debug, PartialEq, Clone)]
#[error("{provider} {kind} error: {message} (status: {status:?})")]
pub struct ProviderError {
    pub provider: Provider,
    pub kind: ProviderErrorKind,
    pub message: String,
    pub status: Option<String>,
    pub payload: Option<String>,
}

impl ProviderError {
    pub fn transport(provider: Provider, message: impl Into<String>) -> Self {
        ProviderError {
            provider,
            kind: ProviderErrorKind::Transport,
            message: message.into(),
            status: None,
            payload: None,
        }
    }

    pub fn status(provider: Provider, status: impl Into<String>, payload: String) -> Self {
        ProviderError {
            provider,
            kind: ProviderErrorKind::Status,
            message: "provider reported failure".to_string(),
            status: Some(status.into()),
            payload: Some(payload),
        }
    }

    pub fn parse(provider: Provider, message: impl Into<String>, payload: String) -> Self {
        ProviderError {
            provider,
            kind: ProviderErrorKind::Parse,
            message: message.into(),
            status: None,
            payload: Some(payload),
        }
    }
}

#[derive(Error, Debug, PartialEq, Clone)]
pub enum ResolveError {
    #[error("Cannot resolve ({longitude}, {latitude}): {reason}")]
    Unresolved {
        longitude: f64,
        latitude: f64,
        reason: String,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("Resolver {resolver} panicked: {message}")]
    Panicked { resolver: String, message: String },
}

impl ResolveError {
    pub fn unresolved(longitude: f64, latitude: f64, reason: impl Into<String>) -> Self {
        ResolveError::Unresolved {
            longitude,
            latitude,
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid area source: {0:?}, expected one of polygon, nominatim, amap, baidu")]
    InvalidStrategy(String),
    #[error("Missing configuration section for area source {0}")]
    MissingSection(&'static str),
    #[error("Missing credential for {0}")]
    MissingCredential(Provider),
    #[error("Boundary directory not found: {0:?}")]
    MissingBoundaryDir(PathBuf),
    #[error("Reference database not found: {0:?}")]
    MissingReferenceDb(PathBuf),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
    #[error("Invalid boundary data in {source_name}: {reason}")]
    InvalidBoundary { source_name: String, reason: String },
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Reference database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}
