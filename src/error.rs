use std::io;

use thiserror::Error;

use crate::dialog::{Backend, DialogKind};

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no dialog backend available (looked for {candidates})")]
    NoBackendAvailable { candidates: String },
    #[error("invalid operation: {method} cannot be used on a {kind} dialog")]
    InvalidOperation {
        kind: DialogKind,
        method: &'static str,
    },
    #[error("missing required data: a {kind} dialog needs {what}")]
    MissingRequiredData {
        kind: DialogKind,
        what: &'static str,
    },
    #[error("unsupported dialog: {backend} cannot render a {kind} dialog")]
    UnsupportedCombination { kind: DialogKind, backend: Backend },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("process error: {0}")]
    Process(String),
    #[error("content type probe failed: {0}")]
    Probe(String),
    #[error("{step} aborted: {message}")]
    Aborted { step: String, message: String },
}

impl LauncherError {
    /// Errors that describe a broken setup or a programming mistake. These are
    /// never routed through a dialog since the dialog layer may be the thing
    /// that is broken.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LauncherError::Config(_)
                | LauncherError::Yaml(_)
                | LauncherError::NoBackendAvailable { .. }
                | LauncherError::InvalidOperation { .. }
                | LauncherError::MissingRequiredData { .. }
                | LauncherError::UnsupportedCombination { .. }
                | LauncherError::InvalidArgument(_)
        )
    }

    /// The user has already seen this failure in an error dialog.
    pub fn already_reported(&self) -> bool {
        matches!(self, LauncherError::Aborted { .. })
    }
}
