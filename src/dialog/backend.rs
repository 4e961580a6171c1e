use std::fmt;

use tracing::debug;

use crate::error::LauncherError;

/// Dialog presentation programs, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Kdialog,
    Zenity,
    Osascript,
    Xmessage,
}

impl Backend {
    pub const ALL: [Backend; 4] = [
        Backend::Kdialog,
        Backend::Zenity,
        Backend::Osascript,
        Backend::Xmessage,
    ];

    pub fn program(self) -> &'static str {
        match self {
            Backend::Kdialog => "kdialog",
            Backend::Zenity => "zenity",
            Backend::Osascript => "osascript",
            Backend::Xmessage => "xmessage",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Answers whether a program can be found on the host without running it.
pub trait ExecutableLocator {
    fn is_available(&self, program: &str) -> bool;
}

pub struct WhichLocator;

impl ExecutableLocator for WhichLocator {
    fn is_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }
}

pub fn detect(locator: &dyn ExecutableLocator) -> Result<Backend, LauncherError> {
    for backend in Backend::ALL {
        if locator.is_available(backend.program()) {
            debug!(backend = %backend, "dialog backend detected");
            return Ok(backend);
        }
    }
    let candidates = Backend::ALL
        .iter()
        .map(|backend| backend.program())
        .collect::<Vec<_>>()
        .join(", ");
    Err(LauncherError::NoBackendAvailable { candidates })
}
