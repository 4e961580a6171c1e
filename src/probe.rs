use std::fmt;
use std::path::Path;

use tracing::debug;

use crate::error::LauncherError;
use crate::process::{run_captured, CommandInvocation, ProcessRunner};

/// File types the launcher checks downloads and selected files against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    WindowsExecutable,
    Zip,
}

impl ContentType {
    /// MIME strings `file` may report for this type. Newer releases of `file`
    /// report PE images as `application/vnd.microsoft.portable-executable`.
    pub fn mime_types(self) -> &'static [&'static str] {
        match self {
            ContentType::WindowsExecutable => &[
                "application/x-dosexec",
                "application/vnd.microsoft.portable-executable",
            ],
            ContentType::Zip => &["application/zip"],
        }
    }

    pub fn matches(self, mime: &str) -> bool {
        self.mime_types().contains(&mime)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_types()[0])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Matches,
    Mismatch { actual: String },
}

/// Asks `file` for the MIME type of `path`.
pub fn probe(runner: &dyn ProcessRunner, path: &Path) -> Result<String, LauncherError> {
    if path.as_os_str().is_empty() {
        return Err(LauncherError::InvalidArgument(
            "no file given to probe".to_string(),
        ));
    }
    let mut invocation = CommandInvocation::new("file");
    invocation
        .arg("--brief")
        .arg("--mime-type")
        .arg(path.to_string_lossy().to_string());
    let output = run_captured(runner, &invocation)?;
    let mime = output.stdout_text().trim().to_string();
    if !output.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let reason = if stderr.is_empty() { mime } else { stderr };
        return Err(LauncherError::Probe(format!(
            "`file` exited with status {} for {}: {reason}",
            output.status_code,
            path.display()
        )));
    }
    // `file` reports unreadable paths on stdout and still exits 0.
    if mime.starts_with("cannot open") {
        return Err(LauncherError::Probe(mime));
    }
    debug!(path = %path.display(), mime = %mime, "probed content type");
    Ok(mime)
}

pub fn expect(
    runner: &dyn ProcessRunner,
    path: &Path,
    expected: ContentType,
) -> Result<Verdict, LauncherError> {
    let actual = probe(runner, path)?;
    if expected.matches(&actual) {
        Ok(Verdict::Matches)
    } else {
        Ok(Verdict::Mismatch { actual })
    }
}
