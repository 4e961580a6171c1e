use std::path::Path;

use crate::dialog::ExecutableLocator;
use crate::error::LauncherError;
use crate::process::{run_inherited, CommandInvocation, ProcessRunner};

/// External program used for the single blocking download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadTool {
    Wget,
    Curl,
}

impl DownloadTool {
    pub fn program(self) -> &'static str {
        match self {
            DownloadTool::Wget => "wget",
            DownloadTool::Curl => "curl",
        }
    }

    pub fn detect(locator: &dyn ExecutableLocator) -> Result<Self, LauncherError> {
        [DownloadTool::Wget, DownloadTool::Curl]
            .into_iter()
            .find(|tool| locator.is_available(tool.program()))
            .ok_or_else(|| {
                LauncherError::Process("no download tool found (expected wget or curl)".to_string())
            })
    }

    fn invocation(self, url: &str, destination: &Path) -> CommandInvocation {
        let dest = destination.to_string_lossy().to_string();
        let mut invocation = CommandInvocation::new(self.program());
        match self {
            DownloadTool::Wget => {
                invocation.arg("-O").arg(dest).arg(url);
            }
            DownloadTool::Curl => {
                invocation
                    .args(["--fail", "--location", "--output"])
                    .arg(dest)
                    .arg(url);
            }
        }
        invocation
    }
}

/// Downloads `url` into `destination`, showing the tool's own progress
/// output. Returns the tool's exit code.
pub fn download(
    runner: &dyn ProcessRunner,
    tool: DownloadTool,
    url: &str,
    destination: &Path,
) -> Result<i32, LauncherError> {
    run_inherited(runner, &tool.invocation(url, destination))
}
