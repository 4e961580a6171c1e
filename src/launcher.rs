use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::{Settings, BUILDER_WINDOWS_PATH};
use crate::dialog::{Action, Dialog, DialogKind, ExecutableLocator, Ui};
use crate::error::LauncherError;
use crate::probe::{self, ContentType, Verdict};
use crate::process::{CommandLine, ProcessRunner, WinePrefix};
use crate::setup::SetupPipeline;

pub const MENU_HEADER: &str = "ZoneBuilder Options";

/// Everything the main menu can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LauncherAction {
    Setup,
    LaunchBuilder,
    Winecfg,
    Winetricks,
    Regedit,
    RunExe,
    KillWineserver,
}

impl LauncherAction {
    pub fn label(self) -> &'static str {
        match self {
            LauncherAction::Setup => "Run ZoneBuilder Setup",
            LauncherAction::LaunchBuilder => "Run ZoneBuilder",
            LauncherAction::Winecfg => "Run Winecfg",
            LauncherAction::Winetricks => "Run Winetricks",
            LauncherAction::Regedit => "Run Regedit",
            LauncherAction::RunExe => "Run EXE in prefix",
            LauncherAction::KillWineserver => "Kill Wineserver",
        }
    }

    /// Menu entries for the current install state, in display order.
    pub fn catalog(installed: bool) -> Vec<LauncherAction> {
        if installed {
            vec![
                LauncherAction::LaunchBuilder,
                LauncherAction::Winecfg,
                LauncherAction::Winetricks,
                LauncherAction::Regedit,
                LauncherAction::RunExe,
                LauncherAction::KillWineserver,
            ]
        } else {
            vec![LauncherAction::Setup]
        }
    }
}

pub struct Launcher<'r> {
    settings: &'r Settings,
    locator: &'r dyn ExecutableLocator,
    runner: &'r dyn ProcessRunner,
}

impl<'r> Launcher<'r> {
    pub fn new(
        settings: &'r Settings,
        locator: &'r dyn ExecutableLocator,
        runner: &'r dyn ProcessRunner,
    ) -> Self {
        Self {
            settings,
            locator,
            runner,
        }
    }

    pub fn settings(&self) -> &'r Settings {
        self.settings
    }

    pub fn locator(&self) -> &'r dyn ExecutableLocator {
        self.locator
    }

    pub fn runner(&self) -> &'r dyn ProcessRunner {
        self.runner
    }

    pub fn ui(&self) -> Ui<'r> {
        Ui::new(self.locator, self.runner)
    }

    pub fn prefix(&self) -> WinePrefix {
        self.settings.prefix()
    }

    /// Shows the failure in an Error dialog and turns it into `Aborted`. When
    /// the dialog itself cannot be shown the message goes to stderr instead.
    pub fn fail(&self, step: &str, message: String) -> LauncherError {
        warn!(step, message = %message, "aborting");
        if let Err(err) = self.ui().show_error(&message) {
            warn!(error = %err, "error dialog unavailable");
            eprintln!("{step} failed: {message}");
        }
        LauncherError::Aborted {
            step: step.to_string(),
            message,
        }
    }

    /// Shows the main menu once and runs the chosen action.
    pub fn main_menu(&self) -> Result<(), LauncherError> {
        let installed = self.settings.is_installed();
        info!(installed, "showing main menu");
        let mut dialog = Dialog::new(DialogKind::Menu)
            .title("ZoneBuilder Launcher")
            .size(300, 300)
            .header(MENU_HEADER)?;
        for action in LauncherAction::catalog(installed) {
            dialog = dialog.add_option(
                action.label(),
                BoundAction {
                    launcher: self,
                    action,
                },
            )?;
        }
        dialog.run(&self.ui())
    }

    pub fn perform(&self, action: LauncherAction) -> Result<(), LauncherError> {
        info!(action = action.label(), "performing");
        match action {
            LauncherAction::Setup => self.setup(),
            LauncherAction::LaunchBuilder => self.launch_builder(),
            LauncherAction::Winecfg => self.run_in_prefix(["wine", "winecfg"]),
            LauncherAction::Winetricks => self.run_in_prefix(["winetricks"]),
            LauncherAction::Regedit => self.run_in_prefix(["wine", "regedit"]),
            LauncherAction::RunExe => self.run_exe(None),
            LauncherAction::KillWineserver => self.run_in_prefix(["wineserver", "-k"]),
        }
    }

    pub fn setup(&self) -> Result<(), LauncherError> {
        SetupPipeline::standard().run(self)?;
        self.ui().show_info("ZoneBuilder and SRB2 are installed.")
    }

    pub fn launch_builder(&self) -> Result<(), LauncherError> {
        if !self.settings.is_installed() {
            return Err(LauncherError::Process(format!(
                "ZoneBuilder is not installed in {}; run `zblaunch setup` first",
                self.settings.prefix_dir.display()
            )));
        }
        self.run_in_prefix(["wine", BUILDER_WINDOWS_PATH])
    }

    /// Tools are interactive; their exit status is logged, not reported.
    fn run_in_prefix(&self, command: impl Into<CommandLine>) -> Result<(), LauncherError> {
        let code = self.prefix().execute(self.runner, command)?;
        if code != 0 {
            warn!(code, "command exited with non-zero status");
        }
        Ok(())
    }

    /// Runs a Windows executable in the prefix. Without `path` the user picks
    /// one; cancelling the picker does nothing.
    pub fn run_exe(&self, path: Option<&Path>) -> Result<(), LauncherError> {
        let selected = match path {
            Some(path) => path.to_path_buf(),
            None => match self.ui().choose_file("Select an EXE to run")? {
                Some(path) => path,
                None => return Ok(()),
            },
        };

        match probe::expect(self.runner, &selected, ContentType::WindowsExecutable)? {
            Verdict::Matches => {}
            Verdict::Mismatch { actual } => {
                return Err(self.fail(
                    "run exe",
                    format!(
                        "Selected EXE file is invalid: {} is {actual}",
                        selected.display()
                    ),
                ));
            }
        }

        let target = fs::canonicalize(&selected)?;
        fs::create_dir_all(&self.settings.temp_dir)?;
        let link = tempfile::Builder::new()
            .prefix("run-")
            .suffix(".exe")
            .tempfile_in(&self.settings.temp_dir)?
            .into_temp_path();
        let exe = expose(&target, &link)?;
        info!(exe = %exe.display(), "running executable in prefix");
        self.run_in_prefix(vec![
            "wine".to_string(),
            exe.to_string_lossy().to_string(),
        ])
    }
}

/// Makes `target` reachable at `link` with an `.exe` name Wine accepts.
#[cfg(unix)]
fn expose(target: &Path, link: &Path) -> Result<PathBuf, LauncherError> {
    fs::remove_file(link)?;
    std::os::unix::fs::symlink(target, link)?;
    Ok(link.to_path_buf())
}

#[cfg(not(unix))]
fn expose(target: &Path, _link: &Path) -> Result<PathBuf, LauncherError> {
    Ok(target.to_path_buf())
}

/// A catalog entry bound to the launcher that will run it.
struct BoundAction<'l, 'r> {
    launcher: &'l Launcher<'r>,
    action: LauncherAction,
}

impl Action for BoundAction<'_, '_> {
    fn invoke(&mut self) -> Result<(), LauncherError> {
        self.launcher.perform(self.action)
    }
}
