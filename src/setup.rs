//! First-run installation.
//!
//! Setup is an ordered list of [`SetupStep`]s. The first step that fails is
//! reported once through an Error dialog and the run stops with
//! [`LauncherError::Aborted`]; later steps never start.

use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use crate::download::{download, DownloadTool};
use crate::error::LauncherError;
use crate::launcher::Launcher;
use crate::probe::{self, ContentType, Verdict};
use crate::process::{run_inherited, CommandInvocation};

const WINETRICKS_HINT: &str =
    "You may need to update your winetricks script.\nSee: https://wiki.winehq.org/Winetricks";

/// Why a step stopped the run.
#[derive(Debug)]
enum StepError {
    /// A user-facing message describing the failure.
    Failed(String),
    Launcher(LauncherError),
}

impl From<LauncherError> for StepError {
    fn from(err: LauncherError) -> Self {
        StepError::Launcher(err)
    }
}

fn failed(message: impl Into<String>) -> StepError {
    StepError::Failed(message.into())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    CreateBaseDir,
    CreateTempDir,
    InitPrefix,
    InstallDependencies,
    MapDataDrive,
    InstallZoneBuilder,
    InstallSrb2,
}

impl SetupStep {
    pub fn name(self) -> &'static str {
        match self {
            SetupStep::CreateBaseDir => "create base directory",
            SetupStep::CreateTempDir => "create temp directory",
            SetupStep::InitPrefix => "initialise wine prefix",
            SetupStep::InstallDependencies => "install winetricks dependencies",
            SetupStep::MapDataDrive => "map data drive",
            SetupStep::InstallZoneBuilder => "install ZoneBuilder",
            SetupStep::InstallSrb2 => "install SRB2",
        }
    }

    fn run(self, launcher: &Launcher<'_>) -> Result<(), StepError> {
        let settings = launcher.settings();
        match self {
            SetupStep::CreateBaseDir => create_dir(&settings.base_dir, "required directory"),
            SetupStep::CreateTempDir => create_dir(&settings.temp_dir, "temp directory"),
            SetupStep::InitPrefix => {
                let code = launcher.prefix().execute(launcher.runner(), ["wineboot"])?;
                if code != 0 {
                    return Err(failed(format!(
                        "Failed to initialise the wine prefix at {} (wineboot exited with {code})",
                        settings.prefix_dir.display()
                    )));
                }
                Ok(())
            }
            SetupStep::InstallDependencies => {
                let mut command = vec!["winetricks".to_string()];
                command.extend(settings.winetricks_verbs.iter().cloned());
                let code = launcher.prefix().execute(launcher.runner(), command)?;
                if code != 0 {
                    return Err(failed(format!(
                        "Failed to run winetricks setup.\n{WINETRICKS_HINT}"
                    )));
                }
                Ok(())
            }
            SetupStep::MapDataDrive => map_data_drive(launcher).map_err(|err| {
                failed(format!(
                    "Failed to map {} to drive {}: {err}",
                    settings.data_dir.display(),
                    settings.data_drive
                ))
            }),
            SetupStep::InstallZoneBuilder => install_zone_builder(launcher),
            SetupStep::InstallSrb2 => install_srb2(launcher),
        }
    }
}

fn create_dir(path: &Path, what: &str) -> Result<(), StepError> {
    fs::create_dir_all(path).map_err(|err| {
        failed(format!(
            "Failed to generate {what} {}: {err}",
            path.display()
        ))
    })
}

/// Removes a `dosdevices` entry that is a link or a file. A real directory is
/// left untouched and reported as an error.
fn remove_drive(link: &Path) -> io::Result<()> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.is_dir() => Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} is a directory, not a drive link", link.display()),
        )),
        Ok(_) => fs::remove_file(link),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

fn map_data_drive(launcher: &Launcher<'_>) -> io::Result<()> {
    let settings = launcher.settings();
    remove_drive(&settings.drive_link("z"))?;
    let drive = settings.drive_link(&settings.data_drive);
    remove_drive(&drive)?;
    fs::create_dir_all(&settings.data_dir)?;
    if let Some(parent) = drive.parent() {
        fs::create_dir_all(parent)?;
    }
    link_dir(&settings.data_dir, &drive)
}

#[cfg(unix)]
fn link_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn link_dir(_target: &Path, _link: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "drive mapping needs symlink support",
    ))
}

/// Downloads `url` into a scoped temp file with `suffix` and checks its type.
/// The file is deleted when the returned handle drops.
fn fetch(
    launcher: &Launcher<'_>,
    what: &str,
    url: &str,
    suffix: &str,
    expected: ContentType,
) -> Result<tempfile::NamedTempFile, StepError> {
    let settings = launcher.settings();
    let tool = DownloadTool::detect(launcher.locator())?;
    let file = tempfile::Builder::new()
        .prefix("download-")
        .suffix(suffix)
        .tempfile_in(&settings.temp_dir)
        .map_err(LauncherError::from)?;
    info!(url, tool = tool.program(), "downloading {what}");
    let code = download(launcher.runner(), tool, url, file.path())?;
    if code != 0 {
        return Err(failed(format!(
            "Failed to download {what} from {url} ({} exited with {code})",
            tool.program()
        )));
    }
    match probe::expect(launcher.runner(), file.path(), expected)? {
        Verdict::Matches => Ok(file),
        Verdict::Mismatch { actual } => Err(failed(format!(
            "Downloaded {what} file is invalid: expected {expected}, got {actual}"
        ))),
    }
}

fn install_zone_builder(launcher: &Launcher<'_>) -> Result<(), StepError> {
    let settings = launcher.settings();
    let installer = fetch(
        launcher,
        "ZoneBuilder setup",
        &settings.zone_builder_url,
        ".exe",
        ContentType::WindowsExecutable,
    )?;
    let command = vec![
        "wine".to_string(),
        installer.path().to_string_lossy().to_string(),
    ];
    let code = launcher.prefix().execute(launcher.runner(), command)?;
    if code != 0 {
        return Err(failed(format!(
            "Failed to install ZoneBuilder (installer exited with {code})"
        )));
    }
    Ok(())
}

fn install_srb2(launcher: &Launcher<'_>) -> Result<(), StepError> {
    let settings = launcher.settings();
    let archive = fetch(
        launcher,
        "SRB2",
        &settings.srb2_url,
        ".zip",
        ContentType::Zip,
    )?;
    let target = settings.srb2_dir();
    create_dir(&target, "SRB2 directory")?;
    let mut unzip = CommandInvocation::new("unzip");
    unzip
        .arg("-o")
        .arg(archive.path().to_string_lossy().to_string())
        .current_dir(&target);
    let code = run_inherited(launcher.runner(), &unzip)?;
    if code != 0 {
        return Err(failed(format!(
            "Failed to install SRB2 (unzip exited with {code})"
        )));
    }
    Ok(())
}

pub struct SetupPipeline {
    steps: Vec<SetupStep>,
}

impl SetupPipeline {
    pub fn new(steps: Vec<SetupStep>) -> Self {
        Self { steps }
    }

    pub fn standard() -> Self {
        Self::new(vec![
            SetupStep::CreateBaseDir,
            SetupStep::CreateTempDir,
            SetupStep::InitPrefix,
            SetupStep::InstallDependencies,
            SetupStep::MapDataDrive,
            SetupStep::InstallZoneBuilder,
            SetupStep::InstallSrb2,
        ])
    }

    pub fn steps(&self) -> &[SetupStep] {
        &self.steps
    }

    pub fn run(&self, launcher: &Launcher<'_>) -> Result<(), LauncherError> {
        let steps = self.steps();
        for (position, step) in steps.iter().enumerate() {
            info!(
                step = step.name(),
                position = position + 1,
                total = steps.len(),
                "setup step"
            );
            match step.run(launcher) {
                Ok(()) => {}
                Err(StepError::Failed(message)) => return Err(launcher.fail(step.name(), message)),
                Err(StepError::Launcher(err)) if err.is_configuration() => return Err(err),
                Err(StepError::Launcher(err)) => {
                    return Err(launcher.fail(step.name(), err.to_string()))
                }
            }
        }
        info!("setup finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Settings};
    use crate::dialog::FakeLocator;
    use crate::process::testing::MockRunner;
    use tempfile::{tempdir, TempDir};

    fn settings_in(dir: &TempDir) -> Settings {
        let mut cfg = Config::default();
        cfg.paths.base_dir = dir.path().to_string_lossy().to_string();
        Settings::from_config(&cfg)
    }

    #[test]
    fn standard_pipeline_order() {
        assert_eq!(
            SetupPipeline::standard().steps(),
            &[
                SetupStep::CreateBaseDir,
                SetupStep::CreateTempDir,
                SetupStep::InitPrefix,
                SetupStep::InstallDependencies,
                SetupStep::MapDataDrive,
                SetupStep::InstallZoneBuilder,
                SetupStep::InstallSrb2,
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn full_setup_runs_every_command_in_order() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let runner = MockRunner::default();
        // wineboot, winetricks
        runner.push_stdout(0, "");
        runner.push_stdout(0, "");
        // wget, file, wine installer
        runner.push_stdout(0, "");
        runner.push_stdout(0, "application/x-dosexec\n");
        runner.push_stdout(0, "");
        // wget, file, unzip
        runner.push_stdout(0, "");
        runner.push_stdout(0, "application/zip\n");
        runner.push_stdout(0, "");
        let locator = FakeLocator(vec!["kdialog", "wget"]);

        Launcher::new(&settings, &locator, &runner).setup().unwrap();

        assert_eq!(
            runner.programs(),
            vec![
                "wineboot", "winetricks", "wget", "file", "wine", "wget", "file", "unzip", "kdialog"
            ]
        );
        let calls = runner.calls();
        assert_eq!(
            calls[1].invocation.arguments(),
            &["dotnet35", "d3dx9", "d3dcompiler_43", "vcrun2008", "win7"]
        );
        assert!(calls[4].invocation.arguments()[0].ends_with(".exe"));
        assert_eq!(calls[7].invocation.cwd(), Some(settings.srb2_dir().as_path()));
        assert!(settings.temp_dir.is_dir());

        let drive = settings.drive_link("d");
        assert_eq!(fs::read_link(&drive).unwrap(), settings.data_dir);
        assert!(fs::symlink_metadata(settings.drive_link("z")).is_err());
        assert_eq!(
            fs::read_dir(&settings.temp_dir).unwrap().count(),
            0,
            "downloads are removed after setup"
        );
    }

    #[cfg(unix)]
    #[test]
    fn existing_drive_link_is_replaced() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let drive = settings.drive_link("d");
        let elsewhere = dir.path().join("elsewhere");
        fs::create_dir_all(drive.parent().unwrap()).unwrap();
        fs::create_dir_all(&elsewhere).unwrap();
        std::os::unix::fs::symlink(&elsewhere, &drive).unwrap();
        let runner = MockRunner::default();
        let locator = FakeLocator(vec!["kdialog"]);
        let launcher = Launcher::new(&settings, &locator, &runner);

        SetupPipeline::new(vec![SetupStep::MapDataDrive])
            .run(&launcher)
            .unwrap();

        assert_eq!(fs::read_link(&drive).unwrap(), settings.data_dir);
        assert!(elsewhere.is_dir());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn populated_drive_directory_is_kept_and_aborts() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let drive = settings.drive_link("d");
        fs::create_dir_all(&drive).unwrap();
        let wad = drive.join("user_level.wad");
        fs::write(&wad, b"PWAD").unwrap();
        let runner = MockRunner::default();
        let locator = FakeLocator(vec!["kdialog"]);
        let launcher = Launcher::new(&settings, &locator, &runner);

        let err = SetupPipeline::new(vec![SetupStep::MapDataDrive])
            .run(&launcher)
            .expect_err("real directory at d:");

        match &err {
            LauncherError::Aborted { step, message } => {
                assert_eq!(step, "map data drive");
                assert!(message.contains("is a directory"));
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
        assert_eq!(fs::read(&wad).unwrap(), b"PWAD");
        assert_eq!(runner.programs(), vec!["kdialog"]);
    }

    #[test]
    fn zip_where_exe_expected_aborts_before_running_anything() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        fs::create_dir_all(&settings.temp_dir).unwrap();
        let runner = MockRunner::default();
        runner.push_stdout(0, "");
        runner.push_stdout(0, "application/zip\n");
        let locator = FakeLocator(vec!["kdialog", "curl"]);
        let launcher = Launcher::new(&settings, &locator, &runner);

        let err = SetupPipeline::new(vec![SetupStep::InstallZoneBuilder, SetupStep::InstallSrb2])
            .run(&launcher)
            .expect_err("zip is not an installer");

        match &err {
            LauncherError::Aborted { step, message } => {
                assert_eq!(step, "install ZoneBuilder");
                assert!(message.contains("application/zip"));
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
        let programs = runner.programs();
        assert_eq!(programs, vec!["curl", "file", "kdialog"]);
        let dialog = runner.calls()[2].invocation.tokens().to_vec();
        assert_eq!(dialog[3], "--error");
    }

    #[test]
    fn winetricks_failure_shows_the_update_hint() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        let runner = MockRunner::default();
        runner.push_stdout(1, "");
        let locator = FakeLocator(vec!["zenity"]);
        let launcher = Launcher::new(&settings, &locator, &runner);

        let err = SetupPipeline::new(vec![
            SetupStep::InstallDependencies,
            SetupStep::MapDataDrive,
        ])
        .run(&launcher)
        .expect_err("winetricks failed");

        assert!(err.already_reported());
        assert_eq!(runner.programs(), vec!["winetricks", "zenity"]);
        let text = runner.calls()[1]
            .invocation
            .tokens()
            .iter()
            .find(|token| token.starts_with("--text="))
            .cloned()
            .unwrap();
        assert!(text.contains("https://wiki.winehq.org/Winetricks"));
        assert!(!settings.data_dir.exists(), "later steps never ran");
    }

    #[test]
    fn missing_download_tool_is_reported_in_a_dialog() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        fs::create_dir_all(&settings.temp_dir).unwrap();
        let runner = MockRunner::default();
        let locator = FakeLocator(vec!["kdialog"]);
        let launcher = Launcher::new(&settings, &locator, &runner);

        let err = SetupPipeline::new(vec![SetupStep::InstallSrb2])
            .run(&launcher)
            .expect_err("no wget or curl");
        assert!(err.already_reported());
        assert_eq!(runner.programs(), vec!["kdialog"]);
    }

    #[test]
    fn failure_without_a_dialog_backend_still_aborts() {
        let dir = tempdir().unwrap();
        let settings = settings_in(&dir);
        fs::create_dir_all(&settings.temp_dir).unwrap();
        let runner = MockRunner::default();
        runner.push_stdout(5, "");
        let locator = FakeLocator(vec!["wget"]);
        let launcher = Launcher::new(&settings, &locator, &runner);

        let err = SetupPipeline::new(vec![SetupStep::InstallSrb2])
            .run(&launcher)
            .expect_err("download failed and no dialog backend");
        // printed to stderr instead of shown
        assert!(err.already_reported());
        assert_eq!(runner.programs(), vec!["wget"]);
    }
}
