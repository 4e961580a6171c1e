mod config;
mod dialog;
mod download;
mod error;
mod launcher;
mod probe;
mod process;
mod setup;

use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use dialoguer::console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use crate::config::{
    load_config, read_config, resolve_config_path, Config, Settings, DEFAULT_CONFIG_YAML,
};
use crate::dialog::{detect, ExecutableLocator, Ui, WhichLocator};
use crate::download::DownloadTool;
use crate::error::LauncherError;
use crate::launcher::{Launcher, LauncherAction};
use crate::process::SystemRunner;

#[derive(Parser, Debug)]
#[command(name = "zblaunch", version, about = "ZoneBuilder launcher for Wine")]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    json: bool,
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the main menu (default)
    Menu,
    /// Create the prefix and install ZoneBuilder and SRB2
    Setup {
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
    /// Run ZoneBuilder
    Launch,
    Winecfg,
    Winetricks,
    Regedit,
    /// Kill the prefix's wineserver
    Kill,
    /// Run a Windows executable in the prefix
    Exec { path: Option<PathBuf> },
    /// Check host tools and install state
    Doctor,
    Paths,
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

impl Commands {
    /// Commands whose failures are shown in an Error dialog.
    fn uses_dialogs(&self) -> bool {
        !matches!(
            self,
            Commands::Doctor | Commands::Paths | Commands::Config { .. }
        )
    }
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Init,
    Validate,
    Show,
}

#[derive(Debug, Serialize)]
struct JsonResult<T: Serialize> {
    ok: bool,
    result: Option<T>,
    error: Option<String>,
}

struct Context {
    config_path: PathBuf,
    json: bool,
}

fn init_tracing(debug: bool) {
    let default_level = if debug { "zblaunch=debug" } else { "zblaunch=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<(), LauncherError> {
    let cli = Cli::parse();
    let ctx = Context {
        config_path: resolve_config_path(cli.config.as_ref()),
        json: cli.json,
    };
    let loaded = load_config(&ctx.config_path);
    init_tracing(cli.debug || matches!(&loaded, Ok(cfg) if cfg.debug));
    debug!(config = %ctx.config_path.display(), "starting");

    let locator = WhichLocator;
    let runner = SystemRunner;
    let command = cli.command.unwrap_or(Commands::Menu);
    let dialogs = command.uses_dialogs();

    let result = match command {
        Commands::Config { command } => handle_config(&ctx, command),
        command => loaded.and_then(|cfg| {
            let settings = Settings::from_config(&cfg);
            let launcher = Launcher::new(&settings, &locator, &runner);
            dispatch(&ctx, command, &launcher)
        }),
    };

    if let Err(err) = result {
        report_failure(&ctx, &err, dialogs.then(|| Ui::new(&locator, &runner)))?;
        std::process::exit(1);
    }
    Ok(())
}

fn dispatch(ctx: &Context, command: Commands, launcher: &Launcher<'_>) -> Result<(), LauncherError> {
    match command {
        Commands::Menu => launcher.main_menu(),
        Commands::Setup { yes } => handle_setup(launcher, yes),
        Commands::Launch => launcher.perform(LauncherAction::LaunchBuilder),
        Commands::Winecfg => launcher.perform(LauncherAction::Winecfg),
        Commands::Winetricks => launcher.perform(LauncherAction::Winetricks),
        Commands::Regedit => launcher.perform(LauncherAction::Regedit),
        Commands::Kill => launcher.perform(LauncherAction::KillWineserver),
        Commands::Exec { path } => launcher.run_exe(path.as_deref()),
        Commands::Doctor => handle_doctor(ctx, launcher),
        Commands::Paths => handle_paths(ctx, launcher.settings()),
        Commands::Config { command } => handle_config(ctx, command),
    }
}

/// Errors already shown in a dialog are not repeated. Configuration errors go
/// to stderr only; anything else is offered to the dialog layer first.
fn report_failure(ctx: &Context, err: &LauncherError, ui: Option<Ui<'_>>) -> Result<(), LauncherError> {
    error!(error = %err, "command failed");
    if ctx.json {
        let payload = JsonResult::<serde_json::Value> {
            ok: false,
            result: None,
            error: Some(err.to_string()),
        };
        return print_json(&payload);
    }
    if err.already_reported() {
        return Ok(());
    }
    if !err.is_configuration() {
        if let Some(ui) = ui {
            match ui.show_error(&err.to_string()) {
                Ok(()) => return Ok(()),
                Err(dialog_err) => debug!(error = %dialog_err, "error dialog unavailable"),
            }
        }
    }
    eprintln!("{err}");
    Ok(())
}

fn handle_setup(launcher: &Launcher<'_>, yes: bool) -> Result<(), LauncherError> {
    if launcher.settings().is_installed() && !yes {
        if !io::stdin().is_terminal() {
            return Err(LauncherError::InvalidArgument(
                "ZoneBuilder is already installed; pass --yes to run setup again".to_string(),
            ));
        }
        let again = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt("ZoneBuilder is already installed. Run setup again?")
            .default(false)
            .interact()?;
        if !again {
            return Ok(());
        }
    }
    launcher.setup()
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    id: String,
    ok: bool,
    required: bool,
    message: String,
}

fn tool_check(locator: &dyn ExecutableLocator, program: &str) -> DoctorCheck {
    let ok = locator.is_available(program);
    DoctorCheck {
        id: program.to_string(),
        ok,
        required: true,
        message: if ok {
            format!("{program} found")
        } else {
            format!("{program} not found on PATH")
        },
    }
}

fn collect_doctor_checks(launcher: &Launcher<'_>) -> Vec<DoctorCheck> {
    let locator = launcher.locator();
    let mut checks = Vec::new();
    checks.push(match detect(locator) {
        Ok(backend) => DoctorCheck {
            id: "dialog".to_string(),
            ok: true,
            required: true,
            message: format!("using {backend}"),
        },
        Err(err) => DoctorCheck {
            id: "dialog".to_string(),
            ok: false,
            required: true,
            message: err.to_string(),
        },
    });
    for program in ["file", "wine", "winetricks", "wineserver", "unzip"] {
        checks.push(tool_check(locator, program));
    }
    checks.push(match DownloadTool::detect(locator) {
        Ok(tool) => DoctorCheck {
            id: "download".to_string(),
            ok: true,
            required: true,
            message: format!("using {}", tool.program()),
        },
        Err(err) => DoctorCheck {
            id: "download".to_string(),
            ok: false,
            required: true,
            message: err.to_string(),
        },
    });
    let installed = launcher.settings().is_installed();
    checks.push(DoctorCheck {
        id: "zonebuilder".to_string(),
        ok: installed,
        required: false,
        message: if installed {
            format!("installed at {}", launcher.settings().builder_exe().display())
        } else {
            "not installed; run `zblaunch setup`".to_string()
        },
    });
    checks
}

fn handle_doctor(ctx: &Context, launcher: &Launcher<'_>) -> Result<(), LauncherError> {
    let checks = collect_doctor_checks(launcher);
    let missing: Vec<&str> = checks
        .iter()
        .filter(|check| check.required && !check.ok)
        .map(|check| check.id.as_str())
        .collect();
    let ok = missing.is_empty();

    if ctx.json {
        let payload = JsonResult {
            ok,
            result: Some(json!({ "checks": checks })),
            error: if ok {
                None
            } else {
                Some(format!("missing: {}", missing.join(", ")))
            },
        };
        print_json(&payload)?;
        if !ok {
            std::process::exit(1);
        }
        return Ok(());
    }

    for check in &checks {
        let state = match (check.ok, check.required) {
            (true, _) => style("ok").green(),
            (false, true) => style("fail").red(),
            (false, false) => style("warn").yellow(),
        };
        println!("[{}] {} - {}", state, style(&check.id).bold(), check.message);
    }
    if ok {
        return Ok(());
    }
    Err(LauncherError::Process(format!(
        "required tools missing: {}",
        missing.join(", ")
    )))
}

fn handle_paths(ctx: &Context, settings: &Settings) -> Result<(), LauncherError> {
    output(
        ctx,
        json!({
            "config_path": ctx.config_path,
            "config_exists": ctx.config_path.exists(),
            "base_dir": settings.base_dir,
            "data_dir": settings.data_dir,
            "temp_dir": settings.temp_dir,
            "prefix_dir": settings.prefix_dir,
            "builder_exe": settings.builder_exe(),
            "installed": settings.is_installed(),
        }),
    )
}

fn handle_config(ctx: &Context, command: ConfigCommand) -> Result<(), LauncherError> {
    match command {
        ConfigCommand::Init => {
            if ctx.config_path.exists() {
                return output(ctx, json!({"path": ctx.config_path, "created": false}));
            }
            ensure_parent(&ctx.config_path)?;
            fs::write(&ctx.config_path, DEFAULT_CONFIG_YAML)?;
            output(ctx, json!({"path": ctx.config_path, "created": true}))
        }
        ConfigCommand::Validate => {
            let _cfg = read_config(&ctx.config_path)?;
            output(ctx, json!({"path": ctx.config_path, "valid": true}))
        }
        ConfigCommand::Show => {
            let cfg: Config = load_config(&ctx.config_path)?;
            if ctx.json {
                return output(ctx, serde_json::to_value(&cfg)?);
            }
            print!("{}", serde_yaml::to_string(&cfg)?);
            Ok(())
        }
    }
}

fn ensure_parent(path: &Path) -> Result<(), LauncherError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn output(ctx: &Context, payload: serde_json::Value) -> Result<(), LauncherError> {
    if ctx.json {
        let wrapper = JsonResult {
            ok: true,
            result: Some(payload),
            error: None,
        };
        print_json(&wrapper)?;
    } else {
        println!("{}", payload);
    }
    Ok(())
}

fn print_json<T: Serialize>(payload: &T) -> Result<(), LauncherError> {
    let text = serde_json::to_string_pretty(payload)?;
    println!("{}", text);
    Ok(())
}
