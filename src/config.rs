use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dirs::home_dir;
use serde::{Deserialize, Serialize};

use crate::error::LauncherError;
use crate::process::WinePrefix;

pub const DEFAULT_CONFIG_YAML: &str = include_str!("../config/default.yaml");

/// Where the installer puts the editor, as Wine sees it.
pub const BUILDER_WINDOWS_PATH: &str = r"C:\Program Files\Zone Builder\Builder.exe";
const BUILDER_PREFIX_RELATIVE: &str = "drive_c/Program Files/Zone Builder/Builder.exe";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub version: u32,
    pub debug: bool,
    pub paths: Paths,
    pub wine: Wine,
    pub downloads: Downloads,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    pub base_dir: String,
    pub temp_dir: Option<String>,
    pub prefix: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Wine {
    pub arch: String,
    pub data_drive: String,
    pub winetricks_verbs: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Downloads {
    pub zone_builder_url: String,
    pub srb2_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            paths: Paths::default(),
            wine: Wine::default(),
            downloads: Downloads::default(),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            base_dir: "~/Games/SRB2DATA".to_string(),
            temp_dir: None,
            prefix: None,
        }
    }
}

impl Default for Wine {
    fn default() -> Self {
        Self {
            arch: "win32".to_string(),
            data_drive: "d".to_string(),
            // gdiplus_winxp is left out on purpose: it crashes current Wine builds.
            winetricks_verbs: ["dotnet35", "d3dx9", "d3dcompiler_43", "vcrun2008", "win7"]
                .iter()
                .map(|verb| verb.to_string())
                .collect(),
        }
    }
}

impl Default for Downloads {
    fn default() -> Self {
        Self {
            zone_builder_url: "https://mb.srb2.org/addons/zone-builder.149/download".to_string(),
            srb2_url: "https://github.com/STJr/SRB2/releases/download/SRB2_release_2.2.9/SRB2-v229-Full.zip"
                .to_string(),
        }
    }
}

pub fn read_config_from_str(content: &str) -> Result<Config, LauncherError> {
    let cfg: Config = serde_yaml::from_str(content)?;
    if cfg.version != 1 {
        return Err(LauncherError::Config(format!(
            "unsupported config version {}",
            cfg.version
        )));
    }
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn read_config(path: &Path) -> Result<Config, LauncherError> {
    let content = fs::read_to_string(path)?;
    read_config_from_str(&content)
}

/// Like [`read_config`], but a missing file means "use the defaults".
pub fn load_config(path: &Path) -> Result<Config, LauncherError> {
    match fs::read_to_string(path) {
        Ok(content) => read_config_from_str(&content),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Config::default()),
        Err(err) => Err(LauncherError::Io(err)),
    }
}

fn validate_config(cfg: &Config) -> Result<(), LauncherError> {
    if cfg.paths.base_dir.trim().is_empty() {
        return Err(LauncherError::Config(
            "paths.base_dir must be non-empty".to_string(),
        ));
    }
    for (field, value) in [
        ("paths.temp_dir", &cfg.paths.temp_dir),
        ("paths.prefix", &cfg.paths.prefix),
    ] {
        if matches!(value, Some(v) if v.trim().is_empty()) {
            return Err(LauncherError::Config(format!(
                "{field} must be non-empty when set"
            )));
        }
    }
    if cfg.wine.arch != "win32" && cfg.wine.arch != "win64" {
        return Err(LauncherError::Config(format!(
            "wine.arch must be win32 or win64, got '{}'",
            cfg.wine.arch
        )));
    }
    let drive = cfg.wine.data_drive.to_ascii_lowercase();
    let valid_drive = drive.len() == 1
        && drive.chars().all(|c| c.is_ascii_lowercase())
        && drive != "c";
    if !valid_drive {
        return Err(LauncherError::Config(format!(
            "wine.data_drive must be a single drive letter other than c, got '{}'",
            cfg.wine.data_drive
        )));
    }
    if cfg.wine.winetricks_verbs.iter().any(|verb| verb.trim().is_empty()) {
        return Err(LauncherError::Config(
            "wine.winetricks_verbs must not contain empty entries".to_string(),
        ));
    }
    for (field, url) in [
        ("downloads.zone_builder_url", &cfg.downloads.zone_builder_url),
        ("downloads.srb2_url", &cfg.downloads.srb2_url),
    ] {
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(LauncherError::Config(format!(
                "{field} must be an http(s) URL, got '{url}'"
            )));
        }
    }
    Ok(())
}

pub fn expand_path(input: &str) -> String {
    if input == "~" {
        if let Some(home) = home_dir() {
            return home.to_string_lossy().to_string();
        }
    }
    if let Some(stripped) = input.strip_prefix("~/") {
        if let Some(home) = home_dir() {
            return home.join(stripped).to_string_lossy().to_string();
        }
    }
    input.to_string()
}

pub fn resolve_config_path(override_path: Option<&PathBuf>) -> PathBuf {
    if let Some(path) = override_path {
        return path.clone();
    }
    if let Ok(path) = env::var("ZBLAUNCH_CONFIG") {
        return PathBuf::from(path);
    }
    let mut base = default_config_dir();
    base.push("config.yaml");
    base
}

pub fn default_config_dir() -> PathBuf {
    if let Ok(path) = env::var("ZBLAUNCH_CONFIG_DIR") {
        return PathBuf::from(path);
    }
    let mut base = home_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push(".config");
    base.push("zblaunch");
    base
}

/// Resolved, read-only settings shared by every component for the lifetime of
/// the process.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub base_dir: PathBuf,
    pub data_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub prefix_dir: PathBuf,
    pub wine_arch: String,
    pub data_drive: String,
    pub winetricks_verbs: Vec<String>,
    pub zone_builder_url: String,
    pub srb2_url: String,
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Self {
        let base_dir = PathBuf::from(expand_path(cfg.paths.base_dir.trim()));
        let data_dir = base_dir.join("data");
        let temp_dir = match &cfg.paths.temp_dir {
            Some(dir) => PathBuf::from(expand_path(dir.trim())),
            None => data_dir.join(".tmp"),
        };
        let prefix_dir = match &cfg.paths.prefix {
            Some(dir) => PathBuf::from(expand_path(dir.trim())),
            None => base_dir.join("prefix"),
        };
        Self {
            base_dir,
            data_dir,
            temp_dir,
            prefix_dir,
            wine_arch: cfg.wine.arch.clone(),
            data_drive: cfg.wine.data_drive.to_ascii_lowercase(),
            winetricks_verbs: cfg.wine.winetricks_verbs.clone(),
            zone_builder_url: cfg.downloads.zone_builder_url.clone(),
            srb2_url: cfg.downloads.srb2_url.clone(),
        }
    }

    pub fn prefix(&self) -> WinePrefix {
        WinePrefix::new(&self.prefix_dir, &self.wine_arch)
    }

    pub fn builder_exe(&self) -> PathBuf {
        self.prefix_dir.join(BUILDER_PREFIX_RELATIVE)
    }

    pub fn is_installed(&self) -> bool {
        self.builder_exe().exists()
    }

    pub fn srb2_dir(&self) -> PathBuf {
        self.data_dir.join("SRB2")
    }

    /// The `dosdevices` entry Wine resolves `<letter>:` through.
    pub fn drive_link(&self, letter: &str) -> PathBuf {
        self.prefix_dir.join("dosdevices").join(format!("{letter}:"))
    }
}
