use anyhow::{Context, Result};
use directories::ProjectDirs;
use mindmap_core::{LayoutConfig, Viewport};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::DEFAULT_KEY;

const DEFAULT_SHOW_WIDTH: f64 = 1280.0;
const DEFAULT_SHOW_HEIGHT: f64 = 800.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveSettings {
    pub dir: Option<PathBuf>,
    pub key: String,
    pub quota_bytes: Option<u64>,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            dir: None,
            key: DEFAULT_KEY.to_string(),
            quota_bytes: None,
        }
    }
}

/// Contents of `agent.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub socket: Option<String>,
    pub layout: LayoutConfig,
    pub archive: ArchiveSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Serve,
    Import { path: PathBuf, name: Option<String> },
    List,
    Show { id: i64, viewport: Viewport },
    Delete { id: i64 },
    Config { write: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cli {
    pub config_path: Option<PathBuf>,
    pub socket: Option<String>,
    pub archive_dir: Option<PathBuf>,
    pub dark: bool,
    pub command: Command,
}

/// Effective settings after merging the config file and CLI flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub socket: String,
    pub archive_dir: PathBuf,
    pub archive_key: String,
    pub quota_bytes: Option<u64>,
    pub layout: LayoutConfig,
}

pub fn parse_args() -> Result<Cli> {
    parse_args_from(std::env::args_os().skip(1))
}

fn parse_args_from<I>(args: I) -> Result<Cli>
where
    I: IntoIterator<Item = OsString>,
{
    let mut config_path = None;
    let mut socket = None;
    let mut archive_dir = None;
    let mut dark = false;
    let mut name = None;
    let mut write = false;
    let mut width = DEFAULT_SHOW_WIDTH;
    let mut height = DEFAULT_SHOW_HEIGHT;
    let mut words = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let arg = arg.to_string_lossy().into_owned();
        match arg.as_str() {
            "--config" => config_path = Some(PathBuf::from(value_for(&mut args, "--config")?)),
            "--socket" => socket = Some(value_for(&mut args, "--socket")?),
            "--archive-dir" => {
                archive_dir = Some(PathBuf::from(value_for(&mut args, "--archive-dir")?))
            }
            "--name" => name = Some(value_for(&mut args, "--name")?),
            "--width" => width = number_for(&mut args, "--width")?,
            "--height" => height = number_for(&mut args, "--height")?,
            "--dark" => dark = true,
            "--write" => write = true,
            flag if flag.starts_with("--") => anyhow::bail!("unknown argument: {flag}"),
            word => words.push(word.to_string()),
        }
    }

    let mut words = words.into_iter();
    let command = match words.next().as_deref() {
        None | Some("serve") => Command::Serve,
        Some("import") => {
            let Some(path) = words.next() else {
                anyhow::bail!("import expects a payload file");
            };
            Command::Import {
                path: PathBuf::from(path),
                name,
            }
        }
        Some("list") => Command::List,
        Some("show") => Command::Show {
            id: id_from(words.next(), "show")?,
            viewport: Viewport::new(width, height),
        },
        Some("delete") => Command::Delete {
            id: id_from(words.next(), "delete")?,
        },
        Some("config") => Command::Config { write },
        Some(other) => anyhow::bail!(
            "unknown command: {other} (expected serve|import|list|show|delete|config)"
        ),
    };
    if let Some(extra) = words.next() {
        anyhow::bail!("unexpected argument: {extra}");
    }

    Ok(Cli {
        config_path,
        socket,
        archive_dir,
        dark,
        command,
    })
}

fn value_for<I>(args: &mut I, flag: &str) -> Result<String>
where
    I: Iterator<Item = OsString>,
{
    let Some(value) = args.next() else {
        anyhow::bail!("{flag} expects a value");
    };
    Ok(value.to_string_lossy().into_owned())
}

fn number_for<I>(args: &mut I, flag: &str) -> Result<f64>
where
    I: Iterator<Item = OsString>,
{
    let raw = value_for(args, flag)?;
    raw.parse::<f64>()
        .with_context(|| format!("{flag} expects a number, got {raw}"))
}

fn id_from(word: Option<String>, command: &str) -> Result<i64> {
    let Some(word) = word else {
        anyhow::bail!("{command} expects an archive id");
    };
    word.parse::<i64>()
        .with_context(|| format!("invalid archive id: {word}"))
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "mindmap")
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(project_dirs()?.config_dir().join("agent.toml"))
}

fn default_archive_dir() -> Option<PathBuf> {
    Some(project_dirs()?.data_dir().to_path_buf())
}

pub fn default_socket_path() -> String {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        format!("{dir}/mindmap.sock")
    } else {
        "/tmp/mindmap.sock".to_string()
    }
}

/// An explicit `--config` must load; the default location falls back to defaults.
pub fn load(cli: &Cli) -> Result<AgentConfig> {
    match &cli.config_path {
        Some(path) => load_from_path(path),
        None => Ok(default_config_path()
            .map(|path| load_or_default_from_path(&path))
            .unwrap_or_default()),
    }
}

fn load_from_path(path: &Path) -> Result<AgentConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read agent config {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse agent config {}", path.display()))
}

fn load_or_default_from_path(path: &Path) -> AgentConfig {
    if !path.exists() {
        return AgentConfig::default();
    }
    load_from_path(path).unwrap_or_else(|err| {
        tracing::warn!(error = ?err, "ignoring unreadable agent config");
        AgentConfig::default()
    })
}

pub fn save_to_path(cfg: &AgentConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    let data = toml::to_string_pretty(cfg).context("failed to serialize agent config")?;
    fs::write(path, data)
        .with_context(|| format!("failed to write agent config {}", path.display()))?;
    Ok(())
}

pub fn resolve(cli: &Cli, cfg: &AgentConfig) -> Result<Settings> {
    let archive_dir = match cli.archive_dir.clone().or_else(|| cfg.archive.dir.clone()) {
        Some(dir) => dir,
        None => default_archive_dir()
            .context("no data directory available; pass --archive-dir")?,
    };
    let mut layout = cfg.layout.clone();
    layout.dark_mode |= cli.dark;

    Ok(Settings {
        socket: cli
            .socket
            .clone()
            .or_else(|| cfg.socket.clone())
            .unwrap_or_else(default_socket_path),
        archive_dir,
        archive_key: cfg.archive.key.clone(),
        quota_bytes: cfg.archive.quota_bytes,
        layout,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn args(words: &[&str]) -> Vec<OsString> {
        words.iter().map(OsString::from).collect()
    }

    #[test]
    fn no_command_means_serve() {
        let cli = parse_args_from(args(&[])).expect("parsed");
        assert_eq!(cli.command, Command::Serve);
        assert!(!cli.dark);
    }

    #[test]
    fn parses_import_with_name_and_flags() {
        let cli = parse_args_from(args(&[
            "--archive-dir",
            "/tmp/maps",
            "import",
            "payload.json",
            "--name",
            "paper.pdf",
            "--dark",
        ]))
        .expect("parsed");

        assert_eq!(cli.archive_dir, Some(PathBuf::from("/tmp/maps")));
        assert!(cli.dark);
        assert_eq!(
            cli.command,
            Command::Import {
                path: PathBuf::from("payload.json"),
                name: Some("paper.pdf".to_string()),
            }
        );
    }

    #[test]
    fn parses_show_with_viewport() {
        let cli = parse_args_from(args(&["show", "42", "--width", "640", "--height", "480"]))
            .expect("parsed");
        assert_eq!(
            cli.command,
            Command::Show {
                id: 42,
                viewport: Viewport::new(640.0, 480.0),
            }
        );
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args_from(args(&["delete"])).is_err());
        assert!(parse_args_from(args(&["delete", "abc"])).is_err());
        assert!(parse_args_from(args(&["frobnicate"])).is_err());
        assert!(parse_args_from(args(&["--verbose"])).is_err());
        assert!(parse_args_from(args(&["list", "extra"])).is_err());
        assert!(parse_args_from(args(&["--socket"])).is_err());
    }

    #[test]
    fn agent_config_roundtrip_save_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("agent.toml");
        let cfg = AgentConfig {
            socket: Some("/tmp/custom.sock".to_string()),
            archive: ArchiveSettings {
                dir: Some(dir.path().join("maps")),
                key: "maps".to_string(),
                quota_bytes: Some(5 * 1024 * 1024),
            },
            ..AgentConfig::default()
        };

        save_to_path(&cfg, &path).expect("save config");
        let loaded = load_from_path(&path).expect("load config");

        assert_eq!(cfg, loaded);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: AgentConfig = toml::from_str(
            r#"
[layout]
units_per_leaf = 50.0
dark_mode = true
"#,
        )
        .expect("parse");

        assert_eq!(cfg.layout.units_per_leaf, 50.0);
        assert!(cfg.layout.dark_mode);
        assert_eq!(cfg.layout.padding, LayoutConfig::default().padding);
        assert_eq!(cfg.archive.key, DEFAULT_KEY);
    }

    #[test]
    fn unreadable_default_config_falls_back() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("agent.toml");
        fs::write(&path, "layout = 3").expect("write");

        assert_eq!(load_or_default_from_path(&path), AgentConfig::default());
        assert!(load_from_path(&path).is_err());
    }

    #[test]
    fn cli_flags_override_file_settings() {
        let cli = parse_args_from(args(&[
            "--socket",
            "/run/a.sock",
            "--dark",
            "--archive-dir",
            "/data",
        ]))
        .expect("parsed");
        let cfg = AgentConfig {
            socket: Some("/tmp/file.sock".to_string()),
            ..AgentConfig::default()
        };

        let settings = resolve(&cli, &cfg).expect("resolve");

        assert_eq!(settings.socket, "/run/a.sock");
        assert_eq!(settings.archive_dir, PathBuf::from("/data"));
        assert!(settings.layout.dark_mode);
        assert_eq!(settings.archive_key, DEFAULT_KEY);
    }
}
