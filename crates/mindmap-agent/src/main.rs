mod archive;
mod config;
mod server;
mod session;
mod storage;

use anyhow::{Context, Result};
use archive::ArchiveStore;
use config::{Cli, Command, Settings};
use mindmap_core::{layout, sanitize::sanitize_str, ArchiveEntry, LayoutOutcome, Viewport};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use storage::{FileStore, KvStore};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = config::parse_args()?;
    let cfg = config::load(&cli)?;
    let settings = config::resolve(&cli, &cfg)?;

    tracing::debug!(
        archive_dir = %settings.archive_dir.display(),
        key = %settings.archive_key,
        dark_mode = settings.layout.dark_mode,
        "settings resolved"
    );

    let store = FileStore::new(&settings.archive_dir).with_quota(settings.quota_bytes);
    let mut archive = ArchiveStore::new(store, settings.archive_key.clone());

    match cli.command {
        Command::Serve => server::run(&settings.socket, archive, settings.layout).await,
        Command::Import { ref path, ref name } => {
            print_json(&import(&mut archive, path, name.as_deref())?)
        }
        Command::List => print_json(&archive.list()),
        Command::Show { id, viewport } => show(&archive, id, viewport, &settings),
        Command::Delete { id } => print_json(&archive.delete(id)),
        Command::Config { write } => write_config(&cli, &cfg, write),
    }
}

fn import<S: KvStore>(
    archive: &mut ArchiveStore<S>,
    path: &Path,
    name: Option<&str>,
) -> Result<ArchiveEntry> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read payload {}", path.display()))?;
    let tree = sanitize_str(&text)
        .with_context(|| format!("payload {} is malformed", path.display()))?;

    let file_name = match name {
        Some(name) => name.to_string(),
        None => path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "untitled".to_string()),
    };

    let before: HashSet<i64> = archive.list().iter().map(|e| e.id).collect();
    archive
        .save(&file_name, &tree)
        .into_iter()
        .find(|e| e.file_name == file_name && !before.contains(&e.id))
        .context("map was not archived; see log for details")
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShowOutput<'a> {
    id: i64,
    file_name: &'a str,
    created_at: &'a str,
    layout: &'a mindmap_core::Layout,
}

fn show<S: KvStore>(
    archive: &ArchiveStore<S>,
    id: i64,
    viewport: Viewport,
    settings: &Settings,
) -> Result<()> {
    let Some(entry) = archive.get(id) else {
        anyhow::bail!("no archived map with id {id}");
    };
    let outcome = layout(&entry.mind_map_data, viewport, &settings.layout);
    let LayoutOutcome::Ready(layout) = outcome else {
        anyhow::bail!("viewport {}x{} has no area", viewport.width, viewport.height);
    };
    print_json(&ShowOutput {
        id: entry.id,
        file_name: &entry.file_name,
        created_at: &entry.created_at,
        layout: &layout,
    })
}

fn write_config(cli: &Cli, cfg: &config::AgentConfig, write: bool) -> Result<()> {
    if !write {
        print!("{}", toml::to_string_pretty(cfg).context("failed to serialize agent config")?);
        return Ok(());
    }
    let path = match &cli.config_path {
        Some(path) => path.clone(),
        None => config::default_config_path().context("no config directory available")?,
    };
    config::save_to_path(cfg, &path)?;
    tracing::info!(path = %path.display(), "agent config written");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("failed to encode output")?;
    println!("{out}");
    Ok(())
}
