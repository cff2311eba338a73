//! # CLI Layer
//!
//! This module is one client of `notedeckapp`, not the application itself.
//! It is the only place that touches stdout/stderr, reads stdin, or sets up
//! logging.
//!
//! ## Structure
//!
//! - `run()`: parse arguments, build the context, dispatch
//! - `init_context()`: load config, apply `--mode`/`--dir`, build `NotesApi`.
//!   Built lazily so `config` works without a usable backend.
//! - `handle_*()`: one per command; call the API and print
//!
//! The API folds single-note failures to `None`/`false` after logging them;
//! handlers turn those into a non-zero exit with a short message. Run with
//! `-v` (or `RUST_LOG=debug`) to see the underlying cause.

use super::print::{print_full_note, print_info, print_notes, print_success};
use super::setup::{Cli, Commands};
use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, warn};
use notedeckapp::api::{LocalDirectory, Mode, NotesApi, UserMetadata};
use notedeckapp::config::NotesConfig;
use notedeckapp::store::remote::RemoteBackend;
use std::io::Read;
use std::path::{Path, PathBuf};

struct AppContext {
    api: NotesApi,
    mode: Mode,
}

pub fn run() -> Result<()> {
    let Cli {
        command,
        mode,
        dir,
        verbose,
    } = Cli::parse();
    init_logging(verbose);

    let config_dir = NotesConfig::default_dir()?;
    let context = || init_context(mode.map(Mode::from), dir.as_deref(), &config_dir);

    match command {
        None => handle_list(&context()?, false),
        Some(Commands::List { json }) => handle_list(&context()?, json),
        Some(Commands::View { key }) => handle_view(&context()?, &key),
        Some(Commands::Create {
            title,
            content,
            parent,
            meta,
        }) => handle_create(
            &context()?,
            &title,
            content.as_deref(),
            parent.as_deref().unwrap_or(""),
            meta,
        ),
        Some(Commands::Edit {
            key,
            title,
            content,
        }) => handle_edit(&context()?, &key, title, content.as_deref()),
        Some(Commands::Rename { key, title, meta }) => {
            handle_rename(&context()?, &key, &title, meta)
        }
        Some(Commands::Delete { key }) => handle_delete(&context()?, &key),
        Some(Commands::Meta { key }) => handle_meta(&context()?, &key),
        Some(Commands::Config { key, value }) => {
            handle_config(&config_dir, key.as_deref(), value.as_deref())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn init_context(mode: Option<Mode>, dir: Option<&Path>, config_dir: &Path) -> Result<AppContext> {
    let config = NotesConfig::load(config_dir)
        .with_context(|| format!("Failed to load config from {}", config_dir.display()))?;
    let mode = mode.unwrap_or(config.mode);
    debug!("Using {} mode", mode);

    let remote = RemoteBackend::new(&config.api_base, &config.bucket, config.timeout())?;
    let mut api = NotesApi::new(remote);

    let local_dir: Option<PathBuf> = dir.map(Path::to_path_buf).or(config.local_dir);
    if let Some(dir) = local_dir {
        match LocalDirectory::open(&dir) {
            Ok(dir) => api.attach_local(dir),
            Err(e) if mode == Mode::Local => {
                return Err(e).with_context(|| format!("Cannot use {}", dir.display()));
            }
            Err(e) => warn!("Ignoring local directory {}: {}", dir.display(), e),
        }
    }

    if !api.mode_available(mode) {
        bail!(
            "No notes directory selected. Pass --dir <path> or run `notedeck config local-dir <path>`"
        );
    }

    Ok(AppContext { api, mode })
}

fn handle_list(ctx: &AppContext, json: bool) -> Result<()> {
    let notes = ctx.api.get_notes(ctx.mode)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&notes)?);
    } else {
        print_notes(&notes);
    }
    Ok(())
}

fn handle_view(ctx: &AppContext, key: &str) -> Result<()> {
    let mut content = ctx
        .api
        .get_note_content(ctx.mode, key)
        .ok_or_else(|| anyhow!("Note not found: {}", key))?;

    // Remote content carries no title of its own
    if content.title.is_empty() {
        if let Some(meta) = ctx.api.get_note_metadata(ctx.mode, key) {
            content.title = meta.title().to_string();
        }
    }

    print_full_note(key, &content);
    Ok(())
}

fn handle_create(
    ctx: &AppContext,
    title: &str,
    content: Option<&str>,
    parent_id: &str,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let content = resolve_content(content)?.unwrap_or_default();
    let extra: UserMetadata = meta.into_iter().collect();

    let note = ctx
        .api
        .create_note(ctx.mode, title, &content, parent_id, &extra)
        .ok_or_else(|| anyhow!("Failed to create note (run with -v for details)"))?;

    print_success(&format!("Created {}: {}", note.key, note.title()));
    Ok(())
}

fn handle_edit(
    ctx: &AppContext,
    key: &str,
    title: Option<String>,
    content: Option<&str>,
) -> Result<()> {
    let content = resolve_content(content)?;
    if title.is_none() && content.is_none() {
        bail!("Nothing to change: pass --title and/or --content");
    }

    let current = ctx
        .api
        .get_note_metadata(ctx.mode, key)
        .ok_or_else(|| anyhow!("Note not found: {}", key))?;
    let title = title.unwrap_or_else(|| current.title().to_string());
    let content = match content {
        Some(content) => content,
        None => {
            ctx.api
                .get_note_content(ctx.mode, key)
                .ok_or_else(|| anyhow!("Could not read the content of {}", key))?
                .content
        }
    };

    let note = ctx
        .api
        .update_note(ctx.mode, key, &title, &content)
        .ok_or_else(|| anyhow!("Failed to update {} (run with -v for details)", key))?;

    print_success(&format!("Updated {}: {}", note.key, note.title()));
    Ok(())
}

fn handle_rename(
    ctx: &AppContext,
    key: &str,
    title: &str,
    meta: Vec<(String, String)>,
) -> Result<()> {
    let extra: UserMetadata = meta.into_iter().collect();
    let note = ctx
        .api
        .update_note_title(ctx.mode, key, title, &extra)
        .ok_or_else(|| anyhow!("Failed to rename {} (run with -v for details)", key))?;

    print_success(&format!("Renamed {}: {}", note.key, note.title()));
    Ok(())
}

fn handle_delete(ctx: &AppContext, key: &str) -> Result<()> {
    if !ctx.api.delete_note(ctx.mode, key) {
        bail!("Nothing deleted for {}", key);
    }
    print_success(&format!("Deleted {}", key));
    Ok(())
}

fn handle_meta(ctx: &AppContext, key: &str) -> Result<()> {
    let note = ctx
        .api
        .get_note_metadata(ctx.mode, key)
        .ok_or_else(|| anyhow!("Note not found: {}", key))?;
    println!("{}", serde_json::to_string_pretty(&note)?);
    Ok(())
}

fn handle_config(config_dir: &Path, key: Option<&str>, value: Option<&str>) -> Result<()> {
    let mut config = NotesConfig::load(config_dir)?;

    match (key, value) {
        (None, _) => {
            for key in NotesConfig::KEYS {
                println!("{} = {}", key, config.get(key)?);
            }
        }
        (Some(key), None) => println!("{}", config.get(key)?),
        (Some(key), Some(value)) => {
            config.set(key, value)?;
            config.save(config_dir)?;
            print_info(&format!("{} = {}", key, config.get(key)?));
        }
    }
    Ok(())
}

/// `-` means "read the body from stdin".
fn resolve_content(arg: Option<&str>) -> Result<Option<String>> {
    match arg {
        Some("-") => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read content from stdin")?;
            Ok(Some(buffer))
        }
        Some(content) => Ok(Some(content.to_string())),
        None => Ok(None),
    }
}
