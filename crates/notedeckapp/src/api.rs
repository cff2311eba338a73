//! # API Facade
//!
//! [`NotesApi`] is the single entry point for note operations, whatever the
//! UI. Every call names the [`Mode`] it targets; the facade resolves that to
//! a concrete backend, dispatches, and applies the call-boundary policy.
//!
//! ## Mode Selection
//!
//! There is no process-wide "current mode". Callers keep the mode they want
//! (the CLI reads it from config or `--mode`) and pass it on every call, the
//! same way a scope is passed. Remote is always available; local becomes
//! available once a [`LocalDirectory`] has been attached, which is the explicit
//! setup step for local mode. Selecting a mode never migrates data.
//!
//! ## Boundary Policy
//!
//! Backends return precise errors. At this layer they are logged and folded:
//!
//! | Operation             | On failure       |
//! |-----------------------|------------------|
//! | single-note reads and writes | `None`    |
//! | `delete_note`         | `false`          |
//! | `get_notes`           | error propagated |
//!
//! Listing is the one call that keeps its error, so an unreachable backend
//! is never mistaken for an empty one. A `None` from a write does not say
//! whether an earlier step of that write already landed.

use crate::config::NotesConfig;
use crate::error::{NoteError, Result};
use crate::store::local::LocalBackend;
use crate::store::remote::RemoteBackend;
use crate::store::NoteBackend;
use log::error;

pub use crate::model::{Mode, Note, NoteContent, UserMetadata};
pub use crate::store::local::LocalDirectory;

pub struct NotesApi {
    remote: RemoteBackend,
    local: Option<LocalBackend>,
}

impl NotesApi {
    pub fn new(remote: RemoteBackend) -> Self {
        Self {
            remote,
            local: None,
        }
    }

    pub fn with_local(mut self, dir: LocalDirectory) -> Self {
        self.attach_local(dir);
        self
    }

    /// Build from configuration. A configured `local_dir` must exist.
    pub fn from_config(config: &NotesConfig) -> Result<Self> {
        let remote = RemoteBackend::new(&config.api_base, &config.bucket, config.timeout())?;
        let mut api = Self::new(remote);
        if let Some(dir) = &config.local_dir {
            api.attach_local(LocalDirectory::open(dir)?);
        }
        Ok(api)
    }

    /// Make local mode usable, replacing any previously attached directory.
    pub fn attach_local(&mut self, dir: LocalDirectory) {
        self.local = Some(LocalBackend::new(dir));
    }

    pub fn local_directory(&self) -> Option<&std::path::Path> {
        self.local.as_ref().map(|l| l.root())
    }

    pub fn mode_available(&self, mode: Mode) -> bool {
        self.backend(mode).is_ok()
    }

    /// The concrete backend serving `mode`.
    pub fn backend(&self, mode: Mode) -> Result<&dyn NoteBackend> {
        match mode {
            Mode::Remote => Ok(&self.remote),
            Mode::Local => self
                .local
                .as_ref()
                .map(|l| l as &dyn NoteBackend)
                .ok_or(NoteError::NoDirectory),
        }
    }

    pub fn remote(&self) -> &RemoteBackend {
        &self.remote
    }

    pub fn ensure_bucket_exists(&self) -> Result<()> {
        self.remote.ensure_bucket_exists()
    }

    pub fn get_notes(&self, mode: Mode) -> Result<Vec<Note>> {
        self.backend(mode)?.list_notes().inspect_err(|e| {
            error!("Failed to get notes ({}): {}", mode, e);
        })
    }

    pub fn get_note_content(&self, mode: Mode, key: &str) -> Option<NoteContent> {
        self.boundary(mode, "get note content", |b| b.note_content(key))
    }

    pub fn create_note(
        &self,
        mode: Mode,
        title: &str,
        content: &str,
        parent_id: &str,
        extra: &UserMetadata,
    ) -> Option<Note> {
        self.boundary(mode, "create note", |b| {
            b.create_note(title, content, parent_id, extra)
        })
    }

    pub fn save_note(
        &self,
        mode: Mode,
        key: &str,
        title: &str,
        content: &str,
        parent_id: &str,
        extra: &UserMetadata,
    ) -> Option<Note> {
        self.boundary(mode, "save note", |b| {
            b.save_note(key, title, content, parent_id, extra)
        })
    }

    pub fn update_note(&self, mode: Mode, key: &str, title: &str, content: &str) -> Option<Note> {
        self.boundary(mode, "update note", |b| b.update_note(key, title, content))
    }

    pub fn update_note_title(
        &self,
        mode: Mode,
        key: &str,
        title: &str,
        extra: &UserMetadata,
    ) -> Option<Note> {
        self.boundary(mode, "update note title", |b| {
            b.update_note_title(key, title, extra)
        })
    }

    pub fn delete_note(&self, mode: Mode, key: &str) -> bool {
        match self.backend(mode).and_then(|b| b.delete_note(key)) {
            Ok(deleted) => deleted,
            Err(e) => {
                error!("Failed to delete note {} ({}): {}", key, mode, e);
                false
            }
        }
    }

    pub fn get_note_metadata(&self, mode: Mode, key: &str) -> Option<Note> {
        self.boundary(mode, "get note metadata", |b| b.note_metadata(key))
    }

    fn boundary<T, F>(&self, mode: Mode, what: &str, op: F) -> Option<T>
    where
        F: FnOnce(&dyn NoteBackend) -> Result<Option<T>>,
    {
        match self.backend(mode).and_then(op) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to {} ({}): {}", what, mode, e);
                None
            }
        }
    }
}
