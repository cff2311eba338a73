//! # Storage Layer
//!
//! The [`NoteBackend`] trait is the single contract both storage adapters
//! implement. The rest of the library (see [`crate::api`]) only talks to
//! `&dyn NoteBackend`, so the two adapters are siblings, never layers.
//!
//! ## Implementations
//!
//! - [`remote::RemoteBackend`]: an HTTP object-storage API. Each note is an
//!   object in one well-known bucket; title and hierarchy live in the object's
//!   metadata sub-resource.
//! - [`local::LocalBackend`]: a user-selected directory. Each note is a
//!   Markdown file; a sidecar `metadata.json` maps filenames to title,
//!   parent and timestamps.
//!
//! ## Storage Layout (local)
//!
//! ```text
//! notes/
//! ├── metadata.json                  # { "<key>": { title, parent_id, created_at, ... } }
//! ├── 1718000000000-k3j9x1.md        # Note bodies, pure Markdown
//! └── 1718000000450-q0aa2z.md
//! ```
//!
//! ## Consistency
//!
//! Writes are two physical steps (content, then metadata on remote; index,
//! then content on local) without rollback. Overlapping writers are
//! last-writer-wins.
//!
//! ## Errors
//!
//! Backends return [`Result`] and propagate with `?`. A missing note on a
//! read is `Ok(None)`; a missing note on delete is `Ok(false)`. Turning
//! every other failure into a null result is the facade's job, not the
//! backend's.

use crate::error::Result;
use crate::model::{Mode, Note, NoteContent, UserMetadata};

pub mod local;
pub mod remote;

pub const MARKDOWN_CONTENT_TYPE: &str = "text/markdown";

/// Note CRUD against one storage backend.
pub trait NoteBackend {
    /// Which mode this backend serves.
    fn mode(&self) -> Mode;

    /// All notes known to the backend.
    fn list_notes(&self) -> Result<Vec<Note>>;

    /// The body of a note, or `None` if it does not exist.
    fn note_content(&self, key: &str) -> Result<Option<NoteContent>>;

    /// Mint a fresh key and store a new note under it.
    fn create_note(
        &self,
        title: &str,
        content: &str,
        parent_id: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>>;

    /// Write content and merge `{title, parent_id, ...extra}` into metadata.
    fn save_note(
        &self,
        key: &str,
        title: &str,
        content: &str,
        parent_id: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>>;

    /// Save while keeping the note's current parent.
    fn update_note(&self, key: &str, title: &str, content: &str) -> Result<Option<Note>>;

    /// Metadata-only write; the stored body is not touched.
    fn update_note_title(
        &self,
        key: &str,
        title: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>>;

    /// Remove a note. `Ok(false)` when there was nothing to remove.
    fn delete_note(&self, key: &str) -> Result<bool>;

    /// The metadata record for a note, or `None` if it does not exist.
    fn note_metadata(&self, key: &str) -> Result<Option<Note>>;
}
