//! # Notedeck Architecture
//!
//! Notedeck is a **UI-agnostic note library**. Notes are Markdown documents
//! with a title, a place in a folder hierarchy, and timestamps. They can live
//! in one of two interchangeable places:
//!
//! - a remote HTTP object store (`bucket → key → bytes + JSON metadata`)
//! - a local directory (`*.md` files plus a `metadata.json` index)
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI (crates/notedeck)                                      │
//! │  - Parses arguments, formats output, owns stdout/stderr     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Resolves a Mode to a backend                             │
//! │  - Logs failures, folds them to None / false                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - NoteBackend trait                                        │
//! │  - RemoteBackend (HTTP), LocalBackend (directory)           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No I/O Assumptions in Core
//!
//! From `api.rs` inward, code never prints, never exits the process and never
//! prompts. Local mode needs a [`store::local::LocalDirectory`], obtained
//! explicitly by the caller; nothing here opens a picker as a side effect.
//!
//! ## Module Overview
//!
//! - [`api`]: the facade, entry point for all operations
//! - [`store`]: the backend trait and both implementations
//! - [`model`]: `Note`, `NoteContent`, `UserMetadata`, `Mode`
//! - [`keys`]: key minting and validation
//! - [`config`]: persisted configuration
//! - [`error`]: error types

pub mod api;
pub mod config;
pub mod error;
pub mod keys;
pub mod model;
pub mod store;
