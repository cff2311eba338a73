//! Note key minting and validation.
//!
//! Keys are opaque to callers, but their shape differs per backend:
//!
//! - remote: `<random-base36>.md` (13 random characters)
//! - local: `<epoch-millis>-<random-base36>.md` (6 random characters)
//!
//! Randomness comes from a v4 UUID. Keys are never recycled after deletion.

use crate::error::{NoteError, Result};
use chrono::Utc;
use std::path::{Component, Path};
use uuid::Uuid;

pub const NOTE_EXT: &str = ".md";
pub const INDEX_FILENAME: &str = "metadata.json";

const REMOTE_RANDOM_LEN: usize = 13;
const LOCAL_RANDOM_LEN: usize = 6;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn random_base36(len: usize) -> String {
    let mut n = Uuid::new_v4().as_u128();
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        out.push(BASE36[(n % 36) as usize] as char);
        n /= 36;
    }
    out
}

pub fn remote_key() -> String {
    format!("{}{}", random_base36(REMOTE_RANDOM_LEN), NOTE_EXT)
}

pub fn local_key() -> String {
    format!(
        "{}-{}{}",
        Utc::now().timestamp_millis(),
        random_base36(LOCAL_RANDOM_LEN),
        NOTE_EXT
    )
}

/// A local key must name a `.md` file directly inside the notes directory.
pub fn validate_local_key(key: &str) -> Result<()> {
    let invalid = || NoteError::InvalidKey(key.to_string());

    if key.len() <= NOTE_EXT.len() || !key.ends_with(NOTE_EXT) {
        return Err(invalid());
    }
    if key.contains(['/', '\\', '\0']) {
        return Err(invalid());
    }
    let mut components = Path::new(key).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(invalid()),
    }
}
