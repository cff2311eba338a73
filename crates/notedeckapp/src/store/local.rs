use super::{NoteBackend, MARKDOWN_CONTENT_TYPE};
use crate::error::{NoteError, Result};
use crate::keys::{self, INDEX_FILENAME, NOTE_EXT};
use crate::model::{MetadataEntry, Mode, Note, NoteContent, UserMetadata, TITLE_KEY};
use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const LOCAL_BUCKET: &str = "local";

/// The `metadata.json` index, keyed by note filename.
pub type Index = BTreeMap<String, MetadataEntry>;

/// Proof that a notes directory was selected and exists.
///
/// Obtaining one is the explicit setup step for local mode; nothing in the
/// library picks a directory on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).map_err(NoteError::Io)?;
        if !meta.is_dir() {
            return Err(NoteError::Store(format!(
                "Not a directory: {}",
                path.display()
            )));
        }
        let root = fs::canonicalize(path).map_err(NoteError::Io)?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }
}

pub struct LocalBackend {
    dir: LocalDirectory,
}

impl LocalBackend {
    pub fn new(dir: LocalDirectory) -> Self {
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn index_path(&self) -> PathBuf {
        self.root().join(INDEX_FILENAME)
    }

    /// Load the whole index. A missing or unreadable-as-JSON file is an empty index.
    ///
    /// Entries are decoded one at a time; a malformed entry is dropped with a
    /// warning and the rest survive.
    pub fn load_index(&self) -> Result<Index> {
        let path = self.index_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Index::new()),
            Err(e) => return Err(NoteError::Io(e)),
        };
        let raw: BTreeMap<String, Value> = match serde_json::from_str(&content) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Ignoring unparsable index {}: {}", path.display(), e);
                return Ok(Index::new());
            }
        };

        let mut index = Index::new();
        for (key, value) in raw {
            match serde_json::from_value::<MetadataEntry>(value) {
                Ok(entry) => {
                    index.insert(key, entry);
                }
                Err(e) => warn!("Skipping malformed index entry {}: {}", key, e),
            }
        }
        Ok(index)
    }

    /// Rewrite the whole index.
    pub fn save_index(&self, index: &Index) -> Result<()> {
        let content = serde_json::to_string_pretty(index).map_err(NoteError::Serialization)?;
        self.write_atomic(INDEX_FILENAME, &content)
    }

    fn write_atomic(&self, filename: &str, content: &str) -> Result<()> {
        let target = self.root().join(filename);
        let tmp = self.root().join(format!(".{}-{}.tmp", filename, Uuid::new_v4()));
        debug!("Writing {} ({} bytes)", target.display(), content.len());
        fs::write(&tmp, content).map_err(NoteError::Io)?;
        if let Err(e) = fs::rename(&tmp, &target) {
            let _ = fs::remove_file(&tmp);
            return Err(NoteError::Io(e));
        }
        Ok(())
    }

    fn file_size(&self, key: &str) -> u64 {
        fs::metadata(self.root().join(key))
            .map(|m| m.len())
            .unwrap_or(0)
    }

    fn note_view(key: &str, entry: &MetadataEntry, size: u64) -> Note {
        Note {
            id: key.to_string(),
            key: key.to_string(),
            bucket_name: LOCAL_BUCKET.to_string(),
            size,
            etag: None,
            content_type: Some(MARKDOWN_CONTENT_TYPE.to_string()),
            created_at: entry.created_at,
            last_modified: entry.updated_at,
            user_metadata: entry.fields.clone(),
        }
    }
}

impl NoteBackend for LocalBackend {
    fn mode(&self) -> Mode {
        Mode::Local
    }

    fn list_notes(&self) -> Result<Vec<Note>> {
        let index = self.load_index()?;
        let mut notes = Vec::new();

        for entry in fs::read_dir(self.root()).map_err(NoteError::Io)? {
            let entry = entry.map_err(NoteError::Io)?;
            if !entry.file_type().map_err(NoteError::Io)?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.ends_with(NOTE_EXT) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let meta = index.get(&name).cloned().unwrap_or_default();
            notes.push(Self::note_view(&name, &meta, size));
        }

        notes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(notes)
    }

    fn note_content(&self, key: &str) -> Result<Option<NoteContent>> {
        keys::validate_local_key(key)?;
        let content = match fs::read_to_string(self.root().join(key)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(NoteError::Io(e)),
        };

        let index = self.load_index()?;
        let entry = index.get(key).cloned().unwrap_or_default();
        Ok(Some(NoteContent {
            title: entry.fields.title().to_string(),
            content,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
        }))
    }

    fn create_note(
        &self,
        title: &str,
        content: &str,
        parent_id: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>> {
        let key = keys::local_key();
        let entry = MetadataEntry::new(UserMetadata::titled(title, parent_id).merged(extra));
        let note = Self::note_view(&key, &entry, content.len() as u64);

        let mut index = self.load_index()?;
        index.insert(key.clone(), entry);
        self.save_index(&index)?;
        self.write_atomic(&key, content)?;

        debug!("Created local note {}", key);
        Ok(Some(note))
    }

    fn save_note(
        &self,
        key: &str,
        title: &str,
        content: &str,
        parent_id: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>> {
        keys::validate_local_key(key)?;
        let mut index = self.load_index()?;

        let entry = index.entry(key.to_string()).or_default();
        entry.merge_fields(&UserMetadata::titled(title, parent_id).merged(extra));
        entry.touch();
        let note = Self::note_view(key, entry, content.len() as u64);

        self.save_index(&index)?;
        self.write_atomic(key, content)?;
        Ok(Some(note))
    }

    fn update_note(&self, key: &str, title: &str, content: &str) -> Result<Option<Note>> {
        keys::validate_local_key(key)?;
        let parent_id = self
            .load_index()?
            .get(key)
            .map(|entry| entry.fields.parent_id().to_string())
            .unwrap_or_default();
        self.save_note(key, title, content, &parent_id, &UserMetadata::new())
    }

    fn update_note_title(
        &self,
        key: &str,
        title: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>> {
        keys::validate_local_key(key)?;
        let mut index = self.load_index()?;

        let mut fields = UserMetadata::new();
        fields.insert(TITLE_KEY, title);
        fields.merge(extra);

        let entry = index.entry(key.to_string()).or_default();
        entry.merge_fields(&fields);
        entry.touch();
        let note = Self::note_view(key, entry, self.file_size(key));

        self.save_index(&index)?;
        Ok(Some(note))
    }

    fn delete_note(&self, key: &str) -> Result<bool> {
        keys::validate_local_key(key)?;
        match fs::remove_file(self.root().join(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Nothing to delete for {}", key);
                return Ok(false);
            }
            Err(e) => return Err(NoteError::Io(e)),
        }

        let mut index = self.load_index()?;
        if index.remove(key).is_some() {
            self.save_index(&index)?;
        }
        Ok(true)
    }

    fn note_metadata(&self, key: &str) -> Result<Option<Note>> {
        keys::validate_local_key(key)?;
        let index = self.load_index()?;
        Ok(index
            .get(key)
            .map(|entry| Self::note_view(key, entry, self.file_size(key))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalBackend) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(LocalDirectory::open(dir.path()).unwrap());
        (dir, backend)
    }

    fn md_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|n| n.ends_with(".md"))
            .collect();
        names.sort();
        names
    }

    #[test]
    fn open_rejects_missing_and_plain_files() {
        let dir = TempDir::new().unwrap();
        assert!(LocalDirectory::open(dir.path().join("nope")).is_err());

        let file = dir.path().join("file.md");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            LocalDirectory::open(&file),
            Err(NoteError::Store(_))
        ));
    }

    #[test]
    fn create_writes_file_and_index_entry() {
        let (dir, backend) = setup();
        let note = backend
            .create_note("Hello", "World", "", &UserMetadata::new())
            .unwrap()
            .unwrap();

        assert_eq!(md_files(dir.path()), vec![note.key.clone()]);
        assert_eq!(note.id, note.key);
        assert_eq!(note.bucket_name, "local");
        assert_eq!(note.size, 5);
        assert_eq!(note.created_at, note.last_modified);

        let index = backend.load_index().unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index[&note.key].fields.title(), "Hello");

        let content = backend.note_content(&note.key).unwrap().unwrap();
        assert_eq!(content.content, "World");
        assert_eq!(content.title, "Hello");
    }

    #[test]
    fn file_bytes_are_plain_markdown() {
        let (dir, backend) = setup();
        let note = backend
            .create_note("Title", "body only", "", &UserMetadata::new())
            .unwrap()
            .unwrap();
        let on_disk = fs::read_to_string(dir.path().join(&note.key)).unwrap();
        assert_eq!(on_disk, "body only");
    }

    #[test]
    fn save_twice_keeps_created_at_and_advances_updated_at() {
        let (_dir, backend) = setup();
        let note = backend
            .create_note("A", "1", "", &UserMetadata::new())
            .unwrap()
            .unwrap();

        let first = backend
            .save_note(&note.key, "A", "2", "", &UserMetadata::new())
            .unwrap()
            .unwrap();
        let second = backend
            .save_note(&note.key, "A", "3", "", &UserMetadata::new())
            .unwrap()
            .unwrap();

        assert_eq!(first.created_at, note.created_at);
        assert_eq!(second.created_at, note.created_at);
        assert!(first.last_modified.unwrap() > note.last_modified.unwrap());
        assert!(second.last_modified.unwrap() > first.last_modified.unwrap());
    }

    #[test]
    fn save_preserves_unspecified_fields() {
        let (_dir, backend) = setup();
        let extra: UserMetadata = [("type", "folder"), ("order", "4")].into_iter().collect();
        let note = backend
            .create_note("Folder", "", "root.md", &extra)
            .unwrap()
            .unwrap();

        let saved = backend
            .save_note(&note.key, "Renamed", "", "root.md", &UserMetadata::new())
            .unwrap()
            .unwrap();

        assert_eq!(saved.title(), "Renamed");
        assert_eq!(saved.user_metadata.note_type(), Some("folder"));
        assert_eq!(saved.user_metadata.order().as_deref(), Some("4"));
        assert_eq!(saved.parent_id(), "root.md");
    }

    #[test]
    fn update_note_keeps_parent() {
        let (_dir, backend) = setup();
        let note = backend
            .create_note("Child", "old", "parent.md", &UserMetadata::new())
            .unwrap()
            .unwrap();

        let updated = backend
            .update_note(&note.key, "Child v2", "new")
            .unwrap()
            .unwrap();
        assert_eq!(updated.parent_id(), "parent.md");
        assert_eq!(updated.title(), "Child v2");
        assert_eq!(
            backend.note_content(&note.key).unwrap().unwrap().content,
            "new"
        );
    }

    #[test]
    fn update_title_leaves_body_alone() {
        let (_dir, backend) = setup();
        let note = backend
            .create_note("Old", "keep me", "p.md", &UserMetadata::new())
            .unwrap()
            .unwrap();

        let extra: UserMetadata = [("is_expanded", "true")].into_iter().collect();
        let renamed = backend
            .update_note_title(&note.key, "New", &extra)
            .unwrap()
            .unwrap();

        assert_eq!(renamed.title(), "New");
        assert_eq!(renamed.parent_id(), "p.md");
        assert_eq!(renamed.user_metadata.is_expanded(), Some(true));
        assert_eq!(renamed.size, 7);

        let content = backend.note_content(&note.key).unwrap().unwrap();
        assert_eq!(content.content, "keep me");
        assert_eq!(content.title, "New");
    }

    #[test]
    fn delete_removes_file_and_entry() {
        let (dir, backend) = setup();
        let note = backend
            .create_note("Gone", "soon", "", &UserMetadata::new())
            .unwrap()
            .unwrap();

        assert!(backend.delete_note(&note.key).unwrap());
        assert!(md_files(dir.path()).is_empty());
        assert!(backend.note_content(&note.key).unwrap().is_none());
        assert!(backend.note_metadata(&note.key).unwrap().is_none());
        assert!(backend.list_notes().unwrap().is_empty());
    }

    #[test]
    fn delete_missing_file_keeps_index_entry() {
        let (dir, backend) = setup();
        let note = backend
            .create_note("Orphan", "x", "", &UserMetadata::new())
            .unwrap()
            .unwrap();
        fs::remove_file(dir.path().join(&note.key)).unwrap();
        let before = fs::read_to_string(backend.index_path()).unwrap();

        assert!(!backend.delete_note(&note.key).unwrap());

        let after = fs::read_to_string(backend.index_path()).unwrap();
        assert_eq!(before, after);
        assert!(backend.load_index().unwrap().contains_key(&note.key));
    }

    #[test]
    fn listing_joins_files_with_index() {
        let (dir, backend) = setup();
        let note = backend
            .create_note("Indexed", "abc", "", &UserMetadata::new())
            .unwrap()
            .unwrap();
        fs::write(dir.path().join("stray.md"), "no metadata").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("folder.md")).unwrap();

        let notes = backend.list_notes().unwrap();
        let keys: Vec<&str> = notes.iter().map(|n| n.key.as_str()).collect();
        assert_eq!(keys, vec![note.key.as_str(), "stray.md"]);

        let stray = &notes[1];
        assert_eq!(stray.title(), "");
        assert!(stray.created_at.is_none());
        assert_eq!(stray.size, 11);
        assert_eq!(notes[0].title(), "Indexed");
    }

    #[test]
    fn corrupt_index_reads_as_empty() {
        let (dir, backend) = setup();
        fs::write(dir.path().join("a.md"), "body").unwrap();
        fs::write(backend.index_path(), "{ not json").unwrap();

        assert!(backend.load_index().unwrap().is_empty());
        let notes = backend.list_notes().unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].user_metadata.is_empty());
    }

    #[test]
    fn loose_timestamps_do_not_discard_other_entries() {
        let (dir, backend) = setup();
        fs::write(dir.path().join("a.md"), "alpha").unwrap();
        fs::write(dir.path().join("b.md"), "beta").unwrap();
        fs::write(
            backend.index_path(),
            r#"{
                "a.md": {"title": "Alpha", "parent_id": "", "created_at": "2025-01-01T00:00:00.000Z", "updated_at": "2025-01-01T00:00:00.000Z"},
                "b.md": {"title": "Beta", "parent_id": "a.md", "created_at": ""},
                "c.md": "not an entry"
            }"#,
        )
        .unwrap();

        let notes = backend.list_notes().unwrap();
        let titles: Vec<&str> = notes.iter().map(|n| n.title()).collect();
        assert_eq!(titles, vec!["Alpha", "Beta"]);
        assert!(notes[0].created_at.is_some());
        assert!(notes[1].created_at.is_none());
        assert_eq!(notes[1].parent_id(), "a.md");

        backend
            .create_note("Gamma", "gamma", "", &UserMetadata::new())
            .unwrap()
            .unwrap();
        let index = backend.load_index().unwrap();
        assert_eq!(index["a.md"].fields.title(), "Alpha");
        assert_eq!(index["b.md"].fields.title(), "Beta");
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn writes_leave_no_temp_files() {
        let (dir, backend) = setup();
        let note = backend
            .create_note("T", "content", "", &UserMetadata::new())
            .unwrap()
            .unwrap();
        backend
            .save_note(&note.key, "T", "more", "", &UserMetadata::new())
            .unwrap();

        for entry in fs::read_dir(dir.path()).unwrap() {
            let name = entry.unwrap().file_name().into_string().unwrap();
            assert!(!name.ends_with(".tmp"), "leftover temp file {}", name);
        }
    }

    #[test]
    fn invalid_keys_never_touch_disk() {
        let (dir, backend) = setup();
        let outside = dir.path().parent().unwrap().join("escape.md");

        assert!(matches!(
            backend.save_note("../escape.md", "x", "y", "", &UserMetadata::new()),
            Err(NoteError::InvalidKey(_))
        ));
        assert!(!outside.exists());
        assert!(matches!(
            backend.delete_note("metadata.json"),
            Err(NoteError::InvalidKey(_))
        ));
        assert!(backend.note_content("../etc/passwd").is_err());
    }

    #[test]
    fn metadata_for_unknown_key_is_none() {
        let (_dir, backend) = setup();
        assert!(backend.note_metadata("missing.md").unwrap().is_none());
        assert!(backend.note_content("missing.md").unwrap().is_none());
    }
}
