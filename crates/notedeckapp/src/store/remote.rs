use super::{NoteBackend, MARKDOWN_CONTENT_TYPE};
use crate::error::{NoteError, Result};
use crate::keys;
use crate::model::{Mode, Note, NoteContent, UserMetadata, PARENT_ID_KEY, TITLE_KEY};
use chrono::{DateTime, Utc};
use log::{debug, info};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_BUCKET: &str = "not7";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Every response body is wrapped as `{"data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ObjectList {
    objects: Option<Vec<Note>>,
}

#[derive(Debug, Serialize)]
struct CreateBucket<'a> {
    name: &'a str,
}

#[derive(Debug, Serialize)]
struct MetadataUpdate<'a> {
    user_metadata: &'a UserMetadata,
}

/// Notes stored as objects in one bucket of an HTTP object-storage API.
pub struct RemoteBackend {
    client: Client,
    base: Url,
    bucket: String,
}

impl RemoteBackend {
    pub fn new(api_base: &str, bucket: &str, timeout: Duration) -> Result<Self> {
        let base =
            Url::parse(api_base).map_err(|e| NoteError::Url(format!("{}: {}", api_base, e)))?;
        if base.cannot_be_a_base() {
            return Err(NoteError::Url(format!("{}: not a base URL", api_base)));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NoteError::Http)?;
        Ok(Self {
            client,
            base,
            bucket: bucket.to_string(),
        })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_API_BASE, DEFAULT_BUCKET, DEFAULT_TIMEOUT)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Base URL extended with percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| NoteError::Url(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, key: &str) -> Result<Url> {
        self.endpoint(&["buckets", &self.bucket, "objects", key])
    }

    fn metadata_url(&self, key: &str) -> Result<Url> {
        self.endpoint(&["buckets", &self.bucket, "objects", key, "metadata"])
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        debug!("{} {}", method, url);
        self.client.request(method, url)
    }

    /// Send and turn any non-2xx status into [`NoteError::Status`].
    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().map_err(NoteError::Http)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        debug!("HTTP {}: {}", status, body);
        Err(NoteError::Status {
            status: status.as_u16(),
            body,
        })
    }

    fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
        let text = response.text().map_err(NoteError::Http)?;
        let envelope: Envelope<T> =
            serde_json::from_str(&text).map_err(NoteError::Serialization)?;
        Ok(envelope.data)
    }

    /// Make sure the bucket exists, creating it on a 404.
    ///
    /// Runs before every listing and save; nothing is cached between calls.
    pub fn ensure_bucket_exists(&self) -> Result<()> {
        let url = self.endpoint(&["buckets", &self.bucket])?;
        match self.send(self.request(Method::GET, url)) {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => {
                let url = self.endpoint(&["buckets"])?;
                let body = CreateBucket { name: &self.bucket };
                self.send(self.request(Method::POST, url).json(&body))?;
                info!("Bucket {} created", self.bucket);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn last_modified(response: &Response) -> Option<DateTime<Utc>> {
    let value = response.headers().get(LAST_MODIFIED)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

impl NoteBackend for RemoteBackend {
    fn mode(&self) -> Mode {
        Mode::Remote
    }

    fn list_notes(&self) -> Result<Vec<Note>> {
        self.ensure_bucket_exists()?;
        let url = self.endpoint(&["buckets", &self.bucket, "objects"])?;
        let response = self.send(self.request(Method::GET, url))?;
        let listing: Option<ObjectList> = Self::read_envelope(response)?;
        Ok(listing
            .and_then(|l| l.objects)
            .unwrap_or_default()
            .into_iter()
            .map(Note::normalized)
            .collect())
    }

    fn note_content(&self, key: &str) -> Result<Option<NoteContent>> {
        let url = self.object_url(key)?;
        let response = match self.send(self.request(Method::GET, url)) {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let updated_at = last_modified(&response);
        let content = response.text().map_err(NoteError::Http)?;
        debug!("Downloaded {} ({} bytes)", key, content.len());

        // Titles live in the metadata sub-resource only.
        Ok(Some(NoteContent {
            title: String::new(),
            content,
            created_at: None,
            updated_at,
        }))
    }

    fn create_note(
        &self,
        title: &str,
        content: &str,
        parent_id: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>> {
        let key = keys::remote_key();
        self.save_note(&key, title, content, parent_id, extra)
    }

    fn save_note(
        &self,
        key: &str,
        title: &str,
        content: &str,
        parent_id: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>> {
        self.ensure_bucket_exists()?;

        let mut url = self.object_url(key)?;
        url.query_pairs_mut()
            .append_pair("deduplication_mode", "allow");
        let response = self.send(
            self.request(Method::PUT, url)
                .header(CONTENT_TYPE, MARKDOWN_CONTENT_TYPE)
                .body(content.to_string()),
        )?;
        let uploaded: Option<serde_json::Value> = Self::read_envelope(response)?;
        if uploaded.is_none() {
            debug!("Upload of {} returned no object", key);
            return Ok(None);
        }

        let mut meta = UserMetadata::new();
        meta.insert(PARENT_ID_KEY, parent_id);
        meta.merge(extra);
        self.update_note_title(key, title, &meta)?;
        self.note_metadata(key)
    }

    fn update_note(&self, key: &str, title: &str, content: &str) -> Result<Option<Note>> {
        let parent_id = match self.note_metadata(key) {
            Ok(Some(note)) => note.parent_id().to_string(),
            Ok(None) => String::new(),
            Err(e) => {
                debug!("No parent recovered for {}: {}", key, e);
                String::new()
            }
        };
        self.save_note(key, title, content, &parent_id, &UserMetadata::new())
    }

    fn update_note_title(
        &self,
        key: &str,
        title: &str,
        extra: &UserMetadata,
    ) -> Result<Option<Note>> {
        let mut user_metadata = UserMetadata::new();
        user_metadata.insert(TITLE_KEY, title);
        user_metadata.merge(extra);

        let url = self.metadata_url(key)?;
        let body = MetadataUpdate {
            user_metadata: &user_metadata,
        };
        let response = self.send(self.request(Method::PUT, url).json(&body))?;
        let note: Option<Note> = Self::read_envelope(response)?;
        Ok(note.map(Note::normalized))
    }

    fn delete_note(&self, key: &str) -> Result<bool> {
        let url = self.object_url(key)?;
        match self.send(self.request(Method::DELETE, url)) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn note_metadata(&self, key: &str) -> Result<Option<Note>> {
        let url = self.metadata_url(key)?;
        let response = match self.send(self.request(Method::GET, url)) {
            Ok(response) => response,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let note: Option<Note> = Self::read_envelope(response)?;
        Ok(note.map(Note::normalized))
    }
}
