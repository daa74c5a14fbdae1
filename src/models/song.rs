// Song payloads

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::request::FormPart;
use crate::error::ApiError;

/// A song as returned by the songs endpoints
///
/// The backend serializes Mongo documents, so the identifier shows up as
/// `_id`, `id`, or both.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, rename = "_id", skip_serializing_if = "Option::is_none")]
    object_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub song_url: String,
    #[serde(default, alias = "albumId", skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<Likes>,
}

impl Song {
    /// Song identifier, whichever field carried it
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref().or(self.object_id.as_deref())
    }

    /// Number of likes, zero when the backend sent none
    pub fn like_count(&self) -> u64 {
        self.likes.as_ref().map_or(0, Likes::count)
    }
}

/// `likes` is either a counter or the ids of the users who liked the song
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Likes {
    Count(u64),
    Users(Vec<String>),
}

impl Likes {
    pub fn count(&self) -> u64 {
        match self {
            Likes::Count(n) => *n,
            Likes::Users(users) => users.len() as u64,
        }
    }
}

/// `GET /songs` answers with either a bare array or `{ "data": [...] }`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SongList {
    Bare(Vec<Song>),
    Wrapped { data: Vec<Song> },
}

impl From<SongList> for Vec<Song> {
    fn from(list: SongList) -> Self {
        match list {
            SongList::Bare(songs) => songs,
            SongList::Wrapped { data } => data,
        }
    }
}

/// A local audio file plus metadata for `POST /songs/upload`
#[derive(Debug, Clone)]
pub struct SongUpload {
    pub file_name: String,
    pub bytes: Bytes,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album_id: Option<String>,
}

impl SongUpload {
    /// Read an audio file from disk
    ///
    /// A missing or unreadable file is a [`ApiError::Validation`] error.
    pub fn from_path(path: &Path) -> Result<Self, ApiError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ApiError::Validation(format!("Audio file path has no file name: {}", path.display()))
            })?
            .to_string();
        let bytes = std::fs::read(path).map_err(|e| {
            ApiError::Validation(format!("Cannot read audio file {}: {}", path.display(), e))
        })?;

        Ok(Self {
            file_name,
            bytes: Bytes::from(bytes),
            title: None,
            artist: None,
            album_id: None,
        })
    }

    /// Multipart parts: the `file` part followed by any metadata fields
    pub fn into_parts(self) -> Vec<FormPart> {
        let mime = guess_audio_mime(&self.file_name).to_string();
        let mut parts = vec![FormPart::File {
            name: "file".to_string(),
            file_name: self.file_name,
            mime,
            bytes: self.bytes,
        }];

        for (name, value) in [
            ("title", self.title),
            ("artist", self.artist),
            ("albumId", self.album_id),
        ] {
            if let Some(value) = value {
                parts.push(FormPart::Text {
                    name: name.to_string(),
                    value,
                });
            }
        }

        parts
    }
}

/// MIME type from the file extension
fn guess_audio_mime(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("m4a") | Some("mp4") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}
