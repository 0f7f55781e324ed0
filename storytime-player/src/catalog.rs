//! Story catalog
//!
//! Stories are read from a JSON file: either a bare array of story records
//! or an object with a `stories` array. Narration may be inline
//! (`audioBase64`) or a raw PCM file (`audioPath`, relative to the catalog).

use crate::audio::decode::AudioPayload;
use crate::error::{Error, Result};
use crate::playback::playlist::{Playlist, PlaylistEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use storytime_common::events::TrackId;
use tracing::{info, warn};

/// One story as supplied by the content source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub theme: String,
    /// Narration hint for the speech service
    #[serde(default)]
    pub audio_guidance: String,
    #[serde(default)]
    pub poster_prompt: String,
    /// Poster image, display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_base64: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_path: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    List(Vec<Story>),
    Wrapped { stories: Vec<Story> },
}

/// Stories in play order
#[derive(Debug, Clone, Default)]
pub struct StoryCatalog {
    stories: Vec<Story>,
    base_dir: PathBuf,
}

impl StoryCatalog {
    /// Load and validate a catalog file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("{}: {}", path.display(), e)))?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let catalog = Self::from_json_str(&content, base_dir)?;
        info!(
            "Loaded {} stories from {}",
            catalog.stories.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Parse catalog JSON; `audioPath` entries resolve against `base_dir`
    pub fn from_json_str(content: &str, base_dir: impl Into<PathBuf>) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(content)
            .map_err(|e| Error::Catalog(format!("invalid catalog JSON: {}", e)))?;
        let stories = match file {
            CatalogFile::List(stories) | CatalogFile::Wrapped { stories } => stories,
        };

        let mut seen = HashSet::new();
        for story in &stories {
            if story.id.trim().is_empty() {
                return Err(Error::Catalog(format!(
                    "story '{}' has an empty id",
                    story.title
                )));
            }
            if !seen.insert(story.id.as_str()) {
                return Err(Error::Catalog(format!("duplicate story id '{}'", story.id)));
            }
        }

        Ok(Self {
            stories,
            base_dir: base_dir.into(),
        })
    }

    pub fn stories(&self) -> &[Story] {
        &self.stories
    }

    pub fn get(&self, id: &str) -> Option<&Story> {
        self.stories.iter().find(|s| s.id == id)
    }

    /// Narration for `story`, if any is available yet
    ///
    /// Inline base64 wins over a file. An unreadable file is logged and
    /// treated as not yet narrated.
    pub fn audio_for(&self, story: &Story) -> Option<AudioPayload> {
        if let Some(text) = &story.audio_base64 {
            return Some(AudioPayload::Base64(text.clone()));
        }

        let path = story.audio_path.as_ref()?;
        let full = self.base_dir.join(path);
        match std::fs::read(&full) {
            Ok(bytes) => Some(AudioPayload::Pcm(bytes)),
            Err(e) => {
                warn!(
                    "Narration for story {} unavailable ({}): {}",
                    story.id,
                    full.display(),
                    e
                );
                None
            }
        }
    }

    /// Build the playlist in catalog order
    pub fn playlist(&self) -> Playlist {
        let entries = self
            .stories
            .iter()
            .map(|story| PlaylistEntry {
                id: TrackId::new(story.id.clone()),
                title: story.title.clone(),
                audio: self.audio_for(story),
            })
            .collect();
        Playlist::new(entries)
    }

    /// Copy narration that appeared or changed into an existing playlist
    ///
    /// Stories not already in `playlist` are left out, and narration is never
    /// taken away. Returns the ids whose audio was replaced.
    pub fn refresh_playlist(&self, playlist: &mut Playlist) -> Vec<TrackId> {
        let mut updated = Vec::new();
        for story in &self.stories {
            let id = TrackId::new(story.id.clone());
            let Some(current) = playlist.get(&id) else {
                continue;
            };
            let Some(audio) = self.audio_for(story) else {
                continue;
            };
            if current.audio.as_ref() != Some(&audio) && playlist.set_audio(&id, audio) {
                updated.push(id);
            }
        }
        updated
    }
}
