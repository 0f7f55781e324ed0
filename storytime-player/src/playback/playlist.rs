//! Playlist driver
//!
//! Ordered story list plus the current position in it. On end of track the
//! driver advances only to a story whose audio already exists; a story still
//! waiting for narration stops the run instead of being selected silent.

use crate::audio::decode::AudioPayload;
use storytime_common::events::TrackId;
use tracing::debug;

/// One story as the playlist sees it
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub id: TrackId,
    pub title: String,
    pub audio: Option<AudioPayload>,
}

impl PlaylistEntry {
    pub fn has_audio(&self) -> bool {
        self.audio.is_some()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
    current: Option<usize>,
}

impl Playlist {
    pub fn new(entries: Vec<PlaylistEntry>) -> Self {
        Self {
            entries,
            current: None,
        }
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn current(&self) -> Option<&PlaylistEntry> {
        self.current.and_then(|i| self.entries.get(i))
    }

    pub fn get(&self, id: &TrackId) -> Option<&PlaylistEntry> {
        self.index_of(id).map(|i| &self.entries[i])
    }

    fn index_of(&self, id: &TrackId) -> Option<usize> {
        self.entries.iter().position(|e| &e.id == id)
    }

    /// Make `id` current; `None` if it is not in the list
    pub fn select(&mut self, id: &TrackId) -> Option<&PlaylistEntry> {
        let index = self.index_of(id)?;
        self.current = Some(index);
        self.entries.get(index)
    }

    /// First story that already has audio, made current
    pub fn first_ready(&mut self) -> Option<&PlaylistEntry> {
        let index = self.entries.iter().position(PlaylistEntry::has_audio)?;
        self.current = Some(index);
        self.entries.get(index)
    }

    /// Handle the end of `finished`
    ///
    /// Advances to the next story when its audio is available and returns
    /// it; otherwise stays put and returns `None`. An end for a story that is
    /// no longer current is ignored.
    pub fn advance_after_end(&mut self, finished: &TrackId) -> Option<&PlaylistEntry> {
        let index = self.index_of(finished)?;
        if self.current != Some(index) {
            debug!("Ignoring end of {}, no longer current", finished);
            return None;
        }
        match self.entries.get(index + 1) {
            Some(next) if next.has_audio() => {
                self.current = Some(index + 1);
                self.entries.get(index + 1)
            }
            Some(next) => {
                debug!("Next story {} has no audio yet, staying on {}", next.id, finished);
                None
            }
            None => {
                debug!("Reached end of playlist at {}", finished);
                None
            }
        }
    }

    /// Manual step forward, regardless of audio availability
    pub fn next(&mut self) -> Option<&PlaylistEntry> {
        let index = match self.current {
            Some(i) if i + 1 < self.entries.len() => i + 1,
            Some(_) => return None,
            None if !self.entries.is_empty() => 0,
            None => return None,
        };
        self.current = Some(index);
        self.entries.get(index)
    }

    /// Manual step back, regardless of audio availability
    pub fn previous(&mut self) -> Option<&PlaylistEntry> {
        let index = self.current?.checked_sub(1)?;
        self.current = Some(index);
        self.entries.get(index)
    }

    /// Attach narration that arrived after the list was built
    ///
    /// Returns false if `id` is unknown.
    pub fn set_audio(&mut self, id: &TrackId, audio: AudioPayload) -> bool {
        match self.index_of(id) {
            Some(index) => {
                self.entries[index].audio = Some(audio);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, ready: bool) -> PlaylistEntry {
        PlaylistEntry {
            id: TrackId::new(id),
            title: format!("Story {}", id),
            audio: ready.then(|| AudioPayload::Pcm(vec![0, 0])),
        }
    }

    fn playlist() -> Playlist {
        Playlist::new(vec![
            entry("1", true),
            entry("2", true),
            entry("3", false),
            entry("4", true),
        ])
    }

    #[test]
    fn test_advances_to_ready_story() {
        let mut list = playlist();
        list.select(&TrackId::new("1"));

        let next = list.advance_after_end(&TrackId::new("1")).map(|e| e.id.clone());
        assert_eq!(next, Some(TrackId::new("2")));
        assert_eq!(list.current().map(|e| e.id.as_str()), Some("2"));
    }

    #[test]
    fn test_stays_when_next_has_no_audio() {
        let mut list = playlist();
        list.select(&TrackId::new("2"));

        assert!(list.advance_after_end(&TrackId::new("2")).is_none());
        assert_eq!(list.current().map(|e| e.id.as_str()), Some("2"));
    }

    #[test]
    fn test_does_not_wrap_at_end() {
        let mut list = playlist();
        list.select(&TrackId::new("4"));
        assert!(list.advance_after_end(&TrackId::new("4")).is_none());
        assert_eq!(list.current().map(|e| e.id.as_str()), Some("4"));
    }

    #[test]
    fn test_end_of_replaced_story_is_ignored() {
        let mut list = playlist();
        list.select(&TrackId::new("1"));
        list.select(&TrackId::new("4"));

        assert!(list.advance_after_end(&TrackId::new("1")).is_none());
        assert_eq!(list.current().map(|e| e.id.as_str()), Some("4"));
    }

    #[test]
    fn test_set_audio_unblocks_advance() {
        let mut list = playlist();
        list.select(&TrackId::new("2"));

        assert!(list.set_audio(&TrackId::new("3"), AudioPayload::Pcm(vec![1, 0])));
        let next = list.advance_after_end(&TrackId::new("2")).map(|e| e.id.clone());
        assert_eq!(next, Some(TrackId::new("3")));
        assert!(!list.set_audio(&TrackId::new("99"), AudioPayload::Pcm(vec![])));
    }

    #[test]
    fn test_manual_navigation() {
        let mut list = playlist();
        assert!(list.previous().is_none());
        assert_eq!(list.next().map(|e| e.id.as_str()), Some("1"));
        assert_eq!(list.next().map(|e| e.id.as_str()), Some("2"));
        assert_eq!(list.next().map(|e| e.id.as_str()), Some("3"));
        assert_eq!(list.previous().map(|e| e.id.as_str()), Some("2"));

        list.select(&TrackId::new("4"));
        assert!(list.next().is_none());
        assert_eq!(list.current().map(|e| e.id.as_str()), Some("4"));
    }

    #[test]
    fn test_first_ready_skips_silent_stories() {
        let mut list = Playlist::new(vec![entry("a", false), entry("b", true)]);
        assert_eq!(list.first_ready().map(|e| e.id.as_str()), Some("b"));
        assert!(Playlist::default().first_ready().is_none());
    }
}
