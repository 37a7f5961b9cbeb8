//! Browsing position within the generated tracks.

use crate::library::section_number;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct PlaybackIndex {
    tracks: Vec<PathBuf>,
    cursor: usize,
}

impl PlaybackIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the track list and rewinds to the first track.
    pub fn set_artifacts(&mut self, tracks: Vec<PathBuf>) {
        self.tracks = tracks;
        self.cursor = 0;
    }

    pub fn tracks(&self) -> &[PathBuf] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&Path> {
        self.tracks.get(self.cursor).map(PathBuf::as_path)
    }

    pub fn next(&mut self) -> Option<&Path> {
        if self.tracks.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + 1) % self.tracks.len();
        self.current()
    }

    pub fn previous(&mut self) -> Option<&Path> {
        if self.tracks.is_empty() {
            return None;
        }
        self.cursor = (self.cursor + self.tracks.len() - 1) % self.tracks.len();
        self.current()
    }

    /// Jumps to the 0-based `position`; out of range positions are ignored.
    pub fn select(&mut self, position: usize) -> Option<&Path> {
        if position < self.tracks.len() {
            self.cursor = position;
            self.current()
        } else {
            None
        }
    }

    /// `"Section 1"`, `"Section 2"`, ... one per track, for track pickers.
    pub fn track_labels(&self) -> Vec<String> {
        (1..=self.tracks.len()).map(|i| format!("Section {}", i)).collect()
    }

    pub fn describe_current(&self) -> String {
        let Some(track) = self.current() else {
            return "No audio files loaded".to_string();
        };

        let position = format!("({}/{})", self.cursor + 1, self.tracks.len());
        match section_number(track) {
            Some(n) => format!("Playing Section {} {}", n, position),
            None => {
                let stem = track
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                format!("Playing {} {}", stem, position)
            }
        }
    }
}
