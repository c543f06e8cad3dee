use crate::library::Song;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayMode {
    #[default]
    Sequential,
    RepeatOne,
    Shuffle,
}

impl PlayMode {
    pub fn next(self) -> Self {
        match self {
            PlayMode::Sequential => PlayMode::RepeatOne,
            PlayMode::RepeatOne => PlayMode::Shuffle,
            PlayMode::Shuffle => PlayMode::Sequential,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayMode::Sequential => "Sequential",
            PlayMode::RepeatOne => "Repeat one",
            PlayMode::Shuffle => "Shuffle",
        }
    }
}

/// Songs in their current effective order plus the current song's path.
///
/// Positions are only meaningful until the next reorder; anything that must
/// survive a mutation is keyed by path.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    songs: Vec<Song>,
    current: Option<PathBuf>,
    mode: PlayMode,
    next_stamp: u64,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn songs(&self) -> &[Song] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.position(path).is_some()
    }

    pub fn position(&self, path: &Path) -> Option<usize> {
        self.songs.iter().position(|s| s.path == path)
    }

    pub fn get(&self, path: &Path) -> Option<&Song> {
        self.songs.iter().find(|s| s.path == path)
    }

    pub fn get_mut(&mut self, path: &Path) -> Option<&mut Song> {
        self.songs.iter_mut().find(|s| s.path == path)
    }

    pub fn at(&self, index: usize) -> Option<&Song> {
        self.songs.get(index)
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.get(self.current.as_deref()?)
    }

    /// Live index of the current song, resolved by path.
    pub fn current_index(&self) -> Option<usize> {
        self.position(self.current.as_deref()?)
    }

    /// Point at `path`, or clear with `None`. Unknown paths are ignored.
    pub fn set_current(&mut self, path: Option<&Path>) -> bool {
        match path {
            Some(p) if self.contains(p) => {
                self.current = Some(p.to_path_buf());
                true
            }
            Some(_) => false,
            None => {
                self.current = None;
                true
            }
        }
    }

    /// Append songs whose path is not already present, stamping each one.
    /// Returns the paths actually added, in order.
    pub fn add_many(&mut self, songs: Vec<Song>) -> Vec<PathBuf> {
        let mut added = Vec::new();
        for mut song in songs {
            if self.contains(&song.path) {
                continue;
            }
            song.added_at = self.next_stamp;
            self.next_stamp += 1;
            added.push(song.path.clone());
            self.songs.push(song);
        }
        added
    }

    /// Remove a song, returning it with the index it had.
    /// Clears the current pointer if it was the current song.
    pub fn remove(&mut self, path: &Path) -> Option<(usize, Song)> {
        let index = self.position(path)?;
        let song = self.songs.remove(index);
        if self.current.as_deref() == Some(path) {
            self.current = None;
        }
        Some((index, song))
    }

    /// Move `path` to the front, keeping the rest in relative order.
    pub fn move_to_front(&mut self, path: &Path) {
        if let Some(index) = self.position(path) {
            self.songs[..=index].rotate_right(1);
        }
    }

    /// Move a song to `to` (clamped to the end of the list).
    pub fn move_song(&mut self, path: &Path, to: usize) -> bool {
        let Some(from) = self.position(path) else {
            return false;
        };
        let to = to.min(self.songs.len() - 1);
        let song = self.songs.remove(from);
        self.songs.insert(to, song);
        true
    }

    /// Cycle the play mode and reorder for the mode entered.
    pub fn cycle_mode(&mut self) -> PlayMode {
        self.set_mode(self.mode.next());
        self.mode
    }

    pub fn set_mode(&mut self, mode: PlayMode) {
        self.mode = mode;
        match mode {
            PlayMode::Shuffle => self.shuffle_pinning_current(),
            PlayMode::Sequential => self.restore_insertion_order(),
            PlayMode::RepeatOne => {}
        }
    }

    /// Current song first, everything else uniformly permuted.
    pub fn shuffle_pinning_current(&mut self) {
        let mut rng = rand::rng();
        let pinned = match self.current_index() {
            Some(i) => {
                self.songs[..=i].rotate_right(1);
                1
            }
            None => 0,
        };
        self.songs[pinned..].shuffle(&mut rng);
    }

    pub fn restore_insertion_order(&mut self) {
        self.songs.sort_by_key(|s| s.added_at);
    }

    /// Index `offset` steps from the current song.
    ///
    /// With `wrap`, steps past either end come around; without it they yield
    /// `None`. With no current song, stepping forward starts at the top.
    pub fn step_from_current(&self, offset: isize, wrap: bool) -> Option<usize> {
        let len = self.songs.len() as isize;
        if len == 0 {
            return None;
        }
        let target = match self.current_index() {
            Some(i) => i as isize + offset,
            None if offset > 0 => offset - 1,
            None => len + offset,
        };
        if wrap {
            Some(target.rem_euclid(len) as usize)
        } else if (0..len).contains(&target) {
            Some(target as usize)
        } else {
            None
        }
    }
}
