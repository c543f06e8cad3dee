//! Playback session: the playlist, the current song, and what the audio
//! engine is doing with it.
//!
//! The current song is always tracked by path. Nothing here fails outward:
//! engine errors become a status message and the state falls back to
//! `Paused`.

use crate::library::{ImportedFile, Song};
use crate::player::AudioEngine;
use crate::queue::{PlayMode, Playlist};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const PLAY_FAILED: &str = "Failed to play the selected song.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    NoSongLoaded,
    Loading,
    Playing,
    Paused,
}

pub struct Session {
    playlist: Playlist,
    state: PlaybackState,
    engine: Box<dyn AudioEngine>,
    wrap_around: bool,
    position: f64,
    duration: f64,
    volume: u8,
    status: String,
    /// Song to start once the engine reports it is ready.
    pending_start: Option<PathBuf>,
}

impl Session {
    pub fn new(engine: Box<dyn AudioEngine>, wrap_around: bool, volume: u8) -> Self {
        Self {
            playlist: Playlist::new(),
            state: PlaybackState::NoSongLoaded,
            engine,
            wrap_around,
            position: 0.0,
            duration: 0.0,
            volume: volume.min(100),
            status: String::new(),
            pending_start: None,
        }
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn mode(&self) -> PlayMode {
        self.playlist.mode()
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Status message not yet shown, clearing it.
    pub fn take_status(&mut self) -> Option<String> {
        Some(std::mem::take(&mut self.status)).filter(|s| !s.is_empty())
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.playlist.current_path()
    }

    pub fn current_song(&self) -> Option<&Song> {
        self.playlist.current_song()
    }

    pub fn song_mut(&mut self, path: &Path) -> Option<&mut Song> {
        self.playlist.get_mut(path)
    }

    /// Song loaded and waiting for the engine before it starts.
    pub fn pending_start(&self) -> Option<&Path> {
        self.pending_start.as_deref()
    }

    pub fn engine_emits_ready(&self) -> bool {
        self.engine.emits_ready()
    }

    /// User picked a song. Re-picking the loaded song toggles play/pause;
    /// anything else moves it to the front and starts it.
    pub async fn load_song(&mut self, path: &Path) {
        if !self.playlist.contains(path) {
            self.status = format!("Not in playlist: {}", path.display());
            return;
        }
        if self.current_path() == Some(path) && self.state != PlaybackState::NoSongLoaded {
            self.toggle_play_pause().await;
            return;
        }
        self.playlist.move_to_front(path);
        self.start(path, true).await;
    }

    pub async fn toggle_play_pause(&mut self) {
        match self.state {
            PlaybackState::NoSongLoaded => {}
            PlaybackState::Playing | PlaybackState::Loading => {
                self.pending_start = None;
                if let Err(e) = self.engine.pause().await {
                    warn!(error = %e, "pause failed");
                }
                self.state = PlaybackState::Paused;
            }
            PlaybackState::Paused => {
                self.pending_start = None;
                self.play_current().await;
            }
        }
    }

    pub async fn play_next(&mut self) {
        self.step(1).await;
    }

    pub async fn play_previous(&mut self) {
        self.step(-1).await;
    }

    /// Cycle the play mode; the playlist is reordered for the mode entered.
    pub fn change_play_mode(&mut self) -> PlayMode {
        let mode = self.playlist.cycle_mode();
        info!(mode = mode.label(), "play mode changed");
        self.status = format!("Mode: {}", mode.label());
        mode
    }

    /// The engine reached the end of the current song.
    ///
    /// Engines unload a finished file, so repeat-one loads it again rather
    /// than rewinding.
    pub async fn on_song_ended(&mut self) {
        if self.playlist.mode() == PlayMode::RepeatOne
            && let Some(path) = self.current_path().map(Path::to_path_buf)
        {
            self.start(&path, true).await;
            return;
        }
        self.play_next().await;
    }

    pub async fn remove_song(&mut self, path: &Path) {
        let was_current = self.current_path() == Some(path);
        let was_running = matches!(self.state, PlaybackState::Playing | PlaybackState::Loading);

        let Some((index, song)) = self.playlist.remove(path) else {
            return;
        };
        self.status = format!("Removed {}", song.display_name());
        if !was_current {
            return;
        }

        let next = self
            .playlist
            .at(index)
            .or_else(|| self.playlist.at(0))
            .map(|s| s.path.clone());
        match next {
            Some(next) => self.start(&next, was_running).await,
            None => self.unload().await,
        }
    }

    pub fn move_song(&mut self, path: &Path, to: usize) -> bool {
        self.playlist.move_song(path, to)
    }

    pub async fn seek(&mut self, seconds: f64) {
        if self.state == PlaybackState::NoSongLoaded || !seconds.is_finite() {
            return;
        }
        let mut target = seconds.max(0.0);
        if self.duration > 0.0 {
            target = target.min(self.duration);
        }
        match self.engine.seek(target).await {
            Ok(()) => self.position = target,
            Err(e) => warn!(error = %e, "seek failed"),
        }
    }

    pub async fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
        if let Err(e) = self.engine.set_volume(self.volume).await {
            warn!(error = %e, "set volume failed");
        }
    }

    /// Append an import batch. `initial_len` is the playlist length captured
    /// when the selection started; only a batch that began on an empty
    /// playlist auto-plays, and only if nothing was loaded in the meantime.
    pub async fn add_imported(&mut self, initial_len: usize, files: Vec<ImportedFile>) -> Vec<PathBuf> {
        let failed = files.iter().filter(|f| f.error.is_some()).count();
        let songs = files
            .into_iter()
            .map(|f| Song::new(f.path, f.metadata, 0))
            .collect();
        let added = self.playlist.add_many(songs);

        self.status = match (added.len(), failed) {
            (0, _) => "No new songs added.".to_string(),
            (n, 0) => format!("{n} songs added and metadata loaded."),
            (n, f) => format!("{n} songs added ({f} without metadata)."),
        };
        info!(added = added.len(), failed, "import finished");

        if initial_len == 0 && self.state == PlaybackState::NoSongLoaded {
            if let Some(first) = added.first().cloned() {
                self.load_song(&first).await;
            }
        }
        added
    }

    /// Engine is ready for the pending song. `expected` is the path captured
    /// by a start-delay timer; a timer for an older song is ignored.
    pub async fn on_ready(&mut self, expected: Option<&Path>) {
        let Some(pending) = self.pending_start.clone() else {
            return;
        };
        if expected.is_some_and(|p| p != pending) {
            debug!(expected = ?expected, "stale start timer");
            return;
        }
        if self.current_path() != Some(pending.as_path()) {
            self.pending_start = None;
            return;
        }
        self.pending_start = None;
        self.play_current().await;
    }

    pub fn on_engine_started(&mut self) {
        if self.current_path().is_some()
            && matches!(self.state, PlaybackState::Paused | PlaybackState::Loading)
        {
            self.pending_start = None;
            self.state = PlaybackState::Playing;
        }
    }

    pub fn on_engine_paused(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    pub fn on_position(&mut self, seconds: f64) {
        if self.current_path().is_some() && seconds.is_finite() {
            self.position = seconds.max(0.0);
        }
    }

    pub fn on_duration(&mut self, seconds: f64) {
        if self.current_path().is_some() && seconds.is_finite() && seconds >= 0.0 {
            self.duration = seconds;
        }
    }

    pub fn on_engine_error(&mut self, message: &str) {
        if matches!(self.state, PlaybackState::Loading | PlaybackState::Playing) {
            self.fail_playback(message);
        } else {
            warn!(error = message, "audio engine error");
        }
    }

    async fn step(&mut self, offset: isize) {
        if self.playlist.is_empty() {
            return;
        }
        let mode = self.playlist.mode();
        // Repeat-one and shuffle always come around; otherwise configurable.
        let wrap = self.wrap_around || mode != PlayMode::Sequential;

        let Some(index) = self.playlist.step_from_current(offset, wrap) else {
            self.status = "End of playlist.".to_string();
            self.unload().await;
            return;
        };
        let wrapped = self
            .playlist
            .current_index()
            .is_some_and(|cur| cur as isize + offset != index as isize);

        let Some(path) = self.playlist.at(index).map(|s| s.path.clone()) else {
            return;
        };
        if mode == PlayMode::Shuffle && wrapped && offset > 0 {
            // New cycle, new order.
            self.playlist.set_current(Some(&path));
            self.playlist.shuffle_pinning_current();
        }
        self.start(&path, true).await;
    }

    /// Make `path` current and hand it to the engine. With `autoplay` the
    /// song starts once the engine is ready, otherwise it stays paused.
    async fn start(&mut self, path: &Path, autoplay: bool) {
        let Some(source) = self.playlist.get(path).map(|s| s.source.clone()) else {
            return;
        };
        self.playlist.set_current(Some(path));
        self.position = 0.0;
        self.duration = self
            .playlist
            .get(path)
            .and_then(|s| s.metadata.as_ref()?.duration_secs)
            .unwrap_or(0.0);
        self.state = PlaybackState::Loading;
        self.pending_start = None;
        info!(path = %path.display(), autoplay, "loading song");

        let loaded = match self.engine.set_source(&source).await {
            Ok(()) => self.engine.load().await,
            Err(e) => Err(e),
        };
        if let Err(e) = loaded {
            self.fail_playback(format!("{e:#}"));
            return;
        }

        if autoplay {
            self.pending_start = Some(path.to_path_buf());
        } else {
            self.state = PlaybackState::Paused;
        }
    }

    async fn play_current(&mut self) {
        if self.current_path().is_none() {
            return;
        }
        match self.engine.play().await {
            Ok(()) => self.state = PlaybackState::Playing,
            Err(e) => self.fail_playback(format!("{e:#}")),
        }
    }

    async fn unload(&mut self) {
        if let Err(e) = self.engine.stop().await {
            warn!(error = %e, "stop failed");
        }
        self.playlist.set_current(None);
        self.state = PlaybackState::NoSongLoaded;
        self.pending_start = None;
        self.position = 0.0;
        self.duration = 0.0;
    }

    fn fail_playback(&mut self, error: impl std::fmt::Display) {
        warn!(error = %error, "playback failed");
        self.pending_start = None;
        self.status = PLAY_FAILED.to_string();
        if self.current_path().is_some() {
            self.state = PlaybackState::Paused;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Metadata;
    use crate::player::fake::{Call, FakeEngine};

    fn p(name: &str) -> PathBuf {
        PathBuf::from(format!("/music/{name}.mp3"))
    }

    fn file(name: &str) -> ImportedFile {
        ImportedFile {
            path: p(name),
            metadata: Some(Metadata {
                title: Some(name.to_uppercase()),
                artist: Some("Artist".into()),
                ..Default::default()
            }),
            error: None,
        }
    }

    async fn session_with(names: &[&str], wrap: bool) -> (Session, FakeEngine) {
        let engine = FakeEngine::new();
        let mut s = Session::new(Box::new(engine.clone()), wrap, 80);
        // Non-empty initial length: no auto-play.
        s.add_imported(1, names.iter().map(|n| file(n)).collect()).await;
        engine.clear();
        (s, engine)
    }

    fn order(s: &Session) -> Vec<PathBuf> {
        s.playlist().songs().iter().map(|x| x.path.clone()).collect()
    }

    async fn play(s: &mut Session, name: &str) {
        s.load_song(&p(name)).await;
        s.on_ready(None).await;
    }

    #[tokio::test]
    async fn load_then_ready_plays() {
        let (mut s, engine) = session_with(&["a", "b"], true).await;
        s.load_song(&p("b")).await;
        assert_eq!(s.state(), PlaybackState::Loading);
        assert_eq!(s.pending_start(), Some(p("b").as_path()));

        s.on_ready(None).await;
        assert_eq!(s.state(), PlaybackState::Playing);
        assert_eq!(
            engine.calls(),
            vec![
                Call::SetSource(p("b").to_string_lossy().into_owned()),
                Call::Load,
                Call::Play
            ]
        );
    }

    #[tokio::test]
    async fn selecting_moves_song_to_front() {
        let (mut s, _) = session_with(&["a", "b", "c", "d"], true).await;
        s.load_song(&p("c")).await;
        assert_eq!(order(&s), vec![p("c"), p("a"), p("b"), p("d")]);
        assert_eq!(s.playlist().current_index(), Some(0));
    }

    #[tokio::test]
    async fn reselecting_current_song_toggles() {
        let (mut s, engine) = session_with(&["a", "b"], true).await;
        play(&mut s, "a").await;
        engine.clear();

        s.load_song(&p("a")).await;
        assert_eq!(s.state(), PlaybackState::Paused);
        s.load_song(&p("a")).await;
        assert_eq!(s.state(), PlaybackState::Playing);
        assert_eq!(engine.calls(), vec![Call::Pause, Call::Play]);
    }

    #[tokio::test]
    async fn toggle_without_song_is_noop() {
        let (mut s, engine) = session_with(&["a"], true).await;
        s.toggle_play_pause().await;
        assert_eq!(s.state(), PlaybackState::NoSongLoaded);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn play_failure_pauses_with_status() {
        let (mut s, engine) = session_with(&["a"], true).await;
        engine.set_fail_play(true);
        play(&mut s, "a").await;
        assert_eq!(s.state(), PlaybackState::Paused);
        assert_eq!(s.status(), PLAY_FAILED);

        engine.set_fail_play(false);
        s.toggle_play_pause().await;
        assert_eq!(s.state(), PlaybackState::Playing);
    }

    #[tokio::test]
    async fn stale_start_timer_is_ignored() {
        let (mut s, engine) = session_with(&["a", "b"], true).await;
        s.load_song(&p("a")).await;
        s.load_song(&p("b")).await;
        engine.clear();

        s.on_ready(Some(&p("a"))).await;
        assert_eq!(s.state(), PlaybackState::Loading);
        assert!(engine.calls().is_empty());

        s.on_ready(Some(&p("b"))).await;
        assert_eq!(s.state(), PlaybackState::Playing);
        assert_eq!(s.current_path(), Some(p("b").as_path()));
    }

    #[tokio::test]
    async fn next_and_previous_wrap_by_default() {
        let (mut s, _) = session_with(&["a", "b", "c"], true).await;
        play(&mut s, "a").await;
        s.play_next().await;
        assert_eq!(s.current_path(), Some(p("b").as_path()));
        s.play_next().await;
        s.play_next().await;
        assert_eq!(s.current_path(), Some(p("a").as_path()));
        s.play_previous().await;
        assert_eq!(s.current_path(), Some(p("c").as_path()));
        // Stepping never reorders.
        assert_eq!(order(&s), vec![p("a"), p("b"), p("c")]);
    }

    #[tokio::test]
    async fn end_of_playlist_without_wrap_unloads() {
        let (mut s, engine) = session_with(&["a", "b"], false).await;
        play(&mut s, "b").await;
        s.on_position(12.0);
        s.on_duration(200.0);
        // b moved to the front, so a is last.
        s.on_song_ended().await;
        assert_eq!(s.current_path(), Some(p("a").as_path()));
        s.on_ready(None).await;

        s.on_song_ended().await;
        assert_eq!(s.state(), PlaybackState::NoSongLoaded);
        assert!(s.current_path().is_none());
        assert_eq!(s.position(), 0.0);
        assert_eq!(s.duration(), 0.0);
        assert_eq!(engine.calls().last(), Some(&Call::Stop));
    }

    #[tokio::test]
    async fn repeat_one_replays_same_song() {
        let (mut s, engine) = session_with(&["a", "b"], false).await;
        play(&mut s, "a").await;
        s.change_play_mode();
        assert_eq!(s.mode(), PlayMode::RepeatOne);
        engine.clear();

        s.on_position(187.0);
        s.on_song_ended().await;
        assert_eq!(s.current_path(), Some(p("a").as_path()));
        assert_eq!(s.state(), PlaybackState::Loading);
        assert_eq!(s.position(), 0.0);
        assert_eq!(s.pending_start(), Some(p("a").as_path()));

        s.on_ready(Some(&p("a"))).await;
        assert_eq!(s.state(), PlaybackState::Playing);
        assert_eq!(
            engine.calls(),
            vec![
                Call::SetSource(p("a").to_string_lossy().into_owned()),
                Call::Load,
                Call::Play
            ]
        );
    }

    #[tokio::test]
    async fn repeat_one_steps_around_both_ends_without_wrap() {
        let (mut s, _) = session_with(&["a", "b", "c"], false).await;
        play(&mut s, "a").await;
        s.change_play_mode();
        assert_eq!(s.mode(), PlayMode::RepeatOne);

        s.play_previous().await;
        assert_eq!(s.current_path(), Some(p("c").as_path()));
        assert_eq!(s.state(), PlaybackState::Loading);

        s.play_next().await;
        assert_eq!(s.current_path(), Some(p("a").as_path()));
        s.play_next().await;
        s.play_next().await;
        assert_eq!(s.current_path(), Some(p("c").as_path()));
        s.play_next().await;
        assert_eq!(s.current_path(), Some(p("a").as_path()));
        // Stepping in repeat-one never reorders.
        assert_eq!(order(&s), vec![p("a"), p("b"), p("c")]);
    }

    #[tokio::test]
    async fn shuffle_wraps_without_wrap_and_reshuffles_around_landed_song() {
        let names: Vec<String> = (0..10).map(|i| format!("t{i:02}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (mut s, _) = session_with(&refs, false).await;
        play(&mut s, "t00").await;
        s.change_play_mode();
        s.change_play_mode();
        assert_eq!(s.mode(), PlayMode::Shuffle);

        assert_eq!(s.playlist().current_index(), Some(0));
        for _ in 0..9 {
            s.play_next().await;
        }
        assert_eq!(s.playlist().current_index(), Some(9));
        let before: Vec<PathBuf> = order(&s);

        s.play_next().await;
        let landed = before[0].clone();
        assert_eq!(s.current_path(), Some(landed.as_path()));
        assert_eq!(s.state(), PlaybackState::Loading);
        assert_eq!(s.playlist().current_index(), Some(0));
        assert_eq!(order(&s)[0], landed);

        let mut after = order(&s);
        let mut expected = before;
        after.sort();
        expected.sort();
        assert_eq!(after, expected);
    }

    #[tokio::test]
    async fn shuffle_then_sequential_restores_insertion_order() {
        let names: Vec<String> = (0..12).map(|i| format!("t{i:02}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (mut s, _) = session_with(&refs, true).await;
        let original = order(&s);

        play(&mut s, "t05").await;
        s.change_play_mode();
        s.change_play_mode();
        assert_eq!(s.mode(), PlayMode::Shuffle);
        assert_eq!(s.playlist().current_index(), Some(0));
        assert_eq!(s.current_path(), Some(p("t05").as_path()));

        s.change_play_mode();
        assert_eq!(s.mode(), PlayMode::Sequential);
        assert_eq!(order(&s), original);
        assert_eq!(s.current_path(), Some(p("t05").as_path()));
        assert_eq!(s.playlist().current_index(), Some(5));
    }

    #[tokio::test]
    async fn removing_only_song_resets_everything() {
        let (mut s, _) = session_with(&["a"], true).await;
        play(&mut s, "a").await;
        s.on_position(30.0);
        s.on_duration(180.0);

        s.remove_song(&p("a")).await;
        assert_eq!(s.state(), PlaybackState::NoSongLoaded);
        assert_eq!(s.position(), 0.0);
        assert_eq!(s.duration(), 0.0);
        assert!(s.playlist().is_empty());
    }

    #[tokio::test]
    async fn removing_current_advances_to_next_remaining() {
        let (mut s, _) = session_with(&["a", "b", "c"], true).await;
        play(&mut s, "a").await;
        s.remove_song(&p("a")).await;
        assert_eq!(s.current_path(), Some(p("b").as_path()));
        assert_eq!(s.state(), PlaybackState::Loading);

        // Removing the last one wraps to the first remaining.
        s.on_ready(None).await;
        s.move_song(&p("b"), 1);
        s.remove_song(&p("b")).await;
        assert_eq!(s.current_path(), Some(p("c").as_path()));
    }

    #[tokio::test]
    async fn removing_other_song_keeps_current() {
        let (mut s, engine) = session_with(&["a", "b", "c"], true).await;
        play(&mut s, "b").await;
        engine.clear();
        s.remove_song(&p("c")).await;
        assert_eq!(s.current_path(), Some(p("b").as_path()));
        assert_eq!(s.state(), PlaybackState::Playing);
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn first_import_autoplays_and_degrades_failed_metadata() {
        let engine = FakeEngine::new();
        let mut s = Session::new(Box::new(engine.clone()), true, 80);
        let mut files: Vec<ImportedFile> = ["a", "b", "c", "d", "e"].iter().map(|n| file(n)).collect();
        files[2].metadata = None;
        files[2].error = Some("corrupt".into());

        let added = s.add_imported(0, files).await;
        assert_eq!(added.len(), 5);
        assert_eq!(s.current_path(), Some(p("a").as_path()));
        assert_eq!(s.state(), PlaybackState::Loading);
        assert_eq!(s.playlist().at(2).map(|x| x.display_name()), Some("c.mp3".to_string()));
        assert_eq!(s.playlist().at(3).and_then(|x| x.title()), Some("D"));
        assert!(s.status().contains("1 without metadata"));

        // A later batch never hijacks playback.
        s.add_imported(5, vec![file("f")]).await;
        assert_eq!(s.current_path(), Some(p("a").as_path()));
    }

    #[tokio::test]
    async fn seek_clamps_to_duration() {
        let (mut s, engine) = session_with(&["a"], true).await;
        s.seek(10.0).await;
        assert!(engine.calls().is_empty());

        play(&mut s, "a").await;
        s.on_duration(100.0);
        s.seek(250.0).await;
        assert_eq!(s.position(), 100.0);
        s.seek(-3.0).await;
        assert_eq!(s.position(), 0.0);
    }

    #[tokio::test]
    async fn engine_events_track_state() {
        let (mut s, _) = session_with(&["a"], true).await;
        s.on_engine_paused();
        assert_eq!(s.state(), PlaybackState::NoSongLoaded);

        play(&mut s, "a").await;
        s.on_engine_paused();
        assert_eq!(s.state(), PlaybackState::Paused);
        s.on_engine_started();
        assert_eq!(s.state(), PlaybackState::Playing);

        s.on_engine_error("decoder exploded");
        assert_eq!(s.state(), PlaybackState::Paused);
        assert_eq!(s.status(), PLAY_FAILED);
    }
}
