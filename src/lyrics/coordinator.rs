use super::{LyricTimeline, LyricsLookup, strip_parenthetical};
use crate::app::events::{Event, TaskEvent};
use crate::session::Session;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Result of one remote lyrics lookup.
#[derive(Debug, Clone)]
pub enum LookupOutcome {
    Found(String),
    NotFound,
    Failed(String),
}

/// What the display shows: the timeline for `path` and the highlighted line.
#[derive(Debug, Clone, Default)]
pub struct LyricsView {
    pub path: Option<PathBuf>,
    pub timeline: LyricTimeline,
    pub loading: bool,
    pub active: Option<usize>,
}

/// Attaches lyric timelines to songs.
///
/// Lookups run in the background and report back as
/// [`TaskEvent::LyricsFetched`]. A result is always cached on the song it was
/// requested for, but only shown if that song is still the one displayed.
pub struct LyricsCoordinator {
    lookup: Option<Arc<dyn LyricsLookup>>,
    tx: mpsc::Sender<Event>,
    view: LyricsView,
    in_flight: HashSet<PathBuf>,
}

impl LyricsCoordinator {
    /// `lookup` is `None` when remote lookups are turned off.
    pub fn new(lookup: Option<Arc<dyn LyricsLookup>>, tx: mpsc::Sender<Event>) -> Self {
        Self {
            lookup,
            tx,
            view: LyricsView::default(),
            in_flight: HashSet::new(),
        }
    }

    pub fn view(&self) -> &LyricsView {
        &self.view
    }

    pub fn active_line(&self) -> Option<&str> {
        self.view.timeline.line(self.view.active?)
    }

    /// Call whenever the session's current song may have changed.
    pub fn on_song_changed(&mut self, session: &mut Session) {
        let current = session.current_path().map(Path::to_path_buf);
        let position = session.position();
        if self.view.path == current {
            return;
        }
        self.view = LyricsView {
            path: current.clone(),
            ..LyricsView::default()
        };
        let Some(path) = current else {
            return;
        };
        let Some(song) = session.song_mut(&path) else {
            return;
        };

        if let Some(cached) = &song.lyrics {
            debug!(path = %path.display(), lines = cached.len(), "lyrics from cache");
            self.view.timeline = cached.clone();
            self.view.active = self.view.timeline.active_index(position, None);
            return;
        }

        let key = song
            .metadata
            .as_ref()
            .and_then(|m| m.lookup_key())
            .map(|(title, artist)| (strip_parenthetical(title).to_string(), artist.to_string()));
        let Some((title, artist)) = key else {
            // No title and artist to search with.
            song.lyrics = Some(LyricTimeline::empty());
            return;
        };
        let Some(lookup) = self.lookup.clone() else {
            return;
        };

        self.view.loading = true;
        if !self.in_flight.insert(path.clone()) {
            return;
        }

        info!(title = %title, artist = %artist, "fetching lyrics");
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = match lookup.fetch_synced_lyrics(&title, &artist).await {
                Ok(Some(raw)) => LookupOutcome::Found(raw),
                Ok(None) => LookupOutcome::NotFound,
                Err(e) => LookupOutcome::Failed(format!("{e:#}")),
            };
            let _ = tx
                .send(Event::Task(TaskEvent::LyricsFetched { path, outcome }))
                .await;
        });
    }

    pub fn on_lookup_finished(&mut self, session: &mut Session, path: PathBuf, outcome: LookupOutcome) {
        if !self.in_flight.remove(&path) {
            debug!(path = %path.display(), "dropping superseded lyrics result");
            return;
        }

        let duration = parse_duration(session, &path);
        let timeline = match outcome {
            LookupOutcome::Found(raw) => LyricTimeline::from_lrc(&raw, duration),
            LookupOutcome::NotFound => LyricTimeline::empty(),
            LookupOutcome::Failed(e) => {
                warn!(path = %path.display(), error = %e, "lyrics lookup failed");
                LyricTimeline::empty()
            }
        };
        debug!(path = %path.display(), lines = timeline.len(), "lyrics lookup finished");

        if let Some(song) = session.song_mut(&path) {
            song.lyrics = Some(timeline.clone());
        }
        self.publish(&path, timeline, session.position());
    }

    /// User-supplied LRC text for `path`. Replaces any cached timeline and
    /// wins over a lookup still in flight.
    pub fn apply_manual(&mut self, session: &mut Session, path: &Path, raw: &str) {
        self.in_flight.remove(path);
        let timeline = LyricTimeline::from_lrc(raw, parse_duration(session, path));
        info!(path = %path.display(), lines = timeline.len(), "lyrics loaded from file");
        if let Some(song) = session.song_mut(path) {
            song.lyrics = Some(timeline.clone());
        }
        self.publish(path, timeline, session.position());
    }

    /// Track the playback position. Returns true when the highlighted line
    /// changed.
    pub fn on_position(&mut self, seconds: f64) -> bool {
        let next = self.view.timeline.active_index(seconds, self.view.active);
        if next == self.view.active {
            return false;
        }
        self.view.active = next;
        true
    }

    /// Stretch the shown and cached timelines once the real duration arrives.
    pub fn on_duration(&mut self, session: &mut Session, seconds: f64) {
        if seconds <= 0.0 || !seconds.is_finite() {
            return;
        }
        let Some(path) = self.view.path.clone() else {
            return;
        };
        self.view.timeline.set_duration(seconds);
        if let Some(cached) = session.song_mut(&path).and_then(|s| s.lyrics.as_mut()) {
            cached.set_duration(seconds);
        }
    }

    fn publish(&mut self, path: &Path, timeline: LyricTimeline, position: f64) {
        if self.view.path.as_deref() != Some(path) {
            return;
        }
        self.view.active = timeline.active_index(position, None);
        self.view.timeline = timeline;
        self.view.loading = false;
    }
}

/// Duration used to close the last lyric line: the live one for the
/// current song, otherwise whatever the tags reported.
fn parse_duration(session: &Session, path: &Path) -> f64 {
    if session.current_path() == Some(path) && session.duration() > 0.0 {
        return session.duration();
    }
    session
        .playlist()
        .get(path)
        .and_then(|s| s.metadata.as_ref()?.duration_secs)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ImportedFile, Metadata};
    use crate::player::fake::FakeEngine;
    use std::sync::Mutex;

    /// Answers from a fixed table keyed by title; records every request.
    #[derive(Default)]
    struct TableLookup {
        table: Vec<(&'static str, &'static str)>,
        requests: Mutex<Vec<(String, String)>>,
    }

    #[async_trait::async_trait]
    impl LyricsLookup for TableLookup {
        async fn fetch_synced_lyrics(&self, title: &str, artist: &str) -> anyhow::Result<Option<String>> {
            self.requests
                .lock()
                .unwrap()
                .push((title.to_string(), artist.to_string()));
            if title == "Broken" {
                anyhow::bail!("service unavailable");
            }
            Ok(self
                .table
                .iter()
                .find(|(t, _)| *t == title)
                .map(|(_, lrc)| lrc.to_string()))
        }
    }

    fn p(name: &str) -> PathBuf {
        PathBuf::from(format!("/music/{name}.mp3"))
    }

    fn tagged(name: &str, title: &str, artist: Option<&str>) -> ImportedFile {
        ImportedFile {
            path: p(name),
            metadata: Some(Metadata {
                title: Some(title.into()),
                artist: artist.map(Into::into),
                duration_secs: Some(30.0),
                ..Default::default()
            }),
            error: None,
        }
    }

    async fn setup(
        files: Vec<ImportedFile>,
        table: Vec<(&'static str, &'static str)>,
    ) -> (Session, LyricsCoordinator, Arc<TableLookup>, mpsc::Receiver<Event>) {
        let mut session = Session::new(Box::new(FakeEngine::new()), true, 80);
        session.add_imported(1, files).await;
        let lookup = Arc::new(TableLookup {
            table,
            ..Default::default()
        });
        let (tx, rx) = mpsc::channel(16);
        let coordinator = LyricsCoordinator::new(Some(lookup.clone() as Arc<dyn LyricsLookup>), tx);
        (session, coordinator, lookup, rx)
    }

    async fn next_result(rx: &mut mpsc::Receiver<Event>) -> (PathBuf, LookupOutcome) {
        match rx.recv().await {
            Some(Event::Task(TaskEvent::LyricsFetched { path, outcome })) => (path, outcome),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn lookup_result_is_shown_and_cached() {
        let (mut session, mut lyr, lookup, mut rx) = setup(
            vec![tagged("a", "Song (Live)", Some("Band"))],
            vec![("Song", "[00:01.00]one\n[00:02.00]two")],
        )
        .await;
        session.load_song(&p("a")).await;
        lyr.on_song_changed(&mut session);
        assert!(lyr.view().loading);

        let (path, outcome) = next_result(&mut rx).await;
        lyr.on_lookup_finished(&mut session, path, outcome);

        assert!(!lyr.view().loading);
        assert_eq!(lyr.view().timeline.len(), 2);
        assert_eq!(lyr.view().timeline.segments()[1].end, 30.0);
        assert_eq!(
            lookup.requests.lock().unwrap().clone(),
            vec![("Song".to_string(), "Band".to_string())]
        );
        let cached = session.playlist().get(&p("a")).and_then(|s| s.lyrics.clone());
        assert_eq!(cached.map(|t| t.len()), Some(2));
    }

    #[tokio::test]
    async fn late_result_for_previous_song_is_cached_not_shown() {
        let (mut session, mut lyr, _, mut rx) = setup(
            vec![
                tagged("a", "Alpha", Some("Band")),
                tagged("b", "Beta", Some("Band")),
            ],
            vec![("Alpha", "[00:01.00]alpha"), ("Beta", "[00:01.00]beta\n[00:03.00]beta 2")],
        )
        .await;

        session.load_song(&p("a")).await;
        lyr.on_song_changed(&mut session);
        session.load_song(&p("b")).await;
        lyr.on_song_changed(&mut session);

        let mut results = vec![next_result(&mut rx).await, next_result(&mut rx).await];
        results.sort_by_key(|(path, _)| path != &p("a"));

        let (path, outcome) = results.remove(0);
        assert_eq!(path, p("a"));
        lyr.on_lookup_finished(&mut session, path, outcome);
        assert_eq!(lyr.view().path.as_deref(), Some(p("b").as_path()));
        assert!(lyr.view().timeline.is_empty());
        assert!(lyr.view().loading);
        let cached_a = session.playlist().get(&p("a")).and_then(|s| s.lyrics.clone());
        assert_eq!(cached_a.and_then(|t| t.line(0).map(str::to_string)), Some("alpha".into()));

        let (path, outcome) = results.remove(0);
        lyr.on_lookup_finished(&mut session, path, outcome);
        assert_eq!(lyr.view().timeline.line(0), Some("beta"));
        assert!(!lyr.view().loading);
    }

    #[tokio::test]
    async fn cached_timeline_skips_lookup() {
        let (mut session, mut lyr, lookup, mut rx) = setup(
            vec![
                tagged("a", "Alpha", Some("Band")),
                tagged("b", "Beta", Some("Band")),
            ],
            vec![("Alpha", "[00:01.00]alpha")],
        )
        .await;
        session.load_song(&p("a")).await;
        lyr.on_song_changed(&mut session);
        let (path, outcome) = next_result(&mut rx).await;
        lyr.on_lookup_finished(&mut session, path, outcome);

        session.load_song(&p("b")).await;
        lyr.on_song_changed(&mut session);
        let (path, outcome) = next_result(&mut rx).await;
        lyr.on_lookup_finished(&mut session, path, outcome);
        assert!(lyr.view().timeline.is_empty());

        session.load_song(&p("a")).await;
        lyr.on_song_changed(&mut session);
        assert_eq!(lyr.view().timeline.line(0), Some("alpha"));
        assert!(!lyr.view().loading);
        assert_eq!(lookup.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_artist_means_no_lookup() {
        let (mut session, mut lyr, lookup, _rx) =
            setup(vec![tagged("a", "Alpha", None)], vec![("Alpha", "[00:01.00]x")]).await;
        session.load_song(&p("a")).await;
        lyr.on_song_changed(&mut session);

        assert!(!lyr.view().loading);
        assert!(lyr.view().timeline.is_empty());
        assert!(lookup.requests.lock().unwrap().is_empty());
        let cached = session.playlist().get(&p("a")).and_then(|s| s.lyrics.clone());
        assert_eq!(cached, Some(LyricTimeline::empty()));
    }

    #[tokio::test]
    async fn manual_lyrics_beat_pending_lookup() {
        let (mut session, mut lyr, _, mut rx) = setup(
            vec![tagged("a", "Alpha", Some("Band"))],
            vec![("Alpha", "[00:01.00]remote")],
        )
        .await;
        session.load_song(&p("a")).await;
        lyr.on_song_changed(&mut session);
        assert!(lyr.in_flight.contains(&p("a")));

        lyr.apply_manual(&mut session, &p("a"), "[00:00.50]manual");
        assert!(!lyr.in_flight.contains(&p("a")));
        assert_eq!(lyr.view().timeline.line(0), Some("manual"));

        let (path, outcome) = next_result(&mut rx).await;
        lyr.on_lookup_finished(&mut session, path, outcome);
        assert_eq!(lyr.view().timeline.line(0), Some("manual"));
        let cached = session.playlist().get(&p("a")).and_then(|s| s.lyrics.clone());
        assert_eq!(cached.and_then(|t| t.line(0).map(str::to_string)), Some("manual".into()));
    }

    #[tokio::test]
    async fn failed_lookup_caches_empty_timeline() {
        let (mut session, mut lyr, _, mut rx) =
            setup(vec![tagged("a", "Broken", Some("Band"))], vec![]).await;
        session.load_song(&p("a")).await;
        lyr.on_song_changed(&mut session);
        let (path, outcome) = next_result(&mut rx).await;
        assert!(matches!(outcome, LookupOutcome::Failed(_)));
        lyr.on_lookup_finished(&mut session, path, outcome);

        assert!(!lyr.view().loading);
        assert!(lyr.view().timeline.is_empty());
        let cached = session.playlist().get(&p("a")).and_then(|s| s.lyrics.clone());
        assert_eq!(cached, Some(LyricTimeline::empty()));
    }

    #[tokio::test]
    async fn position_and_duration_drive_the_view() {
        let (mut session, mut lyr, _, _rx) = setup(vec![tagged("a", "Alpha", None)], vec![]).await;
        session.load_song(&p("a")).await;
        lyr.on_song_changed(&mut session);
        lyr.apply_manual(&mut session, &p("a"), "[00:01.00]one\n[00:04.00]two");

        assert!(!lyr.on_position(0.5));
        assert!(lyr.on_position(1.0));
        assert_eq!(lyr.active_line(), Some("one"));
        assert!(!lyr.on_position(3.9));
        assert!(lyr.on_position(4.0));
        assert_eq!(lyr.active_line(), Some("two"));

        session.on_duration(95.0);
        lyr.on_duration(&mut session, 95.0);
        assert_eq!(lyr.view().timeline.segments()[1].end, 95.0);
        let cached = session.playlist().get(&p("a")).and_then(|s| s.lyrics.clone()).unwrap();
        assert_eq!(cached.segments()[1].end, 95.0);
    }
}
