pub mod actions;
pub mod events;

use crate::config::Config;
use crate::input;
use crate::library::picker::PathPicker;
use crate::library::tags::LoftyReader;
use crate::library::{self, ImportOutcome, MetadataReader, format_time};
use crate::lyrics::{LrclibClient, LyricsCoordinator, LyricsLookup};
use crate::player::mpv::MpvHandle;
use crate::player::{AudioEngine, NullEngine};
use crate::session::{PlaybackState, Session};
use actions::{Action, Target};
use events::{Event, PlayerEvent, TaskEvent};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub struct App {
    cfg: Config,
    config_path: PathBuf,
    session: Session,
    lyrics: LyricsCoordinator,
    reader: Arc<dyn MetadataReader>,
    tx: mpsc::Sender<Event>,
    rx: Option<mpsc::Receiver<Event>>,
    should_quit: bool,
    /// Song the start-delay timer was last armed for.
    armed_start: Option<PathBuf>,
    announced: Option<PathBuf>,
    lyrics_banner: Option<(PathBuf, bool, usize)>,
}

impl App {
    /// Start mpv (falling back to a silent engine) and the LRCLIB client.
    pub async fn new(cfg: Config, config_path: PathBuf) -> anyhow::Result<Self> {
        let (tx, rx) = mpsc::channel::<Event>(256);

        let mpv_log = mpv_log_path(&cfg.paths.data_dir);
        let mut startup_status = None;
        let engine: Box<dyn AudioEngine> =
            match MpvHandle::spawn(tx.clone(), cfg.player.audio_device.as_deref(), mpv_log.as_deref()).await {
                Ok(h) => Box::new(h),
                Err(e) => {
                    warn!(error = %e, "mpv unavailable");
                    startup_status = Some(format!("mpv disabled: {e:#}"));
                    Box::new(NullEngine)
                }
            };

        let lookup: Option<Arc<dyn LyricsLookup>> = if cfg.lyrics.enabled {
            let client = LrclibClient::new(&cfg.lyrics.base_url, Duration::from_secs(cfg.lyrics.timeout_secs))?;
            Some(Arc::new(client))
        } else {
            None
        };

        let mut app = Self::with_parts(cfg, config_path, engine, lookup, Arc::new(LoftyReader), tx, rx);
        let volume = app.session.volume();
        app.session.set_volume(volume).await;
        if let Some(status) = startup_status {
            app.session.set_status(status);
        }
        Ok(app)
    }

    fn with_parts(
        cfg: Config,
        config_path: PathBuf,
        engine: Box<dyn AudioEngine>,
        lookup: Option<Arc<dyn LyricsLookup>>,
        reader: Arc<dyn MetadataReader>,
        tx: mpsc::Sender<Event>,
        rx: mpsc::Receiver<Event>,
    ) -> Self {
        let session = Session::new(engine, cfg.player.wrap_around, cfg.player.volume);
        let lyrics = LyricsCoordinator::new(lookup, tx.clone());
        Self {
            cfg,
            config_path,
            session,
            lyrics,
            reader,
            tx,
            rx: Some(rx),
            should_quit: false,
            armed_start: None,
            announced: None,
            lyrics_banner: None,
        }
    }

    /// Run the console until `q` or end of input. `seed` is added to the
    /// playlist first, as if typed after `add`.
    pub async fn run(&mut self, seed: Vec<PathBuf>) -> anyhow::Result<()> {
        let Some(mut rx) = self.rx.take() else {
            anyhow::bail!("app is already running");
        };

        input::spawn_input_task(self.tx.clone());
        println!("lyricplay: type `help` for commands");
        if !seed.is_empty() {
            self.handle_action(Action::AddFiles(seed)).await;
        }
        self.render();

        while let Some(ev) = rx.recv().await {
            self.dispatch(ev).await;
            if self.should_quit {
                break;
            }
        }

        self.save_state_on_quit();
        Ok(())
    }

    async fn dispatch(&mut self, ev: Event) {
        match ev {
            Event::Input(action) => self.handle_action(action).await,
            Event::Player(pe) => self.handle_player(pe).await,
            Event::Task(te) => self.handle_task(te).await,
        }
        self.lyrics.on_song_changed(&mut self.session);
        self.arm_start_timer();
        self.render();
    }

    fn save_state_on_quit(&mut self) {
        self.cfg.player.volume = self.session.volume();
        if let Err(e) = crate::config::save(&self.cfg, Some(&self.config_path)) {
            warn!(error = %e, "could not save config");
        }
    }

    async fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::Help => println!("{}", input::HELP),
            Action::ShowPlaylist => self.print_playlist(),
            Action::ShowNowPlaying => self.print_now_playing(),
            Action::AddFiles(paths) => self.spawn_import(paths),
            Action::Play(target) => {
                if let Some(path) = self.resolve(&target) {
                    self.session.load_song(&path).await;
                }
            }
            Action::TogglePause => self.session.toggle_play_pause().await,
            Action::PlayNext => self.session.play_next().await,
            Action::PlayPrev => self.session.play_previous().await,
            Action::CyclePlayMode => {
                self.session.change_play_mode();
            }
            Action::Remove(target) => {
                if let Some(path) = self.resolve(&target) {
                    self.session.remove_song(&path).await;
                }
            }
            Action::Move { from, to } => {
                if let Some(path) = self.resolve(&from)
                    && self.session.move_song(&path, to.saturating_sub(1))
                {
                    self.print_playlist();
                }
            }
            Action::Seek(seconds) => self.session.seek(seconds).await,
            Action::Volume(v) => {
                self.session.set_volume(v).await;
                self.session.set_status(format!("Volume {v}"));
            }
            Action::LoadLyricsFile(file) => self.spawn_read_lyrics_file(file),
            Action::Invalid(message) => self.session.set_status(message),
        }
    }

    async fn handle_player(&mut self, pe: PlayerEvent) {
        match pe {
            PlayerEvent::Ready => self.session.on_ready(None).await,
            PlayerEvent::Started => self.session.on_engine_started(),
            PlayerEvent::Paused => self.session.on_engine_paused(),
            PlayerEvent::Position { seconds } => {
                self.session.on_position(seconds);
                if self.lyrics.on_position(self.session.position())
                    && let Some(line) = self.lyrics.active_line()
                {
                    println!("  ♪ {line}");
                }
            }
            PlayerEvent::Duration { seconds } => {
                self.session.on_duration(seconds);
                self.lyrics.on_duration(&mut self.session, seconds);
            }
            PlayerEvent::Ended => self.session.on_song_ended().await,
            PlayerEvent::Error(e) => self.session.on_engine_error(&e),
        }
    }

    async fn handle_task(&mut self, te: TaskEvent) {
        match te {
            TaskEvent::FilesImported { initial_len, outcome } => match outcome {
                ImportOutcome::Cancelled => self.session.set_status("No files selected."),
                ImportOutcome::Files(files) if files.is_empty() => {
                    self.session.set_status("No matching audio files.");
                }
                ImportOutcome::Files(files) => {
                    self.session.add_imported(initial_len, files).await;
                }
            },
            TaskEvent::ImportFailed(e) => {
                warn!(error = %e, "import failed");
                self.session.set_status(format!("Import failed: {e}"));
            }
            TaskEvent::LyricsFetched { path, outcome } => {
                self.lyrics.on_lookup_finished(&mut self.session, path, outcome);
            }
            TaskEvent::LyricsFileRead { path, result } => match result {
                Ok(raw) => self.lyrics.apply_manual(&mut self.session, &path, &raw),
                Err(e) => self.session.set_status(format!("Could not read lyrics: {e}")),
            },
            TaskEvent::StartDelayElapsed { path } => self.session.on_ready(Some(&path)).await,
        }
    }

    /// Resolve a user-facing target to a song path in the playlist.
    fn resolve(&mut self, target: &Target) -> Option<PathBuf> {
        let found = match target {
            Target::Position(n) => self
                .session
                .playlist()
                .at(n.saturating_sub(1))
                .map(|s| s.path.clone()),
            Target::Path(p) => {
                let p = std::path::absolute(p).unwrap_or_else(|_| p.clone());
                self.session.playlist().contains(&p).then_some(p)
            }
        };
        if found.is_none() {
            self.session.set_status("No such song in the playlist.");
        }
        found
    }

    fn spawn_import(&mut self, paths: Vec<PathBuf>) {
        let initial_len = self.session.playlist().len();
        let picker = PathPicker::new(paths, self.cfg.library.recursive);
        let reader = Arc::clone(&self.reader);
        let extensions = self.cfg.library.extensions.clone();
        let tx = self.tx.clone();
        self.session.set_status("Reading metadata...");

        tokio::spawn(async move {
            let ev = match library::import_files(&picker, reader, &extensions).await {
                Ok(outcome) => TaskEvent::FilesImported { initial_len, outcome },
                Err(e) => TaskEvent::ImportFailed(format!("{e:#}")),
            };
            let _ = tx.send(Event::Task(ev)).await;
        });
    }

    fn spawn_read_lyrics_file(&mut self, file: PathBuf) {
        let Some(path) = self.session.current_path().map(Path::to_path_buf) else {
            self.session.set_status("Load a song before adding lyrics.");
            return;
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = tokio::fs::read_to_string(&file)
                .await
                .map_err(|e| format!("{}: {e}", file.display()));
            let _ = tx
                .send(Event::Task(TaskEvent::LyricsFileRead { path, result }))
                .await;
        });
    }

    /// Engines without a ready signal start the pending song after a fixed
    /// delay. The timer carries the path it was armed for.
    fn arm_start_timer(&mut self) {
        if self.session.engine_emits_ready() {
            return;
        }
        let pending = self.session.pending_start().map(Path::to_path_buf);
        if pending == self.armed_start {
            return;
        }
        self.armed_start = pending.clone();
        let Some(path) = pending else {
            return;
        };

        let delay = Duration::from_millis(self.cfg.player.start_delay_ms);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx
                .send(Event::Task(TaskEvent::StartDelayElapsed { path }))
                .await;
        });
    }

    fn render(&mut self) {
        let current = self.session.current_path().map(Path::to_path_buf);
        if current != self.announced {
            if let Some(song) = self.session.current_song() {
                info!(path = %song.path.display(), "now playing");
                println!("▶ {}", song.display_name());
            }
            self.announced = current;
        }

        let view = self.lyrics.view();
        let banner = view
            .path
            .clone()
            .map(|p| (p, view.loading, view.timeline.len()));
        if banner != self.lyrics_banner {
            match &banner {
                Some((_, true, _)) => println!("  lyrics: searching..."),
                Some((_, false, 0)) => println!("  lyrics: none"),
                Some((_, false, n)) => println!("  lyrics: {n} lines"),
                None => {}
            }
            self.lyrics_banner = banner;
        }

        if let Some(status) = self.session.take_status() {
            println!("{status}");
        }
    }

    fn print_playlist(&self) {
        let playlist = self.session.playlist();
        if playlist.is_empty() {
            println!("(playlist is empty)");
            return;
        }
        let current = playlist.current_path();
        for (i, song) in playlist.songs().iter().enumerate() {
            let marker = if current == Some(song.path.as_path()) { '▶' } else { ' ' };
            let length = song
                .metadata
                .as_ref()
                .and_then(|m| m.duration_secs)
                .map(format_time)
                .unwrap_or_default();
            println!("{marker} {:>3}. {}  {length}", i + 1, song.display_name());
        }
    }

    fn print_now_playing(&self) {
        let Some(song) = self.session.current_song() else {
            println!("Nothing loaded.");
            return;
        };
        let state = match self.session.state() {
            PlaybackState::NoSongLoaded => "stopped",
            PlaybackState::Loading => "loading",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        };
        println!(
            "{} [{state}] {} / {}  mode: {}  vol: {}",
            song.display_name(),
            format_time(self.session.position()),
            format_time(self.session.duration()),
            self.session.mode().label(),
            self.session.volume(),
        );
        if let Some(line) = self.lyrics.active_line() {
            println!("  ♪ {line}");
        }
    }
}

/// Where mpv writes its log. `None` when the data dir cannot be created,
/// since mpv would otherwise drop the log without telling anyone.
fn mpv_log_path(data_dir: &Path) -> Option<PathBuf> {
    match std::fs::create_dir_all(data_dir) {
        Ok(()) => Some(data_dir.join("mpv.log")),
        Err(e) => {
            warn!(error = %e, dir = %data_dir.display(), "could not create data dir");
            None
        }
    }
}
