use super::actions::Action;
use crate::library::ImportOutcome;
use crate::lyrics::coordinator::LookupOutcome;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Event {
    Input(Action),
    Player(PlayerEvent),
    Task(TaskEvent),
}

/// Reports from the audio engine.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// The loaded source can start playing.
    Ready,
    Started,
    Paused,
    Position { seconds: f64 },
    Duration { seconds: f64 },
    Ended,
    Error(String),
}

/// Completions of background work spawned by the app.
#[derive(Debug, Clone)]
pub enum TaskEvent {
    FilesImported {
        initial_len: usize,
        outcome: ImportOutcome,
    },
    ImportFailed(String),
    LyricsFetched {
        path: PathBuf,
        outcome: LookupOutcome,
    },
    LyricsFileRead {
        path: PathBuf,
        result: Result<String, String>,
    },
    StartDelayElapsed {
        path: PathBuf,
    },
}
