use std::path::PathBuf;

/// A song named by the user: 1-based position as shown by `ls`, or a path.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Position(usize),
    Path(PathBuf),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Quit,
    Help,
    ShowPlaylist,
    ShowNowPlaying,

    AddFiles(Vec<PathBuf>),
    Play(Target),
    TogglePause,
    PlayNext,
    PlayPrev,
    CyclePlayMode,
    Remove(Target),
    Move { from: Target, to: usize },
    Seek(f64),
    Volume(u8),

    LoadLyricsFile(PathBuf),

    /// A command that could not be understood, with the reason.
    Invalid(String),
}
