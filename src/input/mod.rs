use crate::app::actions::{Action, Target};
use crate::app::events::Event;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

pub const HELP: &str = "\
commands:
  add [PATHS...]     add files or directories to the playlist
  play <N|PATH>      play song N (as listed by `ls`) or a path
  p | toggle         play / pause
  next | prev        skip forward / back
  mode               cycle sequential -> repeat one -> shuffle
  rm <N|PATH>        remove a song
  mv <FROM> <TO>     move song FROM to position TO
  seek <SECS|MM:SS>  jump within the current song
  vol <0-100>        set volume
  lyrics <FILE>      load an .lrc file for the current song
  ls | now           show playlist / current song
  q                  quit";

/// Read stdin line by line and forward each parsed command.
/// End of input counts as `q`.
pub fn spawn_input_task(tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let action = match lines.next_line().await {
                Ok(Some(line)) => match parse_command(&line) {
                    Some(action) => action,
                    None => continue,
                },
                Ok(None) => Action::Quit,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin read failed");
                    Action::Quit
                }
            };
            let quit = action == Action::Quit;
            if tx.send(Event::Input(action)).await.is_err() || quit {
                break;
            }
        }
    });
}

/// Map one console line to an action. Blank lines map to nothing.
pub fn parse_command(line: &str) -> Option<Action> {
    let line = line.trim();
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };

    let action = match cmd.to_ascii_lowercase().as_str() {
        "" => return None,
        "q" | "quit" | "exit" => Action::Quit,
        "h" | "help" | "?" => Action::Help,
        "ls" | "list" => Action::ShowPlaylist,
        "now" => Action::ShowNowPlaying,
        "add" => Action::AddFiles(split_args(rest).into_iter().map(PathBuf::from).collect()),
        "play" => match parse_target(rest) {
            Some(target) => Action::Play(target),
            None => usage("play <N|PATH>"),
        },
        "p" | "toggle" | "pause" => Action::TogglePause,
        "n" | "next" => Action::PlayNext,
        "prev" | "previous" => Action::PlayPrev,
        "m" | "mode" => Action::CyclePlayMode,
        "rm" | "remove" => match parse_target(rest) {
            Some(target) => Action::Remove(target),
            None => usage("rm <N|PATH>"),
        },
        "mv" | "move" => {
            let args = split_args(rest);
            match args.as_slice() {
                [from, to] => match (parse_target(from), to.parse::<usize>()) {
                    (Some(from), Ok(to)) if to > 0 => Action::Move { from, to },
                    _ => usage("mv <FROM> <TO>"),
                },
                _ => usage("mv <FROM> <TO>"),
            }
        }
        "seek" => match parse_seconds(rest) {
            Some(secs) => Action::Seek(secs),
            None => usage("seek <SECS|MM:SS>"),
        },
        "vol" | "volume" => match rest.parse::<u8>() {
            Ok(v) if v <= 100 => Action::Volume(v),
            _ => usage("vol <0-100>"),
        },
        "lyrics" | "lrc" => match unquote(rest) {
            "" => usage("lyrics <FILE>"),
            path => Action::LoadLyricsFile(PathBuf::from(path)),
        },
        other => Action::Invalid(format!("unknown command `{other}` (try `help`)")),
    };
    Some(action)
}

fn usage(text: &str) -> Action {
    Action::Invalid(format!("usage: {text}"))
}

/// 1-based position if the argument is a number, otherwise a path.
fn parse_target(arg: &str) -> Option<Target> {
    let arg = unquote(arg);
    if arg.is_empty() {
        return None;
    }
    if arg.bytes().all(|b| b.is_ascii_digit()) {
        return match arg.parse::<usize>() {
            Ok(n) if n > 0 => Some(Target::Position(n)),
            _ => None,
        };
    }
    Some(Target::Path(PathBuf::from(arg)))
}

/// `75`, `75.5` or `1:15`.
fn parse_seconds(arg: &str) -> Option<f64> {
    let secs = match arg.split_once(':') {
        Some((m, s)) => m.parse::<u32>().ok()? as f64 * 60.0 + s.parse::<f64>().ok()?,
        None => arg.parse::<f64>().ok()?,
    };
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}

fn unquote(arg: &str) -> &str {
    let arg = arg.trim();
    arg.strip_prefix('"')
        .and_then(|a| a.strip_suffix('"'))
        .unwrap_or(arg)
}

/// Whitespace-separated words; double quotes group words containing spaces.
fn split_args(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_word = false;
    for c in raw.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_word = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_word {
                    args.push(std::mem::take(&mut current));
                    has_word = false;
                }
            }
            c => {
                current.push(c);
                has_word = true;
            }
        }
    }
    if has_word {
        args.push(current);
    }
    args
}
