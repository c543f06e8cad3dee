mod app;
mod config;
mod input;
mod library;
mod lyrics;
mod player;
mod queue;
mod session;

use anyhow::Context;
use clap::{Parser, Subcommand};
use lyrics::{LyricTimeline, LrclibClient};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "lyricplay", version, about = "Local music player with synced lyrics")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the interactive console (default).
    Run {
        /// Files or directories to add on startup.
        paths: Vec<PathBuf>,
    },
    /// Parse an .lrc file and print its segments (headless).
    Parse {
        file: PathBuf,
        /// Track duration in seconds, closes the last line.
        #[arg(long, default_value_t = 0.0)]
        duration: f64,
    },
    /// Look up synced lyrics on LRCLIB and print them (headless).
    Lookup { title: String, artist: String },
    /// Print the tags read from an audio file (headless).
    Tags { file: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;
    let cfg_path = match cli.config.clone() {
        Some(p) => p,
        None => config::default_config_path().context("default config path")?,
    };

    match cli.command.unwrap_or(Command::Run { paths: Vec::new() }) {
        Command::Run { paths } => {
            let mut app = app::App::new(cfg, cfg_path).await?;
            app.run(paths).await?;
        }
        Command::Parse { file, duration } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            print_timeline(&LyricTimeline::from_lrc(&raw, duration));
        }
        Command::Lookup { title, artist } => {
            let client = LrclibClient::new(&cfg.lyrics.base_url, Duration::from_secs(cfg.lyrics.timeout_secs))?;
            let title = lyrics::strip_parenthetical(&title);
            match client.get_lyrics(title, &artist).await? {
                Some(found) => {
                    println!("{} — {}", found.track_name, found.artist_name);
                    match (found.synced_lyrics.as_deref(), found.plain_lyrics.as_deref()) {
                        (Some(raw), _) => print_timeline(&LyricTimeline::from_lrc(raw, 0.0)),
                        (None, Some(plain)) => println!("(plain lyrics only)\n{plain}"),
                        (None, None) => println!("(no lyrics text)"),
                    }
                }
                None => println!("No lyrics found."),
            }
        }
        Command::Tags { file } => {
            let meta = tokio::task::spawn_blocking(move || library::tags::read_tags(&file)).await??;
            let mut shown = meta;
            // Covers are long; print the size instead.
            if let Some(cover) = shown.cover_base64.take() {
                shown.cover_base64 = Some(format!("<{} base64 chars>", cover.len()));
            }
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

fn print_timeline(timeline: &LyricTimeline) {
    if timeline.is_empty() {
        println!("(no timed lines)");
        return;
    }
    for seg in timeline.segments() {
        println!("[{:>8.2} - {:>8.2}] {}", seg.start, seg.end, seg.text);
    }
}
