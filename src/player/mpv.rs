use super::AudioEngine;
use crate::app::events::{Event, PlayerEvent};
use anyhow::Context;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::UnixStream;
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

#[derive(Debug)]
pub struct MpvHandle {
    child: Child,
    socket_path: PathBuf,
    writer: Mutex<WriteHalf<UnixStream>>,
    source: Mutex<Option<String>>,
    request_id: AtomicU64,
}

/// Properties mpv reports back as `property-change` events, by observer id.
const OBSERVED: [(u64, &str); 3] = [(1, "time-pos"), (2, "duration"), (3, "pause")];

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

impl MpvHandle {
    /// Start an idle mpv bound to a private IPC socket and forward its events
    /// to `event_tx`.
    pub async fn spawn(
        event_tx: mpsc::Sender<Event>,
        audio_device: Option<&str>,
        log_file: Option<&Path>,
    ) -> anyhow::Result<Self> {
        let socket_path =
            std::env::temp_dir().join(format!("lyricplay-mpv-{}.sock", std::process::id()));
        let _ = std::fs::remove_file(&socket_path);

        let child = mpv_command(&socket_path, audio_device, log_file)
            .spawn()
            .context("spawn mpv")?;

        let stream = connect_with_retry(&socket_path, CONNECT_TIMEOUT).await?;
        let (reader, writer) = tokio::io::split(stream);
        tokio::spawn(read_events_loop(reader, event_tx));

        let this = Self {
            child,
            socket_path,
            writer: Mutex::new(writer),
            source: Mutex::new(None),
            request_id: AtomicU64::new(1),
        };

        this.command(json!({"command": ["request_log_messages", "warn"]}))
            .await?;
        for (id, name) in OBSERVED {
            this.command(json!({"command": ["observe_property", id, name]}))
                .await?;
        }
        Ok(this)
    }

    async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "pause", paused]}))
            .await
    }

    /// Send one IPC request. Replies are matched only for logging.
    async fn command(&self, mut request: serde_json::Value) -> anyhow::Result<()> {
        if let Some(obj) = request.as_object_mut() {
            let id = self.request_id.fetch_add(1, Ordering::Relaxed);
            obj.entry("request_id").or_insert_with(|| id.into());
        }
        let mut line = serde_json::to_vec(&request).context("encode mpv request")?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await.context("write mpv ipc")?;
        writer.flush().await.context("flush mpv ipc")
    }
}

#[async_trait::async_trait]
impl AudioEngine for MpvHandle {
    async fn set_source(&self, uri: &str) -> anyhow::Result<()> {
        *self.source.lock().await = Some(uri.to_string());
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<()> {
        let source = self
            .source
            .lock()
            .await
            .clone()
            .context("no source set")?;
        // Load paused; the session starts playback once mpv reports file-loaded.
        self.set_pause(true).await?;
        self.command(json!({"command":["loadfile", source, "replace"]}))
            .await
    }

    async fn play(&self) -> anyhow::Result<()> {
        self.set_pause(false).await
    }

    async fn pause(&self) -> anyhow::Result<()> {
        self.set_pause(true).await
    }

    async fn stop(&self) -> anyhow::Result<()> {
        *self.source.lock().await = None;
        self.command(json!({"command":["stop"]})).await
    }

    async fn seek(&self, seconds: f64) -> anyhow::Result<()> {
        self.command(json!({"command":["seek", seconds, "absolute"]}))
            .await
    }

    async fn set_volume(&self, volume_0_100: u8) -> anyhow::Result<()> {
        self.command(json!({"command":["set_property", "volume", volume_0_100]}))
            .await
    }

    fn emits_ready(&self) -> bool {
        true
    }
}

impl Drop for MpvHandle {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn mpv_command(socket_path: &Path, audio_device: Option<&str>, log_file: Option<&Path>) -> Command {
    let mut cmd = Command::new("mpv");
    cmd.args([
        "--no-video",
        "--idle=yes",
        "--input-terminal=no",
        "--really-quiet",
        "--keep-open=no",
    ])
    .arg(format!("--input-ipc-server={}", socket_path.display()));
    if let Some(dev) = audio_device {
        cmd.arg(format!("--audio-device={dev}"));
    }
    if let Some(p) = log_file {
        cmd.arg(format!("--log-file={}", p.display()));
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    cmd
}

/// mpv creates the socket a moment after it starts.
async fn connect_with_retry(path: &Path, timeout: Duration) -> anyhow::Result<UnixStream> {
    let deadline = Instant::now() + timeout;
    loop {
        match UnixStream::connect(path).await {
            Ok(stream) => return Ok(stream),
            Err(e) if Instant::now() >= deadline => {
                return Err(e).with_context(|| format!("connect to mpv ipc {}", path.display()));
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(50)).await,
        }
    }
}

async fn read_events_loop(reader: ReadHalf<UnixStream>, event_tx: mpsc::Sender<Event>) {
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let Ok(v) = serde_json::from_str::<serde_json::Value>(&line) else {
            continue;
        };
        if let Some(err) = rejected_reply(&v) {
            tracing::warn!(error = err, "mpv command rejected");
        }
        if let Some(pe) = map_mpv_event(&v)
            && event_tx.send(Event::Player(pe)).await.is_err()
        {
            break;
        }
    }
    tracing::debug!("mpv event stream closed");
}

/// Error text of a `{"request_id":..., "error":"..."}` reply that did not succeed.
fn rejected_reply(v: &serde_json::Value) -> Option<&str> {
    v.get("request_id")?;
    v.get("error")?.as_str().filter(|e| *e != "success")
}

fn map_mpv_event(v: &serde_json::Value) -> Option<PlayerEvent> {
    match v.get("event")?.as_str()? {
        "property-change" => {
            let name = v.get("name")?.as_str()?;
            match name {
                // `data` is absent or null while idle.
                "time-pos" => Some(PlayerEvent::Position {
                    seconds: v.get("data")?.as_f64()?,
                }),
                "duration" => Some(PlayerEvent::Duration {
                    seconds: v.get("data")?.as_f64()?,
                }),
                "pause" => {
                    let paused = v.get("data")?.as_bool()?;
                    Some(if paused { PlayerEvent::Paused } else { PlayerEvent::Started })
                }
                _ => None,
            }
        }
        "file-loaded" => Some(PlayerEvent::Ready),
        "end-file" => {
            // `replace` and `stop` also end the previous file; only eof counts.
            match v.get("reason").and_then(|x| x.as_str()).unwrap_or("") {
                "eof" => Some(PlayerEvent::Ended),
                "error" => {
                    let err = v.get("file_error").or_else(|| v.get("error"));
                    let err = err.and_then(|x| x.as_str()).unwrap_or("unknown");
                    Some(PlayerEvent::Error(format!("mpv could not play the file: {err}")))
                }
                _ => None,
            }
        }
        "log-message" => {
            let level = v.get("level").and_then(|x| x.as_str()).unwrap_or("info");
            let text = v.get("text").and_then(|x| x.as_str()).unwrap_or("").trim();
            if !text.is_empty() {
                tracing::warn!(mpv_level = level, "mpv: {text}");
            }
            None
        }
        _ => None,
    }
}
