use super::AudioEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetSource(String),
    Load,
    Play,
    Pause,
    Stop,
    Seek(f64),
    Volume(u8),
}

/// Records every call; `play` can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    calls: Arc<Mutex<Vec<Call>>>,
    fail_play: Arc<AtomicBool>,
    ready_events: bool,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ready_events() -> Self {
        Self {
            ready_events: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn set_fail_play(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait::async_trait]
impl AudioEngine for FakeEngine {
    async fn set_source(&self, uri: &str) -> anyhow::Result<()> {
        self.record(Call::SetSource(uri.to_string()));
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<()> {
        self.record(Call::Load);
        Ok(())
    }

    async fn play(&self) -> anyhow::Result<()> {
        self.record(Call::Play);
        if self.fail_play.load(Ordering::SeqCst) {
            anyhow::bail!("playback blocked");
        }
        Ok(())
    }

    async fn pause(&self) -> anyhow::Result<()> {
        self.record(Call::Pause);
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.record(Call::Stop);
        Ok(())
    }

    async fn seek(&self, seconds: f64) -> anyhow::Result<()> {
        self.record(Call::Seek(seconds));
        Ok(())
    }

    async fn set_volume(&self, volume_0_100: u8) -> anyhow::Result<()> {
        self.record(Call::Volume(volume_0_100));
        Ok(())
    }

    fn emits_ready(&self) -> bool {
        self.ready_events
    }
}
