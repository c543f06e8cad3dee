//! Audio output seam. The session drives an [`AudioEngine`]; engines report
//! back asynchronously through [`crate::app::events::PlayerEvent`].

#[cfg(test)]
pub mod fake;
pub mod mpv;

#[async_trait::async_trait]
pub trait AudioEngine: Send + Sync {
    /// Remember the source to open on the next [`AudioEngine::load`].
    async fn set_source(&self, uri: &str) -> anyhow::Result<()>;
    /// Open the current source without starting playback.
    async fn load(&self) -> anyhow::Result<()>;
    async fn play(&self) -> anyhow::Result<()>;
    async fn pause(&self) -> anyhow::Result<()>;
    /// Unload the source entirely.
    async fn stop(&self) -> anyhow::Result<()>;
    /// Absolute seek in seconds.
    async fn seek(&self, seconds: f64) -> anyhow::Result<()>;
    async fn set_volume(&self, volume_0_100: u8) -> anyhow::Result<()>;

    /// Whether the engine sends `PlayerEvent::Ready` after a load. Engines
    /// that do not get a fixed start delay instead.
    fn emits_ready(&self) -> bool {
        false
    }
}

/// Stand-in used when no audio backend could be started. Every play fails,
/// which the session surfaces as a status message.
#[derive(Debug, Default)]
pub struct NullEngine;

#[async_trait::async_trait]
impl AudioEngine for NullEngine {
    async fn set_source(&self, _uri: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn play(&self) -> anyhow::Result<()> {
        anyhow::bail!("no audio output available")
    }

    async fn pause(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn seek(&self, _seconds: f64) -> anyhow::Result<()> {
        Ok(())
    }

    async fn set_volume(&self, _volume_0_100: u8) -> anyhow::Result<()> {
        Ok(())
    }
}
