//! Fixed-cadence render loop with idle auto-cycling

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::mailbox::MailboxConsumer;
use super::shutdown::RunFlag;
use crate::channel::ChannelRegistry;
use crate::display::DisplaySink;
use crate::{DisplayError, PipelineConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacer {
    interval: Duration,
    auto_cycle: Option<Duration>,
}

impl Pacer {
    pub fn new(interval: Duration, auto_cycle: Option<Duration>) -> Self {
        Self {
            interval,
            auto_cycle,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn auto_cycle(&self) -> Option<Duration> {
        self.auto_cycle
    }

    /// Budget left in the iteration that began at `started`, floored at zero
    pub fn remaining(&self, started: Instant, now: Instant) -> Duration {
        self.interval
            .saturating_sub(now.saturating_duration_since(started))
    }
}

impl From<&PipelineConfig> for Pacer {
    fn from(config: &PipelineConfig) -> Self {
        Self::new(config.frame_interval(), config.auto_cycle())
    }
}

/// Sole consumer of the frame mailbox and sole writer to the display.
pub struct RenderLoop<D> {
    sink: D,
    mailbox: MailboxConsumer,
    registry: Arc<ChannelRegistry>,
    pacer: Pacer,
    run: RunFlag,
}

impl<D: DisplaySink> RenderLoop<D> {
    pub fn new(
        sink: D,
        mailbox: MailboxConsumer,
        registry: Arc<ChannelRegistry>,
        pacer: Pacer,
        run: RunFlag,
    ) -> Self {
        Self {
            sink,
            mailbox,
            registry,
            pacer,
            run,
        }
    }

    /// One iteration: rotate the channel if idle, then show the pending
    /// frame, if any. Returns whether a frame was written.
    pub fn tick(&mut self, now: Instant) -> Result<bool, DisplayError> {
        if let Some(threshold) = self.pacer.auto_cycle {
            self.registry.advance_if_idle(now, threshold);
        }

        let Some(frame) = self.mailbox.take() else {
            return Ok(false);
        };
        self.sink.write(&frame.data)?;

        metrics::counter!("frames_displayed").increment(1);
        metrics::histogram!("frame_latency_ms")
            .record(frame.timestamp.elapsed().as_secs_f64() * 1000.0);
        Ok(true)
    }

    /// Run until stopped or the display goes away, then blank the display.
    /// Returns the number of frames shown.
    pub async fn run(mut self) -> u64 {
        info!(
            "Render loop at {:.1} fps",
            1.0 / self.pacer.interval.as_secs_f64().max(f64::EPSILON)
        );
        let mut displayed = 0u64;

        while self.run.is_running() {
            let started = Instant::now();
            match self.tick(started) {
                Ok(true) => displayed += 1,
                Ok(false) => {}
                Err(DisplayError::Closed) => {
                    info!("Display closed");
                    break;
                }
                Err(e) => warn!("Display write failed: {}", e),
            }

            let wait = self.pacer.remaining(started, Instant::now());
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.run.stopped() => break,
            }
        }

        let stats = self.mailbox.stats();
        debug!(
            "Mailbox: {} written, {} read, {} skipped",
            stats.written, stats.read, stats.skipped
        );
        if let Err(e) = self.sink.blank() {
            warn!("Failed to blank display: {}", e);
        }
        info!("Render loop stopped after {} frames", displayed);
        displayed
    }
}
