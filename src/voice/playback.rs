//! Audio playback to the host output device

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::PLAYBACK_SAMPLE_RATE;
use crate::{Error, Result};

/// How often the blocking player checks its stream flags
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Plays mono samples to the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
}

impl AudioPlayback {
    /// Open the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no output device supports the playback rate
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self { device, config })
    }

    /// Play samples, blocking until they have drained or `cancel` is set
    ///
    /// A cancelled playback stops the stream within one poll interval and
    /// returns `Ok`.
    ///
    /// # Errors
    ///
    /// Returns error if the stream cannot be built or started, or if the
    /// device reports an error mid-stream
    pub fn play_blocking(&self, samples: Vec<f32>, cancel: &AtomicBool) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let channels = usize::from(self.config.channels);
        let sample_count = samples.len();

        let samples: Arc<[f32]> = Arc::from(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let failed = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);
            let failed = Arc::clone(&failed);

            self.device
                .build_output_stream(
                    &self.config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let mut pos = position.load(Ordering::Relaxed);

                        for frame in data.chunks_mut(channels) {
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Release);
                                0.0
                            });

                            frame.fill(sample);

                            if pos < samples.len() {
                                pos += 1;
                            }
                        }

                        position.store(pos, Ordering::Relaxed);
                    },
                    move |err| {
                        tracing::error!(error = %err, "audio playback error");
                        failed.store(true, Ordering::Release);
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);

        // Margin over the clip length before giving up on the drain signal
        let limit = Duration::from_millis(duration_ms + 500);
        let outcome = wait_for_drain(&finished, &failed, cancel, limit);

        if matches!(outcome, Ok(Drain::Finished)) {
            // Small delay to ensure audio finishes
            std::thread::sleep(Duration::from_millis(100));
        }

        drop(stream);

        match outcome? {
            Drain::Cancelled => tracing::debug!(samples = sample_count, "playback cancelled"),
            Drain::Finished | Drain::Expired => {
                tracing::debug!(samples = sample_count, "playback complete");
            }
        }

        Ok(())
    }
}

/// How a playback poll loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drain {
    Finished,
    Cancelled,
    Expired,
}

/// Poll the stream flags until drained, cancelled, failed, or past `limit`
fn wait_for_drain(
    finished: &AtomicBool,
    failed: &AtomicBool,
    cancel: &AtomicBool,
    limit: Duration,
) -> Result<Drain> {
    let start = Instant::now();

    loop {
        if failed.load(Ordering::Acquire) {
            return Err(Error::Playback("output stream failed".to_string()));
        }
        if cancel.load(Ordering::Acquire) {
            return Ok(Drain::Cancelled);
        }
        if finished.load(Ordering::Acquire) {
            return Ok(Drain::Finished);
        }
        if start.elapsed() > limit {
            return Ok(Drain::Expired);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
