//! Drives a tone device through a song, one event at a time.
//!
//! Playback blocks the calling thread for the whole song: the device call
//! for each event returns at once and the player then waits out the
//! event's duration before asking the parser for the next token.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::error::PlayError;
use crate::note::{Header, NoteEvent};
use crate::parser::Rtttl;

/// Something that can make a sound.
pub trait ToneDriver {
    /// Start generating `frequency_hz`. Must not block for `duration_ms`.
    /// Never called with a frequency of 0.
    fn play_tone(&mut self, frequency_hz: u32, duration_ms: u32);

    /// Silence whatever is sounding.
    fn stop_tone(&mut self);
}

impl<T: ToneDriver + ?Sized> ToneDriver for &mut T {
    fn play_tone(&mut self, frequency_hz: u32, duration_ms: u32) {
        (**self).play_tone(frequency_hz, duration_ms)
    }

    fn stop_tone(&mut self) {
        (**self).stop_tone()
    }
}

/// Blocking wait between events.
pub trait Delay {
    fn delay_ms(&mut self, ms: u32);
}

/// Waits on the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Playback settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerConfig {
    /// Diagnostic detail, 0 (silent) to 5 (every note). Has no effect on
    /// what is played.
    pub verbosity: u8,
    /// Added to every note's octave before the frequency lookup.
    pub octave_offset: i8,
    /// Call `stop_tone` once the last event has been waited out. Off by
    /// default, so a final tone is left to the device's own timer.
    pub silence_at_end: bool,
}

impl PlayerConfig {
    pub const MAX_VERBOSITY: u8 = 5;

    fn logs(&self, level: u8) -> bool {
        level <= self.verbosity
    }
}

/// What happened during one call to [`Player::play`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackReport {
    pub name: String,
    pub header: Header,
    /// Events handed to the device, rests included.
    pub events: usize,
    /// Sum of all waited durations.
    pub elapsed_ms: u64,
    /// Faults that were skipped over: ignored header fields and notes
    /// played as rests because their octave is outside the table.
    pub warnings: Vec<PlayError>,
    /// Playback was stopped through the cancel flag.
    pub cancelled: bool,
}

/// Plays RTTTL songs on a [`ToneDriver`].
pub struct Player<D, W = ThreadDelay> {
    driver: D,
    delay: W,
    config: PlayerConfig,
    cancel: Option<Arc<AtomicBool>>,
}

impl<D: ToneDriver> Player<D> {
    pub fn new(driver: D, config: PlayerConfig) -> Self {
        Self {
            driver,
            delay: ThreadDelay,
            config,
            cancel: None,
        }
    }
}

impl<D: ToneDriver, W: Delay> Player<D, W> {
    /// Replace the wait between events.
    pub fn with_delay<W2: Delay>(self, delay: W2) -> Player<D, W2> {
        Player {
            driver: self.driver,
            delay,
            config: self.config,
            cancel: self.cancel,
        }
    }

    /// Check `flag` before every event and stop once it is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Play `song` from the start, blocking until it ends.
    ///
    /// Returns an error before touching the device if the song is empty,
    /// has no name delimiter, or has a bpm of 0. A note that cannot be
    /// decoded stops playback part way, after silencing the device.
    pub fn play(&mut self, song: &str) -> Result<PlaybackReport, PlayError> {
        let config = self.config;

        let rtttl = Rtttl::parse(song).inspect_err(|e| {
            if config.logs(1) {
                error!("rtttl_play: {}", e);
            }
        })?;

        if config.logs(3) {
            info!("rtttl_play: {}", song);
            info!("Song name: {}", rtttl.name);
        }
        if config.logs(5) {
            debug!("ddur: {}", rtttl.header.default_duration);
            debug!("doct: {}", rtttl.header.default_octave);
            debug!("bpm: {}", rtttl.header.bpm);
        }
        if config.logs(2) {
            for ignored in &rtttl.ignored {
                warn!("{}", ignored);
            }
        }

        let events = rtttl.events(config.octave_offset).inspect_err(|e| {
            if config.logs(1) {
                error!("rtttl_play: {}", e);
            }
        })?;
        if config.logs(5) {
            debug!("wn: {}", events.timing().wholenote_ms);
        }

        let mut report = PlaybackReport {
            name: rtttl.name.clone(),
            header: rtttl.header,
            events: 0,
            elapsed_ms: 0,
            warnings: rtttl.ignored.clone(),
            cancelled: false,
        };

        for resolved in events {
            if self.cancelled() {
                if config.logs(3) {
                    info!("rtttl_play: cancelled");
                }
                self.driver.stop_tone();
                report.cancelled = true;
                return Ok(report);
            }

            let (event, fault) = match resolved {
                Ok(resolved) => resolved,
                Err(e) => {
                    if config.logs(1) {
                        error!("rtttl_play: {}", e);
                    }
                    self.driver.stop_tone();
                    return Err(e);
                }
            };
            if let Some(fault) = fault {
                if config.logs(2) {
                    warn!("{}; resting instead", fault);
                }
                report.warnings.push(fault);
            }

            self.perform(&event);
            report.events += 1;
            report.elapsed_ms += u64::from(event.duration_ms);
        }

        if config.silence_at_end {
            self.driver.stop_tone();
        }
        if config.logs(3) {
            info!("rtttl_play: End song!");
        }
        Ok(report)
    }

    fn perform(&mut self, event: &NoteEvent) {
        if event.is_rest() {
            if self.config.logs(5) {
                debug!("Pausing: {}", event.duration_ms);
            }
            self.driver.stop_tone();
        } else {
            if self.config.logs(5) {
                debug!("Playing: {} ({} ms)", event.frequency_hz, event.duration_ms);
            }
            self.driver.play_tone(event.frequency_hz, event.duration_ms);
        }
        self.delay.delay_ms(event.duration_ms);
    }
}

/// Play `song` on `driver` with real-time pacing.
pub fn play<D: ToneDriver>(
    driver: &mut D,
    song: &str,
    config: PlayerConfig,
) -> Result<PlaybackReport, PlayError> {
    Player::new(driver, config).play(song)
}
