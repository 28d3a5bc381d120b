use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc;

use crate::error::PlayError;
use crate::scheduler::ToneDriver;

/// Output level of the generated tone.
const VOLUME: f64 = 0.3;

/// A command sent to the audio thread
enum ToneCommand {
    /// Sound a frequency for a number of milliseconds, then fall silent
    Play { freq: u32, duration_ms: u32 },
    /// Silence immediately
    Stop,
}

/// A [`ToneDriver`] on the default audio output.
///
/// Like a hardware tone pin, `play_tone` returns immediately and the tone
/// stops on its own after its duration.
pub struct CpalToneDriver {
    cmd_tx: mpsc::Sender<ToneCommand>,
    // dropping the stream stops audio, so it lives as long as the driver
    _stream: cpal::Stream,
}

impl CpalToneDriver {
    /// Open the default output device and start a silent stream.
    pub fn new() -> Result<Self, PlayError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| PlayError::Device("no output audio device available".into()))?;

        let config = device
            .default_output_config()
            .map_err(|e| PlayError::Device(format!("failed to get default output config: {}", e)))?;

        let sample_rate = config.sample_rate() as f64;
        let channels = usize::from(config.channels()).max(1);

        let (cmd_tx, cmd_rx) = mpsc::channel::<ToneCommand>();

        // Audio generation state
        let mut phase: f64 = 0.0;
        let mut freq: f64 = 0.0;
        let mut frames_remaining: usize = 0;

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Check for new commands (non-blocking)
                    while let Ok(cmd) = cmd_rx.try_recv() {
                        match cmd {
                            ToneCommand::Play { freq: f, duration_ms } => {
                                freq = f64::from(f);
                                frames_remaining =
                                    (f64::from(duration_ms) / 1000.0 * sample_rate) as usize;
                                phase = 0.0;
                            }
                            ToneCommand::Stop => {
                                frames_remaining = 0;
                            }
                        }
                    }

                    for frame in data.chunks_mut(channels) {
                        let value = if frames_remaining > 0 {
                            let v = (phase * freq * 2.0 * std::f64::consts::PI / sample_rate).sin();
                            phase += 1.0;
                            frames_remaining -= 1;
                            (v * VOLUME) as f32
                        } else {
                            0.0
                        };
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                move |err| {
                    tracing::error!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| PlayError::Device(format!("failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| PlayError::Device(format!("failed to play stream: {}", e)))?;

        Ok(Self {
            cmd_tx,
            _stream: stream,
        })
    }

    fn send(&self, cmd: ToneCommand) {
        // the callback only goes away with the stream, which we own
        if self.cmd_tx.send(cmd).is_err() {
            tracing::warn!("audio thread disconnected");
        }
    }
}

impl ToneDriver for CpalToneDriver {
    fn play_tone(&mut self, frequency_hz: u32, duration_ms: u32) {
        self.send(ToneCommand::Play {
            freq: frequency_hz,
            duration_ms,
        });
    }

    fn stop_tone(&mut self) {
        self.send(ToneCommand::Stop);
    }
}

impl Drop for CpalToneDriver {
    fn drop(&mut self) {
        self.send(ToneCommand::Stop);
    }
}
