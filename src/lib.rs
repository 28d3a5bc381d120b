//! RTTTL (RingTone Text Transfer Language) decoding and playback.
//!
//! ```no_run
//! use rtttl_player::{CpalToneDriver, PlayerConfig, play};
//!
//! let mut speaker = CpalToneDriver::new()?;
//! play(&mut speaker, "Beep:d=8,o=5,b=120:c,e,g,c6", PlayerConfig::default())?;
//! # Ok::<(), rtttl_player::PlayError>(())
//! ```

pub mod error;
pub mod note;
pub mod parser;
pub mod scheduler;
pub mod synth;

pub use error::PlayError;
pub use note::{Header, NoteEvent, NoteToken, PitchClass, Timing};
pub use parser::{Events, Resolved, Rtttl};
pub use scheduler::{Delay, PlaybackReport, Player, PlayerConfig, ThreadDelay, ToneDriver, play};
pub use synth::CpalToneDriver;
