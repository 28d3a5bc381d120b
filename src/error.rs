//! Error type shared by the parser and the player.

use thiserror::Error;

/// Everything that can go wrong between receiving song text and driving
/// the tone device.
///
/// Out-of-range `d=`/`o=` header fields and `UnboundedOctaveIndex` only
/// ever show up in
/// [`PlaybackReport::warnings`](crate::scheduler::PlaybackReport); playback
/// goes on around them. Anything returned as an `Err` has stopped it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlayError {
    /// No song text was supplied.
    #[error("no song defined")]
    MissingInput,

    /// The name section is not terminated by `:`.
    #[error("song name is not terminated by ':' within {len} bytes")]
    MalformedSong { len: usize },

    /// A header field carried a value outside its valid range.
    #[error("header field {field}={value} is out of range")]
    InvalidHeaderField { field: char, value: u32 },

    /// A note resolved to an octave the frequency table does not cover.
    #[error("note at byte {position} resolves to octave {octave}, outside the table")]
    UnboundedOctaveIndex { octave: i32, position: usize },

    /// A note's denominator makes it shorter than a millisecond.
    #[error("note at byte {position} with duration 1/{denominator} is shorter than 1 ms")]
    DurationTooShort { denominator: u32, position: usize },

    /// A note token could not be decoded. `found` is `None` at end of text.
    #[error("unexpected {} at byte {position}", describe(.found))]
    UnexpectedCharacter { found: Option<char>, position: usize },

    /// The song file could not be read.
    #[error("reading {path}: {message}")]
    Read { path: String, message: String },

    /// The audio back end could not be opened or started.
    #[error("audio device: {0}")]
    Device(String),
}

fn describe(found: &Option<char>) -> String {
    match found {
        Some(c) => format!("{:?}", c),
        None => "end of song".to_string(),
    }
}
