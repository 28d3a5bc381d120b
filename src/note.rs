use std::fmt;

use crate::error::PlayError;

/// Lowest octave present in [`NOTES`].
pub const TABLE_FIRST_OCTAVE: i32 = 4;

/// Standard pitch frequencies in Hz, rounded to whole Hz, for C4..B7.
/// Index 0 is the rest slot; note `n` of octave `o` sits at
/// `(o - 4) * 12 + n` with C = 1 through B = 12.
pub const NOTES: [u32; 49] = [
    0, //
    262, 277, 294, 311, 330, 349, 370, 392, 415, 440, 466, 494, // octave 4
    523, 554, 587, 622, 659, 698, 740, 784, 831, 880, 932, 988, // octave 5
    1047, 1109, 1175, 1245, 1319, 1397, 1480, 1568, 1661, 1760, 1865, 1976, // octave 6
    2093, 2217, 2349, 2489, 2637, 2794, 2960, 3136, 3322, 3520, 3729, 3951, // octave 7
];

/// Look up a frequency by octave and semitone class (0 = rest, C = 1 .. B = 12).
///
/// Rests are always 0 Hz. Returns `None` when the pitch falls outside the
/// table, which covers octaves 4 to 7 only.
pub fn frequency(octave: i32, semitone: u8) -> Option<u32> {
    if semitone == 0 {
        return Some(0);
    }
    if octave < TABLE_FIRST_OCTAVE {
        return None;
    }
    let index = (octave - TABLE_FIRST_OCTAVE) as usize * 12 + semitone as usize;
    NOTES.get(index).copied()
}

/// The letter part of a note token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PitchClass {
    Rest,
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl PitchClass {
    /// Decode a note letter. `p` and anything unrecognised are rests.
    pub fn from_letter(letter: u8) -> Self {
        match letter {
            b'c' => PitchClass::C,
            b'd' => PitchClass::D,
            b'e' => PitchClass::E,
            b'f' => PitchClass::F,
            b'g' => PitchClass::G,
            b'a' => PitchClass::A,
            b'b' => PitchClass::B,
            _ => PitchClass::Rest,
        }
    }

    /// Semitone class within the table (rest = 0, C = 1, B = 12)
    pub fn semitone(self) -> u8 {
        match self {
            PitchClass::Rest => 0,
            PitchClass::C => 1,
            PitchClass::D => 3,
            PitchClass::E => 5,
            PitchClass::F => 6,
            PitchClass::G => 8,
            PitchClass::A => 10,
            PitchClass::B => 12,
        }
    }
}

/// One decoded note token, before tempo and octave defaults are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteToken {
    /// Explicit duration denominator; `None` means the header default.
    pub duration: Option<u32>,
    pub pitch: PitchClass,
    pub sharp: bool,
    pub dotted: bool,
    /// Explicit octave digit; `None` means the header default.
    pub octave: Option<u8>,
    /// Byte offset of the token in the song text.
    pub position: usize,
}

impl NoteToken {
    pub fn is_rest(&self) -> bool {
        self.pitch == PitchClass::Rest
    }

    /// Semitone class with the sharp applied. A sharp never lifts a rest.
    pub fn semitone(&self) -> u8 {
        match self.pitch {
            PitchClass::Rest => 0,
            pitch if self.sharp => pitch.semitone() + 1,
            pitch => pitch.semitone(),
        }
    }
}

/// A concrete thing for the tone device to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// Zero for a rest.
    pub frequency_hz: u32,
    pub duration_ms: u32,
}

impl NoteEvent {
    pub fn tone(frequency_hz: u32, duration_ms: u32) -> Self {
        Self { frequency_hz, duration_ms }
    }

    pub fn rest(duration_ms: u32) -> Self {
        Self { frequency_hz: 0, duration_ms }
    }

    pub fn is_rest(&self) -> bool {
        self.frequency_hz == 0
    }
}

impl fmt::Display for NoteEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_rest() {
            write!(f, "rest {} ms", self.duration_ms)
        } else {
            write!(f, "{} Hz {} ms", self.frequency_hz, self.duration_ms)
        }
    }
}

/// Song defaults from the `d=N,o=N,b=NNN:` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub default_duration: u32,
    pub default_octave: u8,
    pub bpm: u32,
}

impl Header {
    pub const MIN_OCTAVE: u8 = 3;
    pub const MAX_OCTAVE: u8 = 7;
}

impl Default for Header {
    fn default() -> Self {
        Self {
            default_duration: 4,
            default_octave: 6,
            bpm: 63,
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "d={},o={},b={}",
            self.default_duration, self.default_octave, self.bpm
        )
    }
}

/// Tempo and octave context for turning tokens into events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Length of a whole note in milliseconds.
    pub wholenote_ms: u32,
    pub default_duration: u32,
    pub default_octave: u8,
    /// Added to every resolved octave before the table lookup.
    pub octave_offset: i8,
}

impl Timing {
    /// Derive timing from a header. A bpm of 0 (or a zero default
    /// duration on a hand-built header) would divide by zero, so both are
    /// rejected.
    pub fn new(header: &Header, octave_offset: i8) -> Result<Self, PlayError> {
        if header.bpm == 0 {
            return Err(PlayError::InvalidHeaderField { field: 'b', value: 0 });
        }
        if header.default_duration == 0 {
            return Err(PlayError::InvalidHeaderField { field: 'd', value: 0 });
        }
        Ok(Self {
            // 60 s * 1000 ms * 4 quarters
            wholenote_ms: 240_000 / header.bpm,
            default_duration: header.default_duration,
            default_octave: header.default_octave,
            octave_offset,
        })
    }

    /// Duration of a token in milliseconds, dot included.
    pub fn duration_ms(&self, token: &NoteToken) -> u32 {
        let base = self.wholenote_ms / token.duration.unwrap_or(self.default_duration);
        if token.dotted { base + base / 2 } else { base }
    }

    /// Octave a token plays in, after defaults and transposition.
    pub fn octave(&self, token: &NoteToken) -> i32 {
        i32::from(token.octave.unwrap_or(self.default_octave)) + i32::from(self.octave_offset)
    }

    /// Resolve a token to an event. Fails with `UnboundedOctaveIndex` when
    /// a pitched note lands outside the frequency table.
    pub fn event(&self, token: &NoteToken) -> Result<NoteEvent, PlayError> {
        let duration_ms = self.duration_ms(token);
        if token.is_rest() {
            return Ok(NoteEvent::rest(duration_ms));
        }
        let octave = self.octave(token);
        let frequency_hz = frequency(octave, token.semitone())
            .ok_or(PlayError::UnboundedOctaveIndex {
                octave,
                position: token.position,
            })?;
        Ok(NoteEvent::tone(frequency_hz, duration_ms))
    }
}
