//! RTTTL text decoding.
//!
//! A song looks like `name:d=4,o=5,b=63:c,8d#.6,p`. Everything is read
//! through a `Cursor` that only moves forward and never past the end of
//! the text.

use crate::error::PlayError;
use crate::note::{Header, NoteEvent, NoteToken, PitchClass, Timing};

/// Longest song name kept, in characters.
pub const MAX_NAME_LEN: usize = 31;

/// Forward-only read position over a song.
#[derive(Debug, Clone)]
struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str, pos: usize) -> Self {
        Self {
            text,
            pos: pos.min(text.len()),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + ahead).copied()
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Consume `b` if it is next.
    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Consume a run of decimal digits. `None` if there were none.
    /// Saturates instead of overflowing.
    fn number(&mut self) -> Option<u32> {
        let start = self.pos;
        let mut value: u32 = 0;
        while let Some(b) = self.peek().filter(u8::is_ascii_digit) {
            value = value.saturating_mul(10).saturating_add(u32::from(b - b'0'));
            self.pos += 1;
        }
        (self.pos > start).then_some(value)
    }

    /// Consume a single decimal digit.
    fn digit(&mut self) -> Option<u8> {
        let d = self.peek().filter(u8::is_ascii_digit)?;
        self.pos += 1;
        Some(d - b'0')
    }

    fn unexpected(&self) -> PlayError {
        PlayError::UnexpectedCharacter {
            found: self.text[self.pos..].chars().next(),
            position: self.pos,
        }
    }
}

/// Split the song name off the front of `text`.
///
/// Returns the name, cut to [`MAX_NAME_LEN`] characters, and the byte
/// offset just past the `:` that ends it.
pub fn split_name(text: &str) -> Result<(String, usize), PlayError> {
    let colon = text
        .bytes()
        .position(|b| b == b':')
        .ok_or(PlayError::MalformedSong { len: text.len() })?;
    let name = text[..colon].chars().take(MAX_NAME_LEN).collect();
    Ok((name, colon + 1))
}

/// What the header section produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedHeader {
    pub header: Header,
    /// Fields that were present but ignored.
    pub ignored: Vec<PlayError>,
    /// Byte offset of the first note token.
    pub end: usize,
}

/// Parse the optional `d=N,o=N,b=NNN:` section starting at byte `start`.
///
/// Fields are separated by `,` and the section ends at `:`. Any of them may
/// be missing, including the whole section, in which case `end == start`.
/// A `d=` of 0 or an `o=` outside 3..=7 is ignored and recorded. `b=` is
/// taken as given; a zero bpm is caught when timing is derived.
pub fn parse_header(text: &str, start: usize) -> ParsedHeader {
    let mut cursor = Cursor::new(text, start);
    let mut header = Header::default();
    let mut ignored = Vec::new();

    let mut look = cursor.clone();
    look.skip_spaces();
    if look.eat(b':') {
        // empty header section, as in "name::c,d"
        return ParsedHeader {
            header,
            ignored,
            end: look.pos,
        };
    }

    loop {
        let mut look = cursor.clone();
        look.skip_spaces();
        let field = match (look.peek(), look.peek_at(1)) {
            (Some(f @ (b'd' | b'o' | b'b')), Some(b'=')) => f,
            _ => break,
        };
        look.pos += 2;
        look.skip_spaces();
        let value = look.number().unwrap_or(0);
        cursor = look;

        match field {
            b'd' if value > 0 => header.default_duration = value,
            b'o' if (u32::from(Header::MIN_OCTAVE)..=u32::from(Header::MAX_OCTAVE))
                .contains(&value) =>
            {
                header.default_octave = value as u8
            }
            b'b' => header.bpm = value,
            f => ignored.push(PlayError::InvalidHeaderField {
                field: char::from(f),
                value,
            }),
        }

        cursor.skip_spaces();
        if cursor.eat(b':') {
            break;
        }
        if !cursor.eat(b',') {
            break;
        }
    }

    ParsedHeader {
        header,
        ignored,
        end: cursor.pos,
    }
}

/// A song split into name, header and note section.
///
/// Parsing the note section is lazy: every call to [`Rtttl::tokens`]
/// starts again from the first note, so the same song can be played any
/// number of times.
#[derive(Debug, Clone)]
pub struct Rtttl<'a> {
    text: &'a str,
    pub name: String,
    pub header: Header,
    /// Header fields that were present but out of range.
    pub ignored: Vec<PlayError>,
    body: usize,
}

impl<'a> Rtttl<'a> {
    pub fn parse(text: &'a str) -> Result<Self, PlayError> {
        if text.trim().is_empty() {
            return Err(PlayError::MissingInput);
        }
        let (name, after_name) = split_name(text)?;
        let ParsedHeader {
            header,
            ignored,
            end,
        } = parse_header(text, after_name);
        Ok(Self {
            text,
            name,
            header,
            ignored,
            body: end,
        })
    }

    /// The note section as written.
    pub fn notes_text(&self) -> &'a str {
        &self.text[self.body..]
    }

    /// A fresh pass over the note tokens.
    pub fn tokens(&self) -> Tokens<'a> {
        Tokens {
            cursor: Cursor::new(self.text, self.body),
            failed: false,
        }
    }

    /// A fresh pass over the resolved events.
    ///
    /// A note outside the frequency table comes out as a rest of the same
    /// length, paired with the `UnboundedOctaveIndex` fault, and the pass
    /// carries on. Decoding errors end the pass.
    pub fn events(&self, octave_offset: i8) -> Result<Events<'a>, PlayError> {
        Ok(Events {
            tokens: self.tokens(),
            timing: Timing::new(&self.header, octave_offset)?,
            failed: false,
        })
    }
}

/// Iterator over note tokens. Stops after the first decoding error.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    cursor: Cursor<'a>,
    failed: bool,
}

impl Tokens<'_> {
    fn next_token(&mut self) -> Result<NoteToken, PlayError> {
        let cursor = &mut self.cursor;
        let position = cursor.pos;

        let duration = cursor.number().filter(|&n| n > 0);

        let pitch = match cursor.peek() {
            Some(letter) if letter.is_ascii_alphabetic() => {
                cursor.pos += 1;
                PitchClass::from_letter(letter)
            }
            _ => return Err(cursor.unexpected()),
        };

        let sharp = cursor.eat(b'#');
        let mut dotted = cursor.eat(b'.');
        let octave = cursor.digit();
        // "c6." is as common in the wild as "c.6"
        if !dotted {
            dotted = cursor.eat(b'.');
        }

        cursor.skip_spaces();
        if !cursor.eat(b',') && !cursor.is_at_end() {
            return Err(cursor.unexpected());
        }

        Ok(NoteToken {
            duration,
            pitch,
            sharp,
            dotted,
            octave,
            position,
        })
    }
}

impl Iterator for Tokens<'_> {
    type Item = Result<NoteToken, PlayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        self.cursor.skip_spaces();
        if self.cursor.is_at_end() {
            return None;
        }
        let token = self.next_token();
        self.failed = token.is_err();
        Some(token)
    }
}

/// An event and, when the note had to be replaced by a rest, why.
pub type Resolved = (NoteEvent, Option<PlayError>);

/// Iterator over resolved events. Stops after the first fatal error.
#[derive(Debug, Clone)]
pub struct Events<'a> {
    tokens: Tokens<'a>,
    timing: Timing,
    failed: bool,
}

impl Events<'_> {
    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    fn resolve(&self, token: &NoteToken) -> Result<Resolved, PlayError> {
        let duration_ms = self.timing.duration_ms(token);
        if duration_ms == 0 {
            return Err(PlayError::DurationTooShort {
                denominator: token.duration.unwrap_or(self.timing.default_duration),
                position: token.position,
            });
        }
        match self.timing.event(token) {
            Ok(event) => Ok((event, None)),
            Err(fault) => Ok((NoteEvent::rest(duration_ms), Some(fault))),
        }
    }
}

impl Iterator for Events<'_> {
    type Item = Result<Resolved, PlayError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let resolved = self.tokens.next()?.and_then(|t| self.resolve(&t));
        self.failed = resolved.is_err();
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::note::frequency;

    fn tokens(text: &str) -> Vec<NoteToken> {
        Rtttl::parse(text)
            .unwrap()
            .tokens()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_split_name() {
        let (name, pos) = split_name("Simpsons:d=4").unwrap();
        assert_eq!(name, "Simpsons");
        assert_eq!(pos, 9);
    }

    #[test]
    fn test_empty_name() {
        assert_eq!(split_name(":c").unwrap(), (String::new(), 1));
    }

    #[test]
    fn test_long_name_truncated() {
        let text = format!("{}:c", "x".repeat(40));
        let (name, pos) = split_name(&text).unwrap();
        assert_eq!(name.len(), MAX_NAME_LEN);
        assert_eq!(pos, 41);
    }

    #[test]
    fn test_missing_colon() {
        assert_eq!(
            split_name("no delimiter here"),
            Err(PlayError::MalformedSong { len: 17 })
        );
        assert!(matches!(
            Rtttl::parse("abc"),
            Err(PlayError::MalformedSong { .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(Rtttl::parse("").unwrap_err(), PlayError::MissingInput);
        assert_eq!(Rtttl::parse("  \n").unwrap_err(), PlayError::MissingInput);
    }

    #[test]
    fn test_full_header() {
        let parsed = parse_header("d=8,o=5,b=112:c", 0);
        assert_eq!(
            parsed.header,
            Header {
                default_duration: 8,
                default_octave: 5,
                bpm: 112
            }
        );
        assert_eq!(parsed.end, 14);
        assert!(parsed.ignored.is_empty());
    }

    #[test]
    fn test_header_reserialises() {
        for text in ["d=4,o=5,b=63:", "d=16,o=7,b=200:", "d=1,o=3,b=1:"] {
            let parsed = parse_header(text, 0);
            assert_eq!(format!("{}:", parsed.header), text);
            assert_eq!(parsed.end, text.len());
        }
    }

    #[test]
    fn test_header_missing_fields() {
        // only bpm
        let parsed = parse_header("b=100:c", 0);
        assert_eq!(parsed.header.default_duration, 4);
        assert_eq!(parsed.header.default_octave, 6);
        assert_eq!(parsed.header.bpm, 100);
        assert_eq!(parsed.end, 6);

        // no bpm; the colon still ends the header
        let parsed = parse_header("d=8,o=5:c", 0);
        assert_eq!(parsed.header.bpm, 63);
        assert_eq!(parsed.end, 8);
    }

    #[test]
    fn test_no_header_leaves_cursor_on_first_note() {
        let parsed = parse_header("d,e,f", 0);
        assert_eq!(parsed.header, Header::default());
        assert_eq!(parsed.end, 0);

        let song = Rtttl::parse("tune:d,e,f").unwrap();
        assert_eq!(song.notes_text(), "d,e,f");
        assert_eq!(song.tokens().count(), 3);
    }

    #[test]
    fn test_empty_header_section() {
        let song = Rtttl::parse("tune::c,d").unwrap();
        assert_eq!(song.header, Header::default());
        assert_eq!(song.notes_text(), "c,d");
    }

    #[test]
    fn test_header_out_of_range_ignored() {
        let parsed = parse_header("d=0,o=9,b=90:", 0);
        assert_eq!(parsed.header.default_duration, 4);
        assert_eq!(parsed.header.default_octave, 6);
        assert_eq!(parsed.header.bpm, 90);
        assert_eq!(
            parsed.ignored,
            vec![
                PlayError::InvalidHeaderField { field: 'd', value: 0 },
                PlayError::InvalidHeaderField { field: 'o', value: 9 },
            ]
        );
    }

    #[test]
    fn test_header_zero_bpm_kept() {
        let parsed = parse_header("b=0:", 0);
        assert_eq!(parsed.header.bpm, 0);
        assert!(parsed.ignored.is_empty());
    }

    #[test]
    fn test_header_with_spaces() {
        let song = Rtttl::parse("Tune: d=8, o=5, b=125: c,e").unwrap();
        assert_eq!(song.header.default_duration, 8);
        assert_eq!(song.header.default_octave, 5);
        assert_eq!(song.header.bpm, 125);
        assert_eq!(song.tokens().count(), 2);
    }

    #[test]
    fn test_token_grammar() {
        let t = tokens("x:16g#.5");
        assert_eq!(
            t,
            vec![NoteToken {
                duration: Some(16),
                pitch: PitchClass::G,
                sharp: true,
                dotted: true,
                octave: Some(5),
                position: 2,
            }]
        );
    }

    #[test]
    fn test_dot_after_octave() {
        let t = tokens("x:8c6.,d");
        assert!(t[0].dotted);
        assert_eq!(t[0].octave, Some(6));
        assert!(!t[1].dotted);
    }

    #[test]
    fn test_zero_duration_means_default() {
        let t = tokens("x:0c");
        assert_eq!(t[0].duration, None);
    }

    #[test]
    fn test_rest_consumes_suffixes() {
        let song = Rtttl::parse("x:d=4,o=5,b=63:p#.6,c").unwrap();
        let events: Vec<_> = song.events(0).unwrap().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], Ok((NoteEvent::rest(1428), None)));
        assert!(!events[1].as_ref().unwrap().0.is_rest());
    }

    #[test]
    fn test_default_octave_matches_explicit() {
        let song = Rtttl::parse("x:o=6:c,c6").unwrap();
        let events: Vec<_> = song.events(0).unwrap().collect();
        assert_eq!(events[0], events[1]);
        assert_eq!(
            events[0],
            Ok((NoteEvent::tone(frequency(6, 1).unwrap(), 952), None))
        );
    }

    #[test]
    fn test_trailing_comma_and_whitespace() {
        assert_eq!(tokens("x:c, d ,e,").len(), 3);
    }

    #[test]
    fn test_missing_letter_fails() {
        let song = Rtttl::parse("x:c,8").unwrap();
        let results: Vec<_> = song.tokens().collect();
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[1],
            Err(PlayError::UnexpectedCharacter {
                found: None,
                position: 5
            })
        );
    }

    #[test]
    fn test_junk_after_token_stops_iteration() {
        let song = Rtttl::parse("x:c!,d,e").unwrap();
        let results: Vec<_> = song.tokens().collect();
        assert_eq!(
            results,
            vec![Err(PlayError::UnexpectedCharacter {
                found: Some('!'),
                position: 3
            })]
        );
    }

    #[test]
    fn test_tokens_restart() {
        let song = Rtttl::parse("x:b=120:c,d,e").unwrap();
        let first: Vec<_> = song.events(0).unwrap().collect();
        let second: Vec<_> = song.events(0).unwrap().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn test_octave_fault_does_not_end_pass() {
        let song = Rtttl::parse("x:o=3:c,p,c5").unwrap();
        let events: Vec<_> = song.events(0).unwrap().collect();
        assert_eq!(
            events[0],
            Ok((
                NoteEvent::rest(952),
                Some(PlayError::UnboundedOctaveIndex { octave: 3, position: 6 })
            ))
        );
        assert_eq!(events[1], Ok((NoteEvent::rest(952), None)));
        assert!(matches!(events[2], Ok((_, None))));
    }

    #[test]
    fn test_denominator_longer_than_whole_note_fails() {
        let song = Rtttl::parse("x:c,99999999999c,d").unwrap();
        let events: Vec<_> = song.events(0).unwrap().collect();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            Err(PlayError::DurationTooShort {
                denominator: u32::MAX,
                position: 4
            })
        );

        // 240000 / 63 = 3809, so 3809 still yields 1 ms
        let song = Rtttl::parse("x:3809c,3810c").unwrap();
        let events: Vec<_> = song.events(0).unwrap().collect();
        assert!(matches!(events[0], Ok((NoteEvent { duration_ms: 1, .. }, None))));
        assert!(matches!(events[1], Err(PlayError::DurationTooShort { denominator: 3810, .. })));
    }
}
