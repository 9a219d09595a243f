//! Escape-sequence decoder
//!
//! A resumable byte-at-a-time state machine: feed it any slicing of the
//! input stream and it produces the same events, carrying partial escape
//! sequences and partial UTF-8 scalars across chunk boundaries. Sequences
//! the dispatch tables do not recognize surface as generic fallback events
//! instead of being dropped.

mod event;
mod tables;

pub use event::{
    AttrOp, ControlOp, CursorOp, DeviceOp, EditOp, EraseExtent, Event, ModeOp, PaletteOp,
    ScreenOp, SystemOp,
};

use std::collections::HashMap;

use tracing::trace;

use tables::{control_event, csi_table, dispatch_csi, esc_dispatch, osc_dispatch, EscOutcome, Node};

const MAX_PARAMS: usize = 32;
const MAX_OSC: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Ground,
    Escape,
    /// Discarding the designation byte of a charset sequence.
    EscapeCharset,
    Csi,
    Osc,
    /// Saw ESC inside an OSC string; `\` completes the terminator.
    OscEsc,
    /// DCS/SOS/PM/APC string: consumed and discarded.
    IgnoreString,
    IgnoreStringEsc,
    Utf8,
}

/// Resumable decoder from bytes to [`Event`]s.
pub struct SequenceDecoder {
    state: State,
    table: HashMap<&'static str, Node>,

    params: Vec<u32>,
    cur_param: u32,
    cur_digits: bool,
    marker: Option<char>,
    has_intermediates: bool,

    osc: Vec<u8>,
    osc_overflow: bool,

    utf8: [u8; 6],
    utf8_len: usize,
    utf8_need: usize,
}

impl Default for SequenceDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceDecoder {
    pub fn new() -> Self {
        Self {
            state: State::Ground,
            table: csi_table(),
            params: Vec::new(),
            cur_param: 0,
            cur_digits: false,
            marker: None,
            has_intermediates: false,
            osc: Vec::new(),
            osc_overflow: false,
            utf8: [0; 6],
            utf8_len: 0,
            utf8_need: 0,
        }
    }

    /// Decode a chunk. Partial sequences stay pending until later chunks
    /// complete them.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Event> {
        let mut out = Vec::new();
        for &b in bytes {
            self.step(b, &mut out);
        }
        out
    }

    /// Drop any partially accumulated sequence and return to ground.
    pub fn reset(&mut self) {
        self.state = State::Ground;
        self.clear_csi();
        self.osc.clear();
        self.osc_overflow = false;
        self.utf8_len = 0;
        self.utf8_need = 0;
    }

    fn clear_csi(&mut self) {
        self.params.clear();
        self.cur_param = 0;
        self.cur_digits = false;
        self.marker = None;
        self.has_intermediates = false;
    }

    fn step(&mut self, b: u8, out: &mut Vec<Event>) {
        match self.state {
            State::Ground => self.ground(b, out),
            State::Escape => self.escape(b, out),
            State::EscapeCharset => {
                // The designation byte; the whole sequence is ignored.
                self.state = State::Ground;
            }
            State::Csi => self.csi(b, out),
            State::Osc => self.osc(b, out),
            State::OscEsc => self.osc_esc(b, out),
            State::IgnoreString => match b {
                0x07 | 0x18 | 0x1a => self.state = State::Ground,
                0x1b => self.state = State::IgnoreStringEsc,
                _ => {}
            },
            State::IgnoreStringEsc => {
                if b == b'\\' {
                    self.state = State::Ground;
                } else {
                    self.state = State::Escape;
                    self.step(b, out);
                }
            }
            State::Utf8 => self.utf8(b, out),
        }
    }

    fn ground(&mut self, b: u8, out: &mut Vec<Event>) {
        match b {
            0x1b => {
                self.state = State::Escape;
            }
            0x00..=0x1f => match control_event(b) {
                Some(event) => out.push(event),
                None => out.push(Event::UnknownControl(b)),
            },
            0x20..=0x7e => out.push(Event::Print(b as char)),
            0x7f => out.push(Event::UnknownControl(b)),
            _ => {
                let need = match b {
                    0xc0..=0xdf => 2,
                    0xe0..=0xef => 3,
                    0xf0..=0xf7 => 4,
                    0xf8..=0xfb => 5,
                    0xfc..=0xfd => 6,
                    // Stray continuation byte or 0xfe/0xff.
                    _ => {
                        out.push(Event::Print('\u{fffd}'));
                        return;
                    }
                };
                self.utf8[0] = b;
                self.utf8_len = 1;
                self.utf8_need = need;
                self.state = State::Utf8;
            }
        }
    }

    fn utf8(&mut self, b: u8, out: &mut Vec<Event>) {
        if !(0x80..=0xbf).contains(&b) {
            // The scalar ended early; the stored prefix is invalid.
            out.push(Event::Print('\u{fffd}'));
            self.state = State::Ground;
            self.step(b, out);
            return;
        }
        self.utf8[self.utf8_len] = b;
        self.utf8_len += 1;
        if self.utf8_len < self.utf8_need {
            return;
        }
        let ch = match std::str::from_utf8(&self.utf8[..self.utf8_len]) {
            Ok(s) => s.chars().next().unwrap_or('\u{fffd}'),
            // Overlong forms and the 5/6-byte lead shapes land here.
            Err(_) => '\u{fffd}',
        };
        out.push(Event::Print(ch));
        self.state = State::Ground;
    }

    fn escape(&mut self, b: u8, out: &mut Vec<Event>) {
        match b {
            b'[' => {
                self.clear_csi();
                self.state = State::Csi;
            }
            b']' => {
                self.osc.clear();
                self.osc_overflow = false;
                self.state = State::Osc;
            }
            b'P' | b'X' | b'^' | b'_' => self.state = State::IgnoreString,
            0x18 | 0x1a => self.state = State::Ground,
            0x1b => {}
            _ => {
                self.state = State::Ground;
                match esc_dispatch(b) {
                    EscOutcome::Event(event) => out.push(event),
                    EscOutcome::Charset => self.state = State::EscapeCharset,
                    EscOutcome::Unknown(c) => {
                        trace!(final_byte = %c, "unhandled escape sequence");
                        out.push(Event::Esc(c));
                    }
                }
            }
        }
    }

    fn push_param(&mut self) {
        if self.params.len() < MAX_PARAMS {
            self.params.push(self.cur_param);
        }
        self.cur_param = 0;
        self.cur_digits = false;
    }

    fn csi(&mut self, b: u8, out: &mut Vec<Event>) {
        match b {
            b'0'..=b'9' => {
                self.cur_param = self
                    .cur_param
                    .saturating_mul(10)
                    .saturating_add((b - b'0') as u32);
                self.cur_digits = true;
            }
            b';' | b':' => self.push_param(),
            b'<' | b'=' | b'>' | b'?' => {
                if self.params.is_empty() && !self.cur_digits && self.marker.is_none() {
                    self.marker = Some(b as char);
                } else {
                    self.has_intermediates = true;
                }
            }
            0x20..=0x2f => self.has_intermediates = true,
            0x40..=0x7e => {
                if self.cur_digits {
                    self.push_param();
                } else if !self.params.is_empty() {
                    // Trailing empty parameter after a separator.
                    self.params.push(0);
                }
                self.finish_csi(b as char, out);
                self.state = State::Ground;
            }
            0x18 | 0x1a => {
                self.state = State::Ground;
            }
            0x1b => {
                self.state = State::Escape;
            }
            // Other C0 bytes inside a sequence are noise here.
            _ => {}
        }
    }

    fn finish_csi(&mut self, final_byte: char, out: &mut Vec<Event>) {
        let fallback = |this: &Self| Event::Csi {
            params: this.params.clone(),
            marker: this.marker,
            final_byte,
        };

        if self.has_intermediates {
            trace!(%final_byte, "CSI with intermediates, falling back");
            out.push(fallback(self));
            return;
        }

        let mut key = String::with_capacity(2);
        if let Some(m) = self.marker {
            key.push(m);
        }
        key.push(final_byte);

        match dispatch_csi(&self.table, &key, &self.params) {
            Some(events) if !events.is_empty() => out.extend(events),
            _ => {
                trace!(%final_byte, params = ?self.params, "unhandled CSI sequence");
                out.push(fallback(self));
            }
        }
    }

    fn osc(&mut self, b: u8, out: &mut Vec<Event>) {
        match b {
            0x07 => {
                self.finish_osc(out);
                self.state = State::Ground;
            }
            0x1b => self.state = State::OscEsc,
            0x18 | 0x1a => {
                self.osc.clear();
                self.state = State::Ground;
            }
            _ => {
                if self.osc.len() < MAX_OSC {
                    self.osc.push(b);
                } else {
                    self.osc_overflow = true;
                }
            }
        }
    }

    fn osc_esc(&mut self, b: u8, out: &mut Vec<Event>) {
        if b == b'\\' {
            self.finish_osc(out);
            self.state = State::Ground;
        } else {
            // Not a terminator: the OSC is abandoned and the ESC starts a
            // new sequence.
            self.osc.clear();
            self.state = State::Escape;
            self.step(b, out);
        }
    }

    fn finish_osc(&mut self, out: &mut Vec<Event>) {
        let raw = std::mem::take(&mut self.osc);
        if self.osc_overflow {
            self.osc_overflow = false;
            trace!("oversized OSC string dropped");
            return;
        }
        let text = String::from_utf8_lossy(&raw);
        let parts: Vec<&str> = text.split(';').collect();
        let events = osc_dispatch(&parts);
        if events.is_empty() {
            trace!(code = parts.first().copied().unwrap_or(""), "unhandled OSC");
            out.push(Event::Osc(parts.iter().map(|s| s.to_string()).collect()));
        } else {
            out.extend(events);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<Event> {
        SequenceDecoder::new().feed(bytes)
    }

    #[test]
    fn plain_text_prints() {
        assert_eq!(
            decode(b"hi"),
            vec![Event::Print('h'), Event::Print('i')]
        );
    }

    #[test]
    fn c0_controls() {
        assert_eq!(
            decode(b"a\x07\n"),
            vec![
                Event::Print('a'),
                Event::Control(ControlOp::Bell),
                Event::Control(ControlOp::LineFeed),
            ]
        );
        assert_eq!(decode(&[0x01]), vec![Event::UnknownControl(0x01)]);
    }

    #[test]
    fn utf8_scalars() {
        assert_eq!(decode("é".as_bytes()), vec![Event::Print('é')]);
        assert_eq!(decode("世".as_bytes()), vec![Event::Print('世')]);
        assert_eq!(decode("🦀".as_bytes()), vec![Event::Print('🦀')]);
    }

    #[test]
    fn utf8_split_across_chunks() {
        let mut d = SequenceDecoder::new();
        let bytes = "世".as_bytes();
        assert!(d.feed(&bytes[..1]).is_empty());
        assert!(d.feed(&bytes[1..2]).is_empty());
        assert_eq!(d.feed(&bytes[2..]), vec![Event::Print('世')]);
    }

    #[test]
    fn invalid_utf8_yields_replacement() {
        // Stray continuation byte.
        assert_eq!(decode(&[0x80]), vec![Event::Print('\u{fffd}')]);
        // Truncated sequence followed by ASCII: replacement, then the ASCII.
        assert_eq!(
            decode(&[0xe4, b'x']),
            vec![Event::Print('\u{fffd}'), Event::Print('x')]
        );
        // 5-byte lead shape decodes to the replacement scalar.
        assert_eq!(
            decode(&[0xf8, 0x80, 0x80, 0x80, 0x80]),
            vec![Event::Print('\u{fffd}')]
        );
    }

    #[test]
    fn csi_cursor_move() {
        assert_eq!(
            decode(b"\x1b[2;5H"),
            vec![Event::Cursor(CursorOp::MoveTo { y: 2, x: 5 })]
        );
    }

    #[test]
    fn csi_split_across_chunks() {
        let mut d = SequenceDecoder::new();
        assert!(d.feed(b"\x1b[3").is_empty());
        assert!(d.feed(b"8;5;19").is_empty());
        assert_eq!(d.feed(b"6m"), vec![Event::Attr(AttrOp::Fg(196))]);
    }

    #[test]
    fn csi_empty_leading_param() {
        assert_eq!(
            decode(b"\x1b[;5H"),
            vec![Event::Cursor(CursorOp::MoveTo { y: 1, x: 5 })]
        );
    }

    #[test]
    fn csi_colon_separators() {
        assert_eq!(
            decode(b"\x1b[38:5:21m"),
            vec![Event::Attr(AttrOp::Fg(21))]
        );
    }

    #[test]
    fn private_mode_sequences() {
        assert_eq!(
            decode(b"\x1b[?1004h"),
            vec![Event::Mode(ModeOp::FocusReporting(true))]
        );
        assert_eq!(
            decode(b"\x1b[?25l"),
            vec![Event::Mode(ModeOp::ShowCursor(false))]
        );
    }

    #[test]
    fn sgr_mouse_press_and_release() {
        assert_eq!(
            decode(b"\x1b[<0;10;5M"),
            vec![Event::Device(DeviceOp::MouseReport {
                code: 0,
                x: 10,
                y: 5,
                pressed: true
            })]
        );
        assert_eq!(
            decode(b"\x1b[<0;10;5m"),
            vec![Event::Device(DeviceOp::MouseReport {
                code: 0,
                x: 10,
                y: 5,
                pressed: false
            })]
        );
    }

    #[test]
    fn esc_sequences() {
        assert_eq!(decode(b"\x1b7"), vec![Event::Cursor(CursorOp::Save)]);
        assert_eq!(decode(b"\x1bM"), vec![Event::Cursor(CursorOp::ReverseLineFeed)]);
        assert_eq!(decode(b"\x1bc"), vec![Event::Screen(ScreenOp::FullReset)]);
    }

    #[test]
    fn charset_designation_is_swallowed() {
        assert_eq!(
            decode(b"\x1b(Bx"),
            vec![Event::Print('x')]
        );
    }

    #[test]
    fn unknown_esc_falls_back() {
        assert_eq!(decode(b"\x1bq"), vec![Event::Esc('q')]);
    }

    #[test]
    fn unknown_csi_falls_back_with_params() {
        assert_eq!(
            decode(b"\x1b[1;2q"),
            vec![Event::Csi {
                params: vec![1, 2],
                marker: None,
                final_byte: 'q'
            }]
        );
        assert_eq!(
            decode(b"\x1b[?9999h"),
            vec![Event::Csi {
                params: vec![9999],
                marker: Some('?'),
                final_byte: 'h'
            }]
        );
    }

    #[test]
    fn osc_title_bel_and_st() {
        assert_eq!(
            decode(b"\x1b]0;my title\x07"),
            vec![Event::System(SystemOp::WindowTitle("my title".into()))]
        );
        assert_eq!(
            decode(b"\x1b]2;other\x1b\\"),
            vec![Event::System(SystemOp::WindowTitle("other".into()))]
        );
    }

    #[test]
    fn osc_split_across_chunks() {
        let mut d = SequenceDecoder::new();
        assert!(d.feed(b"\x1b]0;he").is_empty());
        assert_eq!(
            d.feed(b"llo\x07"),
            vec![Event::System(SystemOp::WindowTitle("hello".into()))]
        );
    }

    #[test]
    fn osc_palette() {
        assert_eq!(
            decode(b"\x1b]4;1;rgb:ff/00/00\x07"),
            vec![Event::Palette(PaletteOp::Set {
                index: 1,
                r: 255,
                g: 0,
                b: 0
            })]
        );
    }

    #[test]
    fn unknown_osc_falls_back() {
        assert_eq!(
            decode(b"\x1b]1337;x\x07"),
            vec![Event::Osc(vec!["1337".into(), "x".into()])]
        );
    }

    #[test]
    fn dcs_strings_are_swallowed() {
        assert_eq!(
            decode(b"\x1bPq#payload\x1b\\x"),
            vec![Event::Print('x')]
        );
        assert_eq!(decode(b"\x1b_apc data\x07y"), vec![Event::Print('y')]);
    }

    #[test]
    fn can_cancels_csi() {
        assert_eq!(
            decode(b"\x1b[12\x18x"),
            vec![Event::Print('x')]
        );
    }

    #[test]
    fn esc_restarts_inside_csi() {
        assert_eq!(
            decode(b"\x1b[12\x1b[3A"),
            vec![Event::Cursor(CursorOp::Up(3))]
        );
    }

    #[test]
    fn reports_decode() {
        assert_eq!(
            decode(b"\x1b[12;40R"),
            vec![Event::Device(DeviceOp::CursorLocation { y: 12, x: 40 })]
        );
        assert_eq!(
            decode(b"\x1b[8;24;80t"),
            vec![Event::Device(DeviceOp::ScreenSize { rows: 24, cols: 80 })]
        );
        assert_eq!(decode(b"\x1b[I"), vec![Event::Device(DeviceOp::FocusIn)]);
        assert_eq!(decode(b"\x1b[O"), vec![Event::Device(DeviceOp::FocusOut)]);
    }

    #[test]
    fn mixed_stream_in_order() {
        let events = decode(b"a\x1b[31mb");
        assert_eq!(
            events,
            vec![
                Event::Print('a'),
                Event::Attr(AttrOp::Fg(1)),
                Event::Print('b'),
            ]
        );
    }

    #[test]
    fn every_split_of_a_stream_decodes_identically() {
        let stream: &[u8] = "x\x1b[1;31m世\x1b]0;t\x07\x1b[?25l".as_bytes();
        let whole = decode(stream);
        for split in 1..stream.len() {
            let mut d = SequenceDecoder::new();
            let mut events = d.feed(&stream[..split]);
            events.extend(d.feed(&stream[split..]));
            assert_eq!(events, whole, "split at {split}");
        }
    }
}
