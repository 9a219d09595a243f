//! Terminal emulator
//!
//! Interprets the decoded event stream against a [`ScreenBuffer`]: cursor
//! discipline, the scrolling region, content edits, accumulating SGR state,
//! mode flags, and the byte-exact reports a real terminal would send back.
//! Reports are queued in an output buffer the host drains with
//! [`take_output`](Emulator::take_output).

use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::buffer::{
    Attr, CellBuffer, Direction, Palette, PutOptions, ScreenBuffer, TermDrawOptions, TerminalSink,
};
use crate::decoder::{
    AttrOp, ControlOp, CursorOp, DeviceOp, EditOp, EraseExtent, Event, ModeOp, PaletteOp,
    ScreenOp, SequenceDecoder, SystemOp,
};
use crate::geometry::Rect;

const DEFAULT_TAB_WIDTH: i32 = 8;

/// Decoder parameters are u32 while screen arithmetic is i32. Saturate
/// instead of wrapping so an absurd count means "as many as fit".
fn param_i32(n: u32) -> i32 {
    n.min(i32::MAX as u32) as i32
}

/// A VT-style terminal: decoder, screen, and interpreter state.
pub struct Emulator {
    screen: ScreenBuffer,
    decoder: SequenceDecoder,
    palette: Palette,
    attr: Attr,

    saved_cursor: Option<(i32, i32, Attr)>,
    /// 0-based inclusive scroll margins.
    scroll_top: i32,
    scroll_bottom: i32,
    tab_width: i32,

    auto_wrap: bool,
    /// Deferred wrap: the cursor sits on the last column and the next
    /// printable moves to the following line first.
    pending_wrap: bool,
    cursor_visible: bool,
    mouse_button: bool,
    mouse_drag: bool,
    mouse_motion: bool,
    sgr_mouse: bool,
    focus_reporting: bool,
    bracketed_paste: bool,

    /// Main-screen stash while the alternate screen is active.
    main_screen: Option<(Vec<u8>, (i32, i32))>,

    title: String,
    last_notification: Option<(Option<String>, String)>,

    output: Vec<u8>,
}

impl Emulator {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            screen: ScreenBuffer::new(width, height),
            decoder: SequenceDecoder::new(),
            palette: Palette::default(),
            attr: Attr::default(),
            saved_cursor: None,
            scroll_top: 0,
            scroll_bottom: height - 1,
            tab_width: DEFAULT_TAB_WIDTH,
            auto_wrap: true,
            pending_wrap: false,
            cursor_visible: true,
            mouse_button: false,
            mouse_drag: false,
            mouse_motion: false,
            sgr_mouse: false,
            focus_reporting: false,
            bracketed_paste: false,
            main_screen: None,
            title: String::new(),
            last_notification: None,
            output: Vec::new(),
        }
    }

    pub fn tab_width(&self) -> i32 {
        self.tab_width
    }

    /// Set the tab stop interval. Widths below 1 are ignored.
    pub fn set_tab_width(&mut self, width: i32) {
        if width >= 1 {
            self.tab_width = width;
        }
    }

    pub fn screen(&self) -> &ScreenBuffer {
        &self.screen
    }

    pub fn screen_mut(&mut self) -> &mut ScreenBuffer {
        &mut self.screen
    }

    pub fn attr(&self) -> Attr {
        self.attr
    }

    pub fn set_attr(&mut self, attr: Attr) {
        self.attr = attr;
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn cursor_visible(&self) -> bool {
        self.cursor_visible
    }

    pub fn bracketed_paste(&self) -> bool {
        self.bracketed_paste
    }

    /// True when the peer asked for SGR-encoded mouse reports (mode 1006).
    pub fn sgr_mouse(&self) -> bool {
        self.sgr_mouse
    }

    pub fn last_notification(&self) -> Option<&(Option<String>, String)> {
        self.last_notification.as_ref()
    }

    pub fn cursor(&self) -> (i32, i32) {
        self.screen.cursor()
    }

    /// Bytes queued for the peer since the last drain.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }

    /// Decode and interpret a chunk of the inbound stream.
    pub fn feed(&mut self, bytes: &[u8]) {
        for event in self.decoder.feed(bytes) {
            self.apply(&event);
        }
    }

    /// Interpret one already-decoded event.
    pub fn apply(&mut self, event: &Event) {
        match event {
            Event::Print(ch) => self.print_char(*ch),
            Event::Control(op) => self.control(*op),
            Event::Cursor(op) => self.cursor_op(*op),
            Event::Edit(op) => self.edit(*op),
            Event::Attr(op) => self.attr_op(*op),
            Event::Mode(op) => self.mode(*op),
            Event::Device(op) => self.device(*op),
            Event::Palette(op) => self.palette_op(op),
            Event::Screen(op) => self.screen_op(*op),
            Event::System(op) => self.system(op),
            Event::Csi {
                params,
                marker,
                final_byte,
            } => debug!(?params, ?marker, %final_byte, "ignoring unhandled CSI"),
            Event::Osc(parts) => debug!(?parts, "ignoring unhandled OSC"),
            Event::Esc(c) => debug!(final_byte = %c, "ignoring unhandled escape"),
            Event::UnknownControl(b) => debug!(byte = b, "ignoring control byte"),
        }
    }

    /// Write a string at the cursor as if it had been received as printable
    /// input.
    pub fn print(&mut self, text: &str) {
        for ch in text.chars() {
            self.print_char(ch);
        }
    }

    /// Move the cursor to 0-based coordinates, clamped.
    pub fn move_cursor_to(&mut self, x: i32, y: i32) {
        self.screen.set_cursor(x, y);
    }

    /// Erase part of the display in the current attribute.
    pub fn erase_display(&mut self, extent: EraseExtent) {
        self.edit(EditOp::EraseDisplay(extent));
    }

    /// Erase part of the cursor's line in the current attribute.
    pub fn erase_line(&mut self, extent: EraseExtent) {
        self.edit(EditOp::EraseLine(extent));
    }

    pub fn insert_lines(&mut self, n: u32) {
        self.edit(EditOp::InsertLines(n));
    }

    pub fn delete_lines(&mut self, n: u32) {
        self.edit(EditOp::DeleteLines(n));
    }

    pub fn insert_chars(&mut self, n: u32) {
        self.edit(EditOp::InsertChars(n));
    }

    pub fn delete_chars(&mut self, n: u32) {
        self.edit(EditOp::DeleteChars(n));
    }

    pub fn erase_chars(&mut self, n: u32) {
        self.edit(EditOp::EraseChars(n));
    }

    /// Set the scrolling region from 1-based inclusive margins, as DECSTBM
    /// would.
    pub fn set_scrolling_region(&mut self, top: u32, bottom: u32) {
        self.screen_op(ScreenOp::SetScrollingRegion { top, bottom });
    }

    /// Draw the screen into a terminal sink, optionally as a delta against
    /// the sink's last frame.
    pub fn draw(&self, sink: &mut TerminalSink, delta: bool) {
        self.screen
            .draw_to_terminal(sink, &TermDrawOptions { x: 0, y: 0, delta });
    }

    /// Resize the screen, dropping the scrolling region and the alternate
    /// screen stash.
    pub fn resize(&mut self, width: i32, height: i32) {
        self.screen.resize(width, height);
        self.scroll_top = 0;
        self.scroll_bottom = height - 1;
        self.main_screen = None;
    }

    /// Full reset: clear the screen and every piece of interpreter state.
    pub fn reset(&mut self) {
        let width = self.screen.width();
        let height = self.screen.height();
        self.screen = ScreenBuffer::new(width, height);
        self.decoder.reset();
        self.palette = Palette::default();
        self.attr = Attr::default();
        self.saved_cursor = None;
        self.scroll_top = 0;
        self.scroll_bottom = height - 1;
        self.tab_width = DEFAULT_TAB_WIDTH;
        self.auto_wrap = true;
        self.pending_wrap = false;
        self.cursor_visible = true;
        self.mouse_button = false;
        self.mouse_drag = false;
        self.mouse_motion = false;
        self.sgr_mouse = false;
        self.focus_reporting = false;
        self.bracketed_paste = false;
        self.main_screen = None;
    }

    /// Queue an SGR-protocol mouse report if any mouse mode is active.
    pub fn mouse_event(&mut self, code: u32, x: u32, y: u32, pressed: bool) {
        if !(self.mouse_button || self.mouse_drag || self.mouse_motion) {
            return;
        }
        let terminator = if pressed { 'M' } else { 'm' };
        self.output
            .extend_from_slice(format!("\x1b[<{};{};{}{}", code, x, y, terminator).as_bytes());
    }

    /// Queue a focus report if focus reporting is active.
    pub fn focus_event(&mut self, focused: bool) {
        if !self.focus_reporting {
            return;
        }
        self.output
            .extend_from_slice(if focused { b"\x1b[I" } else { b"\x1b[O" });
    }

    fn print_char(&mut self, ch: char) {
        let glyph_width = UnicodeWidthChar::width(ch).unwrap_or(0) as i32;
        if glyph_width == 0 {
            return;
        }
        let width = self.screen.width();
        let (mut x, mut y) = self.screen.cursor();
        if self.pending_wrap && self.auto_wrap {
            x = 0;
            y = self.feed_line(y);
        }
        self.pending_wrap = false;
        if x + glyph_width > width {
            if self.auto_wrap {
                x = 0;
                y = self.feed_line(y);
            } else {
                x = width - glyph_width;
            }
        }
        let mut buf = [0u8; 4];
        let text: &str = ch.encode_utf8(&mut buf);
        self.screen.put(
            &PutOptions {
                x,
                y,
                direction: Direction::Right,
                wrap: Some(false),
                keep_newlines: false,
            },
            &self.attr,
            text,
        );
        let nx = x + glyph_width;
        if nx >= width {
            // The cursor stays put; the wrap happens when the next glyph
            // arrives.
            self.pending_wrap = self.auto_wrap;
            self.screen.set_cursor(width - 1, y);
        } else {
            self.screen.set_cursor(nx, y);
        }
    }

    /// Scroll margins in effect for row `y`: the configured region when the
    /// cursor is inside it, the full screen otherwise.
    fn active_region(&self, y: i32) -> (i32, i32) {
        if y >= self.scroll_top && y <= self.scroll_bottom {
            (self.scroll_top, self.scroll_bottom)
        } else {
            (0, self.screen.height() - 1)
        }
    }

    /// Advance one line from `y`, scrolling when the cursor sits on the
    /// bottom margin of its active region. Returns the new row.
    fn feed_line(&mut self, y: i32) -> i32 {
        let (top, bottom) = self.active_region(y);
        if y == bottom {
            self.screen.v_scroll(-1, &self.attr, top, bottom, true);
            y
        } else {
            (y + 1).min(self.screen.height() - 1)
        }
    }

    fn line_feed(&mut self) {
        let (x, y) = self.screen.cursor();
        let ny = self.feed_line(y);
        self.screen.set_cursor(x, ny);
    }

    fn reverse_line_feed(&mut self) {
        let (x, y) = self.screen.cursor();
        let (top, bottom) = self.active_region(y);
        if y == top {
            self.screen.v_scroll(1, &self.attr, top, bottom, true);
        } else {
            self.screen.set_cursor(x, y - 1);
        }
    }

    fn control(&mut self, op: ControlOp) {
        self.pending_wrap = false;
        let (x, y) = self.screen.cursor();
        match op {
            ControlOp::Bell => debug!("bell"),
            ControlOp::Backspace => self.screen.set_cursor(x - 1, y),
            ControlOp::Tab => {
                let next = (x / self.tab_width + 1) * self.tab_width;
                self.screen.set_cursor(next, y);
            }
            ControlOp::LineFeed => self.line_feed(),
            ControlOp::CarriageReturn => self.screen.set_cursor(0, y),
        }
    }

    fn cursor_op(&mut self, op: CursorOp) {
        self.pending_wrap = false;
        let (x, y) = self.screen.cursor();
        match op {
            CursorOp::Up(n) => self.screen.set_cursor(x, y.saturating_sub(param_i32(n))),
            CursorOp::Down(n) => self.screen.set_cursor(x, y.saturating_add(param_i32(n))),
            CursorOp::Right(n) => self.screen.set_cursor(x.saturating_add(param_i32(n)), y),
            CursorOp::Left(n) => self.screen.set_cursor(x.saturating_sub(param_i32(n)), y),
            CursorOp::NextLine(n) => {
                // Feeds beyond a screenful plus a full region of scrolling
                // change nothing further.
                let reps = param_i32(n).min(self.screen.height() * 2);
                for _ in 0..reps {
                    self.line_feed();
                }
                let (_, y) = self.screen.cursor();
                self.screen.set_cursor(0, y);
            }
            CursorOp::PrevLine(n) => self.screen.set_cursor(0, y.saturating_sub(param_i32(n))),
            CursorOp::Column(n) => self.screen.set_cursor(param_i32(n) - 1, y),
            CursorOp::Row(n) => self.screen.set_cursor(x, param_i32(n) - 1),
            CursorOp::MoveTo { y: row, x: col } => self
                .screen
                .set_cursor(param_i32(col) - 1, param_i32(row) - 1),
            CursorOp::Save => self.saved_cursor = Some((x, y, self.attr)),
            CursorOp::Restore => {
                let (sx, sy, attr) = self.saved_cursor.unwrap_or((0, 0, Attr::default()));
                self.attr = attr;
                self.screen.set_cursor(sx, sy);
            }
            CursorOp::Index => self.line_feed(),
            CursorOp::ReverseLineFeed => self.reverse_line_feed(),
        }
    }

    fn edit(&mut self, op: EditOp) {
        let width = self.screen.width();
        let height = self.screen.height();
        let (x, y) = self.screen.cursor();
        match op {
            EditOp::EraseDisplay(extent) => match extent {
                EraseExtent::ToEnd => {
                    self.fill(Rect::new(x, y, width - 1, y));
                    self.fill(Rect::new(0, y + 1, width - 1, height - 1));
                }
                EraseExtent::ToStart => {
                    self.fill(Rect::new(0, 0, width - 1, y - 1));
                    self.fill(Rect::new(0, y, x, y));
                }
                EraseExtent::All => self.fill(Rect::new(0, 0, width - 1, height - 1)),
            },
            EditOp::EraseLine(extent) => match extent {
                EraseExtent::ToEnd => self.fill(Rect::new(x, y, width - 1, y)),
                EraseExtent::ToStart => self.fill(Rect::new(0, y, x, y)),
                EraseExtent::All => self.fill(Rect::new(0, y, width - 1, y)),
            },
            EditOp::InsertLines(n) => {
                if y >= self.scroll_top && y <= self.scroll_bottom {
                    self.screen
                        .v_scroll(param_i32(n), &self.attr, y, self.scroll_bottom, true);
                }
            }
            EditOp::DeleteLines(n) => {
                if y >= self.scroll_top && y <= self.scroll_bottom {
                    self.screen
                        .v_scroll(-param_i32(n), &self.attr, y, self.scroll_bottom, true);
                }
            }
            EditOp::InsertChars(n) => {
                let n = param_i32(n).min(width - x);
                self.screen
                    .copy_region(Rect::new(x, y, width - 1 - n, y), x + n, y);
                self.fill(Rect::new(x, y, x + n - 1, y));
            }
            EditOp::DeleteChars(n) => {
                let n = param_i32(n).min(width - x);
                self.screen.copy_region(Rect::new(x + n, y, width - 1, y), x, y);
                self.fill(Rect::new(width - n, y, width - 1, y));
            }
            EditOp::EraseChars(n) => {
                let n = param_i32(n).min(width - x);
                self.fill(Rect::new(x, y, x + n - 1, y));
            }
            EditOp::ScrollUp(n) => self.screen.v_scroll(
                -param_i32(n),
                &self.attr,
                self.scroll_top,
                self.scroll_bottom,
                true,
            ),
            EditOp::ScrollDown(n) => self.screen.v_scroll(
                param_i32(n),
                &self.attr,
                self.scroll_top,
                self.scroll_bottom,
                true,
            ),
        }
    }

    fn fill(&mut self, rect: Rect) {
        if rect.is_null() {
            return;
        }
        self.screen.fill(Some(rect), &self.attr, ' ');
    }

    fn attr_op(&mut self, op: AttrOp) {
        match op {
            AttrOp::Reset => self.attr = Attr::default(),
            AttrOp::Bold(v) => self.attr.bold = v,
            AttrOp::Dim(v) => self.attr.dim = v,
            AttrOp::NormalIntensity => {
                self.attr.bold = false;
                self.attr.dim = false;
            }
            AttrOp::Italic(v) => self.attr.italic = v,
            AttrOp::Underline(v) => self.attr.underline = v,
            AttrOp::Blink(v) => self.attr.blink = v,
            AttrOp::Inverse(v) => self.attr.inverse = v,
            AttrOp::Hidden(v) => self.attr.hidden = v,
            AttrOp::Strike(v) => self.attr.strike = v,
            AttrOp::Fg(i) => self.attr.fg = i,
            AttrOp::Bg(i) => self.attr.bg = i,
            AttrOp::FgRgb(r, g, b) => self.attr.fg = self.palette.nearest(r, g, b),
            AttrOp::BgRgb(r, g, b) => self.attr.bg = self.palette.nearest(r, g, b),
            AttrOp::DefaultFg => self.attr.fg = Attr::DEFAULT_FG,
            AttrOp::DefaultBg => self.attr.bg = Attr::DEFAULT_BG,
        }
    }

    fn mode(&mut self, op: ModeOp) {
        match op {
            ModeOp::AutoWrap(v) => {
                self.auto_wrap = v;
                self.screen.set_wrap(v);
            }
            ModeOp::ShowCursor(v) => self.cursor_visible = v,
            ModeOp::MouseButtonReporting(v) => self.mouse_button = v,
            ModeOp::MouseDragReporting(v) => self.mouse_drag = v,
            ModeOp::MouseMotionReporting(v) => self.mouse_motion = v,
            ModeOp::FocusReporting(v) => self.focus_reporting = v,
            ModeOp::SgrMouse(v) => self.sgr_mouse = v,
            ModeOp::AlternateScreen(v) => self.alternate_screen(v),
            ModeOp::BracketedPaste(v) => self.bracketed_paste = v,
        }
    }

    fn alternate_screen(&mut self, enter: bool) {
        if enter {
            if self.main_screen.is_none() {
                self.main_screen = Some((self.screen.raw().to_vec(), self.screen.cursor()));
                self.screen.clear();
                self.screen.set_cursor(0, 0);
            }
        } else if let Some((cells, cursor)) = self.main_screen.take() {
            let width = self.screen.width();
            let height = self.screen.height();
            self.screen = ScreenBuffer::from_raw(width, height, cells);
            self.screen.set_cursor(cursor.0, cursor.1);
        }
    }

    fn device(&mut self, op: DeviceOp) {
        match op {
            DeviceOp::RequestCursorLocation => {
                let (x, y) = self.screen.cursor();
                self.output
                    .extend_from_slice(format!("\x1b[{};{}R", y + 1, x + 1).as_bytes());
            }
            DeviceOp::RequestStatus => self.output.extend_from_slice(b"\x1b[0n"),
            DeviceOp::RequestScreenSize => {
                self.output.extend_from_slice(
                    format!("\x1b[8;{};{}t", self.screen.height(), self.screen.width())
                        .as_bytes(),
                );
            }
            // Reports addressed to a host, not to a terminal.
            DeviceOp::CursorLocation { .. }
            | DeviceOp::ScreenSize { .. }
            | DeviceOp::MouseReport { .. }
            | DeviceOp::FocusIn
            | DeviceOp::FocusOut => debug!(?op, "ignoring inbound report"),
        }
    }

    fn palette_op(&mut self, op: &PaletteOp) {
        match *op {
            PaletteOp::Set { index, r, g, b } => self.palette.set(index, r, g, b),
            PaletteOp::Request(index) => {
                let (r, g, b) = self.palette.get(index);
                self.output.extend_from_slice(
                    format!("\x1b]4;{};rgb:{:02x}/{:02x}/{:02x}\x07", index, r, g, b).as_bytes(),
                );
            }
            PaletteOp::ResetIndex(index) => self.palette.reset_index(index),
            PaletteOp::ResetAll => self.palette = Palette::default(),
        }
    }

    fn screen_op(&mut self, op: ScreenOp) {
        match op {
            ScreenOp::SetScrollingRegion { top, bottom } => {
                let height = self.screen.height();
                let top = (top as i32 - 1).clamp(0, height - 1);
                let bottom = if bottom == 0 {
                    height - 1
                } else {
                    (bottom as i32 - 1).clamp(0, height - 1)
                };
                if top < bottom {
                    self.scroll_top = top;
                    self.scroll_bottom = bottom;
                    self.screen.set_cursor(0, 0);
                }
            }
            ScreenOp::ResetScrollingRegion => {
                self.scroll_top = 0;
                self.scroll_bottom = self.screen.height() - 1;
                self.screen.set_cursor(0, 0);
            }
            ScreenOp::FullReset => self.reset(),
        }
    }

    fn system(&mut self, op: &SystemOp) {
        match op {
            SystemOp::WindowTitle(title) => self.title = title.clone(),
            SystemOp::Notification { title, body } => {
                self.last_notification = Some((title.clone(), body.clone()));
            }
        }
    }
}
