//! Decoded terminal events
//!
//! Every recognized byte sequence maps to one of these; sequences the
//! dispatch tables do not know come out as the generic `Csi`/`Osc`/`Esc`
//! fallbacks so a consumer can still log or forward them.

/// A single decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A printable character reached the ground state.
    Print(char),
    Control(ControlOp),
    Cursor(CursorOp),
    Edit(EditOp),
    Attr(AttrOp),
    Mode(ModeOp),
    Device(DeviceOp),
    Palette(PaletteOp),
    Screen(ScreenOp),
    System(SystemOp),

    /// CSI sequence with no table entry: parameters, private marker, final
    /// byte.
    Csi {
        params: Vec<u32>,
        marker: Option<char>,
        final_byte: char,
    },
    /// OSC string with no table entry, split on `;`.
    Osc(Vec<String>),
    /// Escape sequence with no table entry.
    Esc(char),
    /// C0 byte with no meaning here.
    UnknownControl(u8),
}

/// C0 control operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOp {
    Bell,
    Backspace,
    Tab,
    LineFeed,
    CarriageReturn,
}

/// Cursor movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorOp {
    Up(u32),
    Down(u32),
    Right(u32),
    Left(u32),
    /// Down and to column zero.
    NextLine(u32),
    /// Up and to column zero.
    PrevLine(u32),
    /// 1-based absolute column.
    Column(u32),
    /// 1-based absolute row.
    Row(u32),
    /// 1-based absolute position, row first.
    MoveTo { y: u32, x: u32 },
    Save,
    Restore,
    /// Line feed without carriage return (index).
    Index,
    /// Reverse line feed: up one, scrolling at the top margin.
    ReverseLineFeed,
}

/// How much of a line or display an erase covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseExtent {
    /// From the cursor to the end.
    ToEnd,
    /// From the start to the cursor.
    ToStart,
    All,
}

/// Content edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    EraseDisplay(EraseExtent),
    EraseLine(EraseExtent),
    InsertLines(u32),
    DeleteLines(u32),
    InsertChars(u32),
    DeleteChars(u32),
    EraseChars(u32),
    ScrollUp(u32),
    ScrollDown(u32),
}

/// One SGR attribute change. A multi-parameter SGR sequence yields one of
/// these per recognized code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrOp {
    Reset,
    Bold(bool),
    Dim(bool),
    /// SGR 22: clears bold and dim together.
    NormalIntensity,
    Italic(bool),
    Underline(bool),
    Blink(bool),
    Inverse(bool),
    Hidden(bool),
    Strike(bool),
    /// Indexed foreground (0-255).
    Fg(u8),
    /// Indexed background (0-255).
    Bg(u8),
    FgRgb(u8, u8, u8),
    BgRgb(u8, u8, u8),
    DefaultFg,
    DefaultBg,
}

/// DEC private mode toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeOp {
    AutoWrap(bool),
    ShowCursor(bool),
    MouseButtonReporting(bool),
    MouseDragReporting(bool),
    MouseMotionReporting(bool),
    FocusReporting(bool),
    SgrMouse(bool),
    AlternateScreen(bool),
    BracketedPaste(bool),
}

/// Reports and report requests, in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceOp {
    /// DSR 6: the peer asks where the cursor is.
    RequestCursorLocation,
    /// DSR 5: the peer asks for a status report.
    RequestStatus,
    /// CSI 18 t: the peer asks for the screen size.
    RequestScreenSize,
    /// A cursor position report, 1-based.
    CursorLocation { y: u32, x: u32 },
    /// A screen size report.
    ScreenSize { rows: u32, cols: u32 },
    /// An SGR-protocol mouse report.
    MouseReport {
        code: u32,
        x: u32,
        y: u32,
        pressed: bool,
    },
    FocusIn,
    FocusOut,
}

/// Color register operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaletteOp {
    Set { index: u8, r: u8, g: u8, b: u8 },
    /// The peer asks what a register holds.
    Request(u8),
    ResetIndex(u8),
    ResetAll,
}

/// Whole-screen state changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOp {
    /// 1-based inclusive row margins.
    SetScrollingRegion { top: u32, bottom: u32 },
    ResetScrollingRegion,
    FullReset,
}

/// Host-integration strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemOp {
    WindowTitle(String),
    Notification {
        title: Option<String>,
        body: String,
    },
}
