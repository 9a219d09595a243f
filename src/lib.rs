//! termframe
//!
//! A terminal-rendering and terminal-emulation toolkit built around two
//! tightly coupled pieces:
//!
//! - `geometry` + `buffer`: a packed, cell-addressed framebuffer with
//!   clipping/blitting/tiling/wrapping blits, alpha compositing, and
//!   delta drawing to a real terminal.
//! - `decoder` + `emulator`: a resumable VT/xterm escape-sequence decoder
//!   and the interpreter that replays decoded events as buffer edits,
//!   forming a minimal virtual terminal emulator.
//!
//! Data flows byte stream -> decoder -> typed events -> emulator ->
//! buffer mutation -> delta draw -> escape bytes back out to a terminal.

pub mod buffer;
pub mod decoder;
pub mod emulator;
pub mod error;
pub mod geometry;

pub use buffer::{
    Attr, AttrHd, BlendFn, Blending, CellBuffer, Direction, DrawOptions, Palette, PutOptions,
    Rgba, ScreenBuffer, ScreenBufferHd, TermDrawOptions, TerminalSink,
};
pub use decoder::{Event, SequenceDecoder};
pub use emulator::Emulator;
pub use error::SnapshotError;
pub use geometry::Rect;
