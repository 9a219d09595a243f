//! Terminal escape-sequence sink
//!
//! Renders a cell array into the byte stream a live terminal consumes. The
//! sink remembers the cells it last emitted, so a delta draw only touches
//! what changed since the previous frame: one cursor move per run of changed
//! cells and one SGR sequence per attribute change.

use super::attr::{special, Attr, AttrHd, Palette};
use super::cell::{decode_glyph, CELL_SIZE, CELL_SIZE_HD, GLYPH_LEN};
use super::TermDrawOptions;
use crate::geometry::{cell_iter, Rect, RegionParams};

const ESC: &[u8] = b"\x1b[";

/// Escape-sequence renderer with a last-frame cell cache.
pub struct TerminalSink {
    width: i32,
    height: i32,
    cell_size: usize,
    attr_size: usize,
    hd: bool,
    /// Emit 24-bit SGR colors for HD cells; quantize through the palette
    /// otherwise.
    truecolor: bool,
    palette: Palette,
    last: Vec<u8>,
    out: Vec<u8>,
}

impl TerminalSink {
    /// Sink for low-color (8-byte cell) buffers.
    pub fn new(width: i32, height: i32) -> Self {
        Self::build(width, height, false)
    }

    /// Sink for HD (14-byte cell) buffers.
    pub fn new_hd(width: i32, height: i32) -> Self {
        Self::build(width, height, true)
    }

    fn build(width: i32, height: i32, hd: bool) -> Self {
        assert!(width > 0 && height > 0, "sink dimensions must be positive");
        let (cell_size, attr_size) = if hd {
            (CELL_SIZE_HD, AttrHd::SIZE)
        } else {
            (CELL_SIZE, Attr::SIZE)
        };
        let mut sink = Self {
            width,
            height,
            cell_size,
            attr_size,
            hd,
            truecolor: true,
            palette: Palette::default(),
            last: Vec::new(),
            out: Vec::new(),
        };
        sink.reset_cache();
        sink
    }

    fn clear_pattern(&self) -> Vec<u8> {
        let mut pattern = vec![0u8; self.cell_size];
        if self.hd {
            super::cell::write_cell_hd(&mut pattern, &AttrHd::default(), ' ', 0);
        } else {
            super::cell::write_cell(&mut pattern, &Attr::default(), ' ', 0);
        }
        pattern
    }

    /// Forget the last frame; the next delta draw re-emits everything that
    /// differs from a cleared screen.
    pub fn reset_cache(&mut self) {
        let pattern = self.clear_pattern();
        self.last = pattern.repeat(self.width as usize * self.height as usize);
    }

    pub fn set_truecolor(&mut self, truecolor: bool) {
        self.truecolor = truecolor;
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// Resize the sink, dropping the frame cache.
    pub fn resize(&mut self, width: i32, height: i32) {
        assert!(width > 0 && height > 0, "sink dimensions must be positive");
        self.width = width;
        self.height = height;
        self.reset_cache();
    }

    /// Bytes produced so far.
    pub fn bytes(&self) -> &[u8] {
        &self.out
    }

    /// Drain the produced bytes.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    /// Emit a cursor move to 0-based buffer coordinates.
    fn move_to(&mut self, x: i32, y: i32) {
        self.out.extend_from_slice(ESC);
        self.out
            .extend_from_slice(format!("{};{}H", y + 1, x + 1).as_bytes());
    }

    /// SGR key of a cell: its attribute bytes with the full-width markers
    /// masked out.
    fn attr_key(&self, cell: &[u8]) -> Vec<u8> {
        let mut key = cell[..self.attr_size].to_vec();
        key[self.attr_size - 1] &= !special::FULLWIDTH;
        key
    }

    fn emit_sgr(&mut self, cell: &[u8]) {
        let mut seq = String::from("\x1b[0");
        let style = cell[self.attr_size - 2];
        for (bit, code) in [
            (super::attr::style::BOLD, 1),
            (super::attr::style::DIM, 2),
            (super::attr::style::ITALIC, 3),
            (super::attr::style::UNDERLINE, 4),
            (super::attr::style::BLINK, 5),
            (super::attr::style::INVERSE, 7),
            (super::attr::style::HIDDEN, 8),
            (super::attr::style::STRIKE, 9),
        ] {
            if style & bit != 0 {
                seq.push_str(&format!(";{}", code));
            }
        }
        if self.hd {
            let (fr, fg, fb) = (cell[0], cell[1], cell[2]);
            let (br, bg, bb) = (cell[4], cell[5], cell[6]);
            if self.truecolor {
                seq.push_str(&format!(";38;2;{};{};{}", fr, fg, fb));
                seq.push_str(&format!(";48;2;{};{};{}", br, bg, bb));
            } else {
                seq.push_str(&indexed_fg(self.palette.nearest(fr, fg, fb)));
                seq.push_str(&indexed_bg(self.palette.nearest(br, bg, bb)));
            }
        } else {
            seq.push_str(&indexed_fg(cell[0]));
            seq.push_str(&indexed_bg(cell[1]));
        }
        seq.push('m');
        self.out.extend_from_slice(seq.as_bytes());
    }

    fn emit_glyph(&mut self, cell: &[u8]) {
        let glyph = &cell[self.attr_size..self.attr_size + GLYPH_LEN];
        let ch = decode_glyph(glyph);
        if ch == '\0' {
            self.out.push(b' ');
        } else {
            let mut buf = [0u8; 4];
            self.out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
        }
    }

    pub(crate) fn draw_low(&mut self, cells: &[u8], src_w: i32, src_h: i32, opts: &TermDrawOptions) {
        debug_assert!(!self.hd);
        self.draw_cells(cells, src_w, src_h, opts);
    }

    pub(crate) fn draw_hd(&mut self, cells: &[u8], src_w: i32, src_h: i32, opts: &TermDrawOptions) {
        debug_assert!(self.hd);
        self.draw_cells(cells, src_w, src_h, opts);
    }

    fn draw_cells(&mut self, cells: &[u8], src_w: i32, src_h: i32, opts: &TermDrawOptions) {
        let mut dst = Rect::of_buffer(self.width, self.height);
        let mut src = Rect::of_buffer(src_w, src_h);
        dst.clip(&mut src, opts.x, opts.y, true);
        if dst.is_null() {
            return;
        }
        let p = RegionParams {
            src,
            dst,
            src_row_width: src_w,
            dst_row_width: self.width,
            cell_size: self.cell_size,
        };

        // Expected terminal cursor cell after the last emission, and the
        // attribute of the last SGR sent.
        let mut pen: Option<(i32, i32)> = None;
        let mut cur_attr: Option<Vec<u8>> = None;
        let special_off = self.attr_size - 1;

        for span in cell_iter(p) {
            let cell = &cells[span.src.clone()];
            let changed = !opts.delta || &self.last[span.dst.clone()] != cell;
            self.last[span.dst.clone()].copy_from_slice(cell);

            let bits = cell[special_off] & special::FULLWIDTH;
            if bits == special::TRAILING_FULLWIDTH {
                // Drawn as part of its lead; if only the trail changed the
                // lead was re-emitted by the pair-maintenance rules upstream.
                continue;
            }
            if !changed {
                continue;
            }

            if pen != Some((span.x, span.y)) {
                self.move_to(span.x, span.y);
            }
            let key = self.attr_key(cell);
            if cur_attr.as_ref() != Some(&key) {
                self.emit_sgr(cell);
                cur_attr = Some(key);
            }

            if bits == special::LEADING_FULLWIDTH {
                if span.end_of_line {
                    // Half a glyph cannot be drawn.
                    self.out.push(b' ');
                    pen = Some((span.x + 1, span.y));
                } else {
                    self.emit_glyph(cell);
                    pen = Some((span.x + 2, span.y));
                }
            } else {
                self.emit_glyph(cell);
                pen = Some((span.x + 1, span.y));
            }
        }
    }
}

fn indexed_fg(index: u8) -> String {
    match index {
        0..=7 => format!(";3{}", index),
        8..=15 => format!(";9{}", index - 8),
        _ => format!(";38;5;{}", index),
    }
}

fn indexed_bg(index: u8) -> String {
    match index {
        0..=7 => format!(";4{}", index),
        8..=15 => format!(";10{}", index - 8),
        _ => format!(";48;5;{}", index),
    }
}
