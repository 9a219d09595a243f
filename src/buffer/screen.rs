//! Low-color screen buffer
//!
//! 8-byte cells: 4 packed attribute bytes plus a 4-byte glyph field. This is
//! the depth the emulator drives; the HD buffer mirrors its surface for
//! compositing work.

use super::attr::{special, Attr};
use super::cell::{read_attr, read_glyph, write_cell, CELL_SIZE};
use super::{
    clamp_rect, copy_region_impl, draw_opaque, fill_pattern, put_walk, resize_cells,
    space_out_cell, CellBuffer, DrawOptions, PutOptions, TermDrawOptions, TerminalSink,
};
use crate::geometry::Rect;

/// A grid of 8-byte indexed-color cells with a cursor and a wrap flag.
#[derive(Debug)]
pub struct ScreenBuffer {
    width: i32,
    height: i32,
    cells: Vec<u8>,
    cx: i32,
    cy: i32,
    wrap: bool,
    clear_attr: Attr,
}

impl ScreenBuffer {
    /// Create a buffer cleared to spaces in the default attribute.
    ///
    /// Panics when either dimension is not positive; a zero-area screen has
    /// no meaningful cursor.
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "buffer dimensions must be positive");
        let clear_attr = Attr::default();
        let mut buf = Self {
            width,
            height,
            cells: vec![0; width as usize * height as usize * CELL_SIZE],
            cx: 0,
            cy: 0,
            wrap: true,
            clear_attr,
        };
        buf.clear();
        buf
    }

    pub(crate) fn from_raw(width: i32, height: i32, cells: Vec<u8>) -> Self {
        Self {
            width,
            height,
            cells,
            cx: 0,
            cy: 0,
            wrap: true,
            clear_attr: Attr::default(),
        }
    }

    /// The whole buffer as a rect, `{0, 0, width-1, height-1}`.
    pub fn rect(&self) -> Rect {
        Rect::of_buffer(self.width, self.height)
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        self.wrap = wrap;
    }

    /// Attribute used when clearing or exposing new cells.
    pub fn set_clear_attr(&mut self, attr: Attr) {
        self.clear_attr = attr;
    }

    pub fn clear_attr(&self) -> Attr {
        self.clear_attr
    }

    fn clear_pattern(&self) -> [u8; CELL_SIZE] {
        let mut pattern = [0u8; CELL_SIZE];
        write_cell(&mut pattern, &self.clear_attr, ' ', 0);
        pattern
    }

    /// Reset every cell to a space in the clear attribute.
    pub fn clear(&mut self) {
        let pattern = self.clear_pattern();
        fill_pattern(
            &mut self.cells,
            self.width,
            self.height,
            CELL_SIZE,
            None,
            &pattern,
        );
    }

    #[inline]
    fn idx(&self, x: i32, y: i32) -> usize {
        (y as usize * self.width as usize + x as usize) * CELL_SIZE
    }

    /// Packed bytes of one cell, `None` outside the buffer.
    pub fn cell_at(&self, x: i32, y: i32) -> Option<&[u8]> {
        if !self.rect().contains(x, y) {
            return None;
        }
        let i = self.idx(x, y);
        Some(&self.cells[i..i + CELL_SIZE])
    }

    /// Unpacked attribute of one cell, the default outside the buffer.
    pub fn attr_at(&self, x: i32, y: i32) -> Attr {
        self.cell_at(x, y).map(read_attr).unwrap_or_default()
    }

    /// Glyph of one cell, NUL outside the buffer.
    pub fn glyph_at(&self, x: i32, y: i32) -> char {
        self.cell_at(x, y).map(read_glyph).unwrap_or('\0')
    }

    /// One row decoded as a string, trailing full-width halves elided.
    pub fn row_text(&self, y: i32) -> String {
        let mut out = String::new();
        for x in 0..self.width {
            if let Some(cell) = self.cell_at(x, y) {
                if cell[3] & special::TRAILING_FULLWIDTH != 0 {
                    continue;
                }
                let ch = read_glyph(cell);
                out.push(if ch == '\0' { ' ' } else { ch });
            }
        }
        out
    }

    /// Write one cell, severing any full-width pair it lands on.
    fn write_one(&mut self, x: i32, y: i32, attr: &Attr, ch: char, bits: u8) {
        let old = self.cells[self.idx(x, y) + 3] & special::FULLWIDTH;
        if old == special::LEADING_FULLWIDTH && x + 1 < self.width {
            let i = self.idx(x + 1, y);
            space_out_cell(&mut self.cells, i, CELL_SIZE, Attr::SIZE);
        }
        if old == special::TRAILING_FULLWIDTH && x > 0 {
            let i = self.idx(x - 1, y);
            space_out_cell(&mut self.cells, i, CELL_SIZE, Attr::SIZE);
        }
        let i = self.idx(x, y);
        write_cell(&mut self.cells[i..i + CELL_SIZE], attr, ch, bits);
    }

    /// Draw this buffer into another one, opaquely.
    pub fn draw_into(&self, dst: &mut ScreenBuffer, opts: &DrawOptions) {
        draw_opaque(
            &self.cells,
            self.width,
            self.height,
            &mut dst.cells,
            dst.width,
            dst.height,
            CELL_SIZE,
            Attr::SIZE,
            opts,
        );
    }

    /// Emit this buffer as escape sequences into a terminal sink.
    pub fn draw_to_terminal(&self, term: &mut TerminalSink, opts: &TermDrawOptions) {
        term.draw_low(&self.cells, self.width, self.height, opts);
    }
}

impl CellBuffer for ScreenBuffer {
    type Attr = Attr;

    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn cell_size(&self) -> usize {
        CELL_SIZE
    }

    fn raw(&self) -> &[u8] {
        &self.cells
    }

    fn cursor(&self) -> (i32, i32) {
        (self.cx, self.cy)
    }

    fn set_cursor(&mut self, x: i32, y: i32) {
        self.cx = x.clamp(0, self.width - 1);
        self.cy = y.clamp(0, self.height - 1);
    }

    fn put(&mut self, opts: &PutOptions, attr: &Attr, text: &str) {
        let mut writes: Vec<(i32, i32, char, u8)> = Vec::new();
        let end = put_walk(
            self.width,
            self.height,
            self.wrap,
            opts,
            text,
            &mut |x, y, ch, bits| writes.push((x, y, ch, bits)),
        );
        for (x, y, ch, bits) in writes {
            self.write_one(x, y, attr, ch, bits);
        }
        self.cx = end.0;
        self.cy = end.1;
    }

    fn fill(&mut self, region: Option<Rect>, attr: &Attr, ch: char) {
        let mut pattern = [0u8; CELL_SIZE];
        write_cell(&mut pattern, attr, ch, 0);
        let rect = clamp_rect(
            region.unwrap_or_else(|| self.rect()),
            self.width,
            self.height,
        );
        if rect.is_null() {
            return;
        }
        fill_pattern(
            &mut self.cells,
            self.width,
            self.height,
            CELL_SIZE,
            Some(rect),
            &pattern,
        );
        // A fill severs pairs along its edges like any other blit.
        super::repair_fullwidth_edges(
            &mut self.cells,
            self.width,
            self.height,
            CELL_SIZE,
            Attr::SIZE,
            rect,
        );
    }

    fn copy_region(&mut self, src: Rect, dst_x: i32, dst_y: i32) {
        let dx = dst_x - src.xmin;
        let dy = dst_y - src.ymin;
        copy_region_impl(
            &mut self.cells,
            self.width,
            self.height,
            CELL_SIZE,
            src,
            dst_x,
            dst_y,
        );
        let dst_rect = clamp_rect(
            clamp_rect(src, self.width, self.height).translated(dx, dy),
            self.width,
            self.height,
        );
        super::repair_fullwidth_edges(
            &mut self.cells,
            self.width,
            self.height,
            CELL_SIZE,
            Attr::SIZE,
            dst_rect,
        );
    }

    fn v_scroll(&mut self, offset: i32, attr: &Attr, ymin: i32, ymax: i32, clear_new_lines: bool) {
        let ymin = ymin.max(0);
        let ymax = ymax.min(self.height - 1);
        if offset == 0 || ymax < ymin {
            return;
        }
        let region_h = ymax - ymin + 1;
        let full = Rect::new(0, ymin, self.width - 1, ymax);
        if offset.abs() >= region_h {
            if clear_new_lines {
                self.fill(Some(full), attr, ' ');
            }
            return;
        }
        if offset > 0 {
            self.copy_region(
                Rect::new(0, ymin, self.width - 1, ymax - offset),
                0,
                ymin + offset,
            );
            if clear_new_lines {
                self.fill(
                    Some(Rect::new(0, ymin, self.width - 1, ymin + offset - 1)),
                    attr,
                    ' ',
                );
            }
        } else {
            self.copy_region(Rect::new(0, ymin - offset, self.width - 1, ymax), 0, ymin);
            if clear_new_lines {
                self.fill(
                    Some(Rect::new(0, ymax + offset + 1, self.width - 1, ymax)),
                    attr,
                    ' ',
                );
            }
        }
    }

    fn resize(&mut self, width: i32, height: i32) {
        assert!(width > 0 && height > 0, "buffer dimensions must be positive");
        if width == self.width && height == self.height {
            return;
        }
        let pattern = self.clear_pattern();
        self.cells = resize_cells(
            &self.cells,
            self.width,
            self.height,
            width,
            height,
            CELL_SIZE,
            &pattern,
        );
        let overlap = Rect::of_buffer(self.width.min(width), self.height.min(height));
        self.width = width;
        self.height = height;
        // A narrower copy can cut a pair in half along the new right edge.
        super::repair_fullwidth_edges(&mut self.cells, width, height, CELL_SIZE, Attr::SIZE, overlap);
        self.cx = self.cx.clamp(0, width - 1);
        self.cy = self.cy.clamp(0, height - 1);
    }
}
