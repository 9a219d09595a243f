//! HD screen buffer
//!
//! 14-byte cells carrying full RGBA color planes. The surface mirrors
//! [`ScreenBuffer`](super::ScreenBuffer); what HD adds is the compositing
//! draw: per-cell alpha blending with a selectable channel blend function.

use super::attr::{special, AttrHd, Rgba};
use super::blend::{composite_channel, BlendFn};
use super::cell::{read_attr_hd, read_glyph_hd, write_cell_hd, CELL_SIZE_HD, GLYPH_LEN};
use super::{
    clamp_rect, copy_region_impl, draw_opaque, fill_pattern, put_walk, resize_cells,
    space_out_cell, CellBuffer, DrawOptions, PutOptions, TermDrawOptions, TerminalSink,
};
use crate::geometry::{cell_iter, Rect, RegionParams};

/// Compositing parameters for [`ScreenBufferHd::composite_into`].
#[derive(Debug, Clone, Copy)]
pub struct Blending {
    /// Uniform source opacity in `[0, 1]`, multiplied with per-cell alpha.
    pub opacity: f32,
    /// Channel blend function.
    pub blend_fn: BlendFn,
}

impl Default for Blending {
    fn default() -> Self {
        Self {
            opacity: 1.0,
            blend_fn: BlendFn::Normal,
        }
    }
}

/// A grid of 14-byte RGBA cells with a cursor and a wrap flag.
#[derive(Debug)]
pub struct ScreenBufferHd {
    width: i32,
    height: i32,
    cells: Vec<u8>,
    cx: i32,
    cy: i32,
    wrap: bool,
    clear_attr: AttrHd,
}

impl ScreenBufferHd {
    /// Create a buffer cleared to spaces in the default attribute.
    ///
    /// Panics when either dimension is not positive.
    pub fn new(width: i32, height: i32) -> Self {
        assert!(width > 0 && height > 0, "buffer dimensions must be positive");
        let mut buf = Self {
            width,
            height,
            cells: vec![0; width as usize * height as usize * CELL_SIZE_HD],
            cx: 0,
            cy: 0,
            wrap: true,
            clear_attr: AttrHd::default(),
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
            clear_attr: AttrHd::default(),
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::of_buffer(self.width, self.height)
    }

    pub fn wrap(&self) -> bool {
        self.wrap
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        self.wrap = wrap;
    }

    pub fn set_clear_attr(&mut self, attr: AttrHd) {
        self.clear_attr = attr;
    }

    pub fn clear_attr(&self) -> AttrHd {
        self.clear_attr
    }

    fn clear_pattern(&self) -> [u8; CELL_SIZE_HD] {
        let mut pattern = [0u8; CELL_SIZE_HD];
        write_cell_hd(&mut pattern, &self.clear_attr, ' ', 0);
        pattern
    }

    pub fn clear(&mut self) {
        let pattern = self.clear_pattern();
        fill_pattern(
            &mut self.cells,
            self.width,
            self.height,
            CELL_SIZE_HD,
            None,
            &pattern,
        );
    }

    #[inline]
    fn idx(&self, x: i32, y: i32) -> usize {
        (y as usize * self.width as usize + x as usize) * CELL_SIZE_HD
    }

    pub fn cell_at(&self, x: i32, y: i32) -> Option<&[u8]> {
        if !self.rect().contains(x, y) {
            return None;
        }
        let i = self.idx(x, y);
        Some(&self.cells[i..i + CELL_SIZE_HD])
    }

    pub fn attr_at(&self, x: i32, y: i32) -> AttrHd {
        self.cell_at(x, y).map(read_attr_hd).unwrap_or_default()
    }

    pub fn glyph_at(&self, x: i32, y: i32) -> char {
        self.cell_at(x, y).map(read_glyph_hd).unwrap_or('\0')
    }

    fn write_one(&mut self, x: i32, y: i32, attr: &AttrHd, ch: char, bits: u8) {
        let old = self.cells[self.idx(x, y) + AttrHd::SIZE - 1] & special::FULLWIDTH;
        if old == special::LEADING_FULLWIDTH && x + 1 < self.width {
            let i = self.idx(x + 1, y);
            space_out_cell(&mut self.cells, i, CELL_SIZE_HD, AttrHd::SIZE);
        }
        if old == special::TRAILING_FULLWIDTH && x > 0 {
            let i = self.idx(x - 1, y);
            space_out_cell(&mut self.cells, i, CELL_SIZE_HD, AttrHd::SIZE);
        }
        let i = self.idx(x, y);
        write_cell_hd(&mut self.cells[i..i + CELL_SIZE_HD], attr, ch, bits);
    }

    /// Draw this buffer into another one, opaquely.
    pub fn draw_into(&self, dst: &mut ScreenBufferHd, opts: &DrawOptions) {
        draw_opaque(
            &self.cells,
            self.width,
            self.height,
            &mut dst.cells,
            dst.width,
            dst.height,
            CELL_SIZE_HD,
            AttrHd::SIZE,
            opts,
        );
    }

    /// Alpha-composite this buffer over another one.
    ///
    /// Fully transparent source cells are skipped; fully opaque cells under
    /// the identity blend function are copied whole. Everything else goes
    /// through the per-channel composite. Tiling and wrapping do not apply
    /// here; use [`draw_into`](Self::draw_into) for those.
    pub fn composite_into(&self, dst: &mut ScreenBufferHd, opts: &DrawOptions, blending: &Blending) {
        let src_rect = match opts.src_clip {
            Some(clip) => clamp_rect(clip, self.width, self.height),
            None => self.rect(),
        };
        if src_rect.is_null() {
            return;
        }
        let dx = opts.x - src_rect.xmin;
        let dy = opts.y - src_rect.ymin;
        let mut dst_rect = src_rect.translated(dx, dy);
        let mut bounds = Rect::of_buffer(dst.width, dst.height);
        dst_rect.clip(&mut bounds, 0, 0, false);
        let src_rect = dst_rect.translated(-dx, -dy);
        if dst_rect.is_null() {
            return;
        }
        let opacity = blending.opacity.clamp(0.0, 1.0);
        if opacity == 0.0 {
            return;
        }

        let p = RegionParams {
            src: src_rect,
            dst: dst_rect,
            src_row_width: self.width,
            dst_row_width: dst.width,
            cell_size: CELL_SIZE_HD,
        };
        for span in cell_iter(p) {
            let src_cell = &self.cells[span.src.clone()];
            let src_attr = read_attr_hd(src_cell);
            if is_fully_transparent(&src_attr) {
                continue;
            }

            let opaque = opacity == 1.0
                && src_attr.fg.a == 255
                && src_attr.bg.a == 255
                && !src_attr.style_transparency
                && !src_attr.char_transparency
                && blending.blend_fn.is_identity();
            if opaque {
                dst.cells[span.dst.clone()].copy_from_slice(src_cell);
                continue;
            }

            let composed = {
                let dst_cell = &dst.cells[span.dst.clone()];
                blend_cell(src_cell, dst_cell, opacity, blending.blend_fn)
            };
            dst.cells[span.dst.clone()].copy_from_slice(&composed);
        }
        super::repair_fullwidth_edges(
            &mut dst.cells,
            dst.width,
            dst.height,
            CELL_SIZE_HD,
            AttrHd::SIZE,
            dst_rect,
        );
    }

    /// Emit this buffer as escape sequences into a terminal sink.
    pub fn draw_to_terminal(&self, term: &mut TerminalSink, opts: &TermDrawOptions) {
        term.draw_hd(&self.cells, self.width, self.height, opts);
    }
}

fn is_fully_transparent(attr: &AttrHd) -> bool {
    attr.fg.a == 0 && attr.bg.a == 0 && attr.style_transparency && attr.char_transparency
}

fn blend_color(src: Rgba, dst: Rgba, opacity: f32, f: BlendFn) -> Rgba {
    let alpha = opacity * src.a as f32 / 255.0;
    let out_a = {
        // Screen-combine the alphas: the result is at least as opaque as
        // either input.
        let sa = (src.a as f32 * opacity).round() as u32;
        let da = dst.a as u32;
        (255 - ((255 - sa.min(255)) * (255 - da) + 127) / 255) as u8
    };
    Rgba {
        r: composite_channel(src.r, dst.r, alpha, f),
        g: composite_channel(src.g, dst.g, alpha, f),
        b: composite_channel(src.b, dst.b, alpha, f),
        a: out_a,
    }
}

fn blend_cell(src_cell: &[u8], dst_cell: &[u8], opacity: f32, f: BlendFn) -> [u8; CELL_SIZE_HD] {
    let src = read_attr_hd(src_cell);
    let dst = read_attr_hd(dst_cell);

    let mut out = dst;
    out.fg = blend_color(src.fg, dst.fg, opacity, f);
    out.bg = blend_color(src.bg, dst.bg, opacity, f);
    if !src.style_transparency {
        out.bold = src.bold;
        out.dim = src.dim;
        out.italic = src.italic;
        out.underline = src.underline;
        out.blink = src.blink;
        out.inverse = src.inverse;
        out.hidden = src.hidden;
        out.strike = src.strike;
    }
    out.style_transparency = dst.style_transparency && src.style_transparency;
    out.char_transparency = dst.char_transparency && src.char_transparency;

    let mut cell = [0u8; CELL_SIZE_HD];
    if src.char_transparency {
        // Keep the destination glyph and its pair markers.
        write_cell_hd(&mut cell, &out, '\0', dst_cell[AttrHd::SIZE - 1] & special::FULLWIDTH);
        cell[AttrHd::SIZE..AttrHd::SIZE + GLYPH_LEN]
            .copy_from_slice(&dst_cell[AttrHd::SIZE..AttrHd::SIZE + GLYPH_LEN]);
    } else {
        write_cell_hd(
            &mut cell,
            &out,
            read_glyph_hd(src_cell),
            src_cell[AttrHd::SIZE - 1] & special::FULLWIDTH,
        );
    }
    cell
}

impl CellBuffer for ScreenBufferHd {
    type Attr = AttrHd;

    fn width(&self) -> i32 {
        self.width
    }

    fn height(&self) -> i32 {
        self.height
    }

    fn cell_size(&self) -> usize {
        CELL_SIZE_HD
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

    fn put(&mut self, opts: &PutOptions, attr: &AttrHd, text: &str) {
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

    fn fill(&mut self, region: Option<Rect>, attr: &AttrHd, ch: char) {
        let mut pattern = [0u8; CELL_SIZE_HD];
        write_cell_hd(&mut pattern, attr, ch, 0);
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
            CELL_SIZE_HD,
            Some(rect),
            &pattern,
        );
        super::repair_fullwidth_edges(
            &mut self.cells,
            self.width,
            self.height,
            CELL_SIZE_HD,
            AttrHd::SIZE,
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
            CELL_SIZE_HD,
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
            CELL_SIZE_HD,
            AttrHd::SIZE,
            dst_rect,
        );
    }

    fn v_scroll(
        &mut self,
        offset: i32,
        attr: &AttrHd,
        ymin: i32,
        ymax: i32,
        clear_new_lines: bool,
    ) {
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
            CELL_SIZE_HD,
            &pattern,
        );
        let overlap = Rect::of_buffer(self.width.min(width), self.height.min(height));
        self.width = width;
        self.height = height;
        // A narrower copy can cut a pair in half along the new right edge.
        super::repair_fullwidth_edges(
            &mut self.cells,
            width,
            height,
            CELL_SIZE_HD,
            AttrHd::SIZE,
            overlap,
        );
        self.cx = self.cx.clamp(0, width - 1);
        self.cy = self.cy.clamp(0, height - 1);
    }
}
