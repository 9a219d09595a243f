//! Cell-addressed framebuffers
//!
//! A buffer is a flat byte array of fixed-size cell records plus a cursor
//! and a wrap flag. Two concrete buffers share one operation surface through
//! the [`CellBuffer`] trait: [`ScreenBuffer`] with 8-byte indexed-color cells
//! and [`ScreenBufferHd`] with 14-byte RGBA cells and alpha compositing.
//! The geometric plumbing is free functions parameterized over the cell byte
//! size; there is no inherited behavior between the two.
//!
//! All operations clamp out-of-range geometry and no-op on null rects; the
//! redraw path never raises.

pub mod attr;
pub mod blend;
pub mod cell;
mod hd;
mod screen;
pub mod snapshot;
mod term;

pub use attr::{Attr, AttrHd, Palette, Rgba};
pub use blend::BlendFn;
pub use hd::{Blending, ScreenBufferHd};
pub use screen::ScreenBuffer;
pub use term::TerminalSink;

use unicode_width::UnicodeWidthChar;

use crate::geometry::{
    region_iter, region_iter_rev, tile_iter, wrapping_rect, Rect, RegionParams, TileParams,
    WrapParams,
};
use attr::special;
use cell::GLYPH_LEN;

/// Direction vector for [`CellBuffer::put`] runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Right,
    Left,
    Up,
    Down,
    /// Write every glyph at the same position.
    None,
}

/// Placement options for a `put` run.
#[derive(Debug, Clone, Copy)]
pub struct PutOptions {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    /// Overrides the buffer's wrap flag when set.
    pub wrap: Option<bool>,
    /// Keep `\n` as a move to `(0, y+1)` instead of stripping it. Only a
    /// higher layer that already sanitized its input asks for this.
    pub keep_newlines: bool,
}

impl PutOptions {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            direction: Direction::Right,
            wrap: None,
            keep_newlines: false,
        }
    }
}

/// Options for a buffer-to-buffer draw.
#[derive(Debug, Clone, Copy)]
pub struct DrawOptions {
    /// Placement of the source inside the destination.
    pub x: i32,
    pub y: i32,
    /// Restrict the source to a sub-rectangle.
    pub src_clip: Option<Rect>,
    /// Repeat the source over the destination instead of clipping it.
    pub tile: bool,
    /// Wrap the placement modulo the destination size (toroidal draw).
    pub wrap: bool,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            src_clip: None,
            tile: false,
            wrap: false,
        }
    }
}

/// Options for a draw into a [`TerminalSink`].
#[derive(Debug, Clone, Copy)]
pub struct TermDrawOptions {
    pub x: i32,
    pub y: i32,
    /// Only emit cells that differ from the sink's last-drawn state.
    pub delta: bool,
}

impl Default for TermDrawOptions {
    fn default() -> Self {
        Self {
            x: 0,
            y: 0,
            delta: false,
        }
    }
}

/// The operation surface shared by both color depths.
pub trait CellBuffer {
    /// Unpacked attribute type of this depth.
    type Attr;

    fn width(&self) -> i32;
    fn height(&self) -> i32;
    /// Per-cell byte stride.
    fn cell_size(&self) -> usize;
    /// The flat cell array.
    fn raw(&self) -> &[u8];
    fn cursor(&self) -> (i32, i32);
    fn set_cursor(&mut self, x: i32, y: i32);

    /// Write a run of glyphs, advancing by the direction vector.
    fn put(&mut self, opts: &PutOptions, attr: &Self::Attr, text: &str);
    /// Set every cell of `region` (whole buffer when `None`) to one value.
    fn fill(&mut self, region: Option<Rect>, attr: &Self::Attr, ch: char);
    /// Overlap-safe intra-buffer copy of `src` to `(dst_x, dst_y)`.
    fn copy_region(&mut self, src: Rect, dst_x: i32, dst_y: i32);
    /// Shift rows `[ymin, ymax]` vertically by `offset` (positive is down),
    /// filling exposed rows with `attr` when `clear_new_lines` is set.
    fn v_scroll(&mut self, offset: i32, attr: &Self::Attr, ymin: i32, ymax: i32, clear_new_lines: bool);
    /// Reallocate to a new geometry, keeping the overlapping content.
    fn resize(&mut self, width: i32, height: i32);
}

/// Clamp a rect to a buffer's extent; the result may be null.
pub(crate) fn clamp_rect(rect: Rect, width: i32, height: i32) -> Rect {
    Rect {
        xmin: rect.xmin.max(0),
        ymin: rect.ymin.max(0),
        xmax: rect.xmax.min(width - 1),
        ymax: rect.ymax.min(height - 1),
    }
}

/// Fill `region` of a flat cell array with one pre-encoded cell pattern.
pub(crate) fn fill_pattern(
    cells: &mut [u8],
    width: i32,
    height: i32,
    cell_size: usize,
    region: Option<Rect>,
    pattern: &[u8],
) {
    let rect = clamp_rect(region.unwrap_or_else(|| Rect::of_buffer(width, height)), width, height);
    if rect.is_null() {
        return;
    }
    for y in rect.ymin..=rect.ymax {
        let row = y as usize * width as usize;
        for x in rect.xmin..=rect.xmax {
            let start = (row + x as usize) * cell_size;
            cells[start..start + cell_size].copy_from_slice(pattern);
        }
    }
}

/// Overlap-safe intra-buffer region copy.
///
/// Picks forward vs reversed line traversal from the vertical offset: a
/// downward shift must copy bottom-up so rows are read before they are
/// overwritten. Horizontal overlap within one line is safe because each span
/// copy has memmove semantics.
pub(crate) fn copy_region_impl(
    cells: &mut [u8],
    width: i32,
    height: i32,
    cell_size: usize,
    src: Rect,
    dst_x: i32,
    dst_y: i32,
) {
    let dx = dst_x - src.xmin;
    let dy = dst_y - src.ymin;
    let mut src = clamp_rect(src, width, height);
    if src.is_null() || (dx == 0 && dy == 0) {
        return;
    }
    let mut dst = src.translated(dx, dy);
    let mut bounds = Rect::of_buffer(width, height);
    dst.clip(&mut bounds, 0, 0, false);
    // Shrink the source to the surviving destination extent.
    src = dst.translated(-dx, -dy);
    if dst.is_null() {
        return;
    }

    let p = RegionParams {
        src,
        dst,
        src_row_width: width,
        dst_row_width: width,
        cell_size,
    };
    if dy > 0 {
        for span in region_iter_rev(p) {
            cells.copy_within(span.src, span.dst.start);
        }
    } else {
        for span in region_iter(p) {
            cells.copy_within(span.src, span.dst.start);
        }
    }
}

/// Reallocate a cell array, copying the overlapping sub-rectangle and
/// clearing newly exposed cells with `pattern`.
pub(crate) fn resize_cells(
    cells: &[u8],
    old_w: i32,
    old_h: i32,
    new_w: i32,
    new_h: i32,
    cell_size: usize,
    pattern: &[u8],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(new_w as usize * new_h as usize * cell_size);
    for _ in 0..new_w as usize * new_h as usize {
        out.extend_from_slice(pattern);
    }
    let overlap_w = old_w.min(new_w);
    let overlap_h = old_h.min(new_h);
    if overlap_w > 0 && overlap_h > 0 {
        let overlap = Rect::of_buffer(overlap_w, overlap_h);
        let p = RegionParams {
            src: overlap,
            dst: overlap,
            src_row_width: old_w,
            dst_row_width: new_w,
            cell_size,
        };
        for span in region_iter(p) {
            out[span.dst].copy_from_slice(&cells[span.src]);
        }
    }
    out
}

/// Rewrite a cell as a plain space, clearing its full-width markers but
/// keeping its attribute.
pub(crate) fn space_out_cell(cells: &mut [u8], idx: usize, cell_size: usize, attr_size: usize) {
    let cell = &mut cells[idx..idx + cell_size];
    cell[attr_size - 1] &= !special::FULLWIDTH;
    let glyph = &mut cell[attr_size..attr_size + GLYPH_LEN];
    glyph.fill(0);
    glyph[0] = b' ';
}

/// Repair full-width pairs severed by a blit into `rect`.
///
/// A leading half whose trailing neighbor was overwritten, or a trailing
/// half whose lead lies outside the blit, is rewritten as a space so no
/// orphaned half survives.
pub(crate) fn repair_fullwidth_edges(
    cells: &mut [u8],
    width: i32,
    height: i32,
    cell_size: usize,
    attr_size: usize,
    rect: Rect,
) {
    let rect = clamp_rect(rect, width, height);
    if rect.is_null() {
        return;
    }
    let special_off = attr_size - 1;
    let bits = |cells: &[u8], x: i32, y: i32| -> u8 {
        let idx = (y as usize * width as usize + x as usize) * cell_size;
        cells[idx + special_off] & special::FULLWIDTH
    };
    let idx_of = |x: i32, y: i32| (y as usize * width as usize + x as usize) * cell_size;

    for y in rect.ymin..=rect.ymax {
        // Left edge: a trailing half at the start of the blit lost its lead,
        // and a lead just outside lost its tail.
        if bits(cells, rect.xmin, y) == special::TRAILING_FULLWIDTH {
            space_out_cell(cells, idx_of(rect.xmin, y), cell_size, attr_size);
        }
        if rect.xmin > 0 && bits(cells, rect.xmin - 1, y) == special::LEADING_FULLWIDTH {
            space_out_cell(cells, idx_of(rect.xmin - 1, y), cell_size, attr_size);
        }
        // Right edge, mirrored.
        if bits(cells, rect.xmax, y) == special::LEADING_FULLWIDTH {
            space_out_cell(cells, idx_of(rect.xmax, y), cell_size, attr_size);
        }
        if rect.xmax + 1 < width && bits(cells, rect.xmax + 1, y) == special::TRAILING_FULLWIDTH {
            space_out_cell(cells, idx_of(rect.xmax + 1, y), cell_size, attr_size);
        }
    }
}

/// Opaque buffer-to-buffer draw shared by both depths: straight line copies,
/// with optional tiling or toroidal wrapping of the placement.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_opaque(
    src: &[u8],
    src_w: i32,
    src_h: i32,
    dst: &mut [u8],
    dst_w: i32,
    dst_h: i32,
    cell_size: usize,
    attr_size: usize,
    opts: &DrawOptions,
) {
    let src_rect = match opts.src_clip {
        Some(clip) => clamp_rect(clip, src_w, src_h),
        None => Rect::of_buffer(src_w, src_h),
    };
    if src_rect.is_null() {
        return;
    }
    let dst_bounds = Rect::of_buffer(dst_w, dst_h);

    if opts.tile {
        let p = TileParams {
            src: src_rect,
            dst: dst_bounds,
            src_row_width: src_w,
            dst_row_width: dst_w,
            cell_size,
            offset_x: opts.x,
            offset_y: opts.y,
        };
        for span in tile_iter(p) {
            dst[span.dst].copy_from_slice(&src[span.src]);
        }
        repair_fullwidth_edges(dst, dst_w, dst_h, cell_size, attr_size, dst_bounds);
        return;
    }

    if opts.wrap {
        for chunk in wrapping_rect(&WrapParams {
            src: src_rect,
            dst: dst_bounds,
            offset_x: opts.x,
            offset_y: opts.y,
        }) {
            blit_rects(
                src, src_w, dst, dst_w, dst_h, cell_size, attr_size, chunk.src, chunk.dst,
            );
        }
        return;
    }

    let dst_rect = src_rect.translated(opts.x - src_rect.xmin, opts.y - src_rect.ymin);
    blit_rects(
        src, src_w, dst, dst_w, dst_h, cell_size, attr_size, src_rect, dst_rect,
    );
}

#[allow(clippy::too_many_arguments)]
fn blit_rects(
    src: &[u8],
    src_w: i32,
    dst: &mut [u8],
    dst_w: i32,
    dst_h: i32,
    cell_size: usize,
    attr_size: usize,
    mut src_rect: Rect,
    mut dst_rect: Rect,
) {
    let dx = dst_rect.xmin - src_rect.xmin;
    let dy = dst_rect.ymin - src_rect.ymin;
    let mut bounds = Rect::of_buffer(dst_w, dst_h);
    dst_rect.clip(&mut bounds, 0, 0, false);
    src_rect = dst_rect.translated(-dx, -dy);
    if dst_rect.is_null() {
        return;
    }
    let p = RegionParams {
        src: src_rect,
        dst: dst_rect,
        src_row_width: src_w,
        dst_row_width: dst_w,
        cell_size,
    };
    for span in region_iter(p) {
        dst[span.dst].copy_from_slice(&src[span.src]);
    }
    repair_fullwidth_edges(dst, dst_w, dst_h, cell_size, attr_size, dst_rect);
}

/// Shared `put` walk: strips control characters, steps the direction vector,
/// wraps rightward runs when enabled, and creates full-width pairs
/// atomically through the `write` callback `(x, y, glyph, fullwidth bits)`.
///
/// Returns the final cursor position.
pub(crate) fn put_walk(
    width: i32,
    height: i32,
    buffer_wrap: bool,
    opts: &PutOptions,
    text: &str,
    write: &mut dyn FnMut(i32, i32, char, u8),
) -> (i32, i32) {
    let wrap = opts.wrap.unwrap_or(buffer_wrap);
    let (step_x, step_y) = match opts.direction {
        Direction::Right => (1, 0),
        Direction::Left => (-1, 0),
        Direction::Up => (0, -1),
        Direction::Down => (0, 1),
        Direction::None => (0, 0),
    };
    let mut x = opts.x.clamp(0, width - 1);
    let mut y = opts.y.clamp(0, height - 1);

    for ch in text.chars() {
        if ch == '\n' && opts.keep_newlines {
            x = 0;
            y = (y + 1).min(height - 1);
            continue;
        }
        // Control characters never reach the grid.
        if (ch as u32) < 0x20 || ch == '\u{7f}' {
            continue;
        }

        let glyph_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if glyph_width == 0 {
            // A packed cell holds exactly one scalar; combining marks are
            // dropped.
            continue;
        }

        if glyph_width == 2 && matches!(opts.direction, Direction::Right | Direction::None) {
            // The pair must be created together or not at all.
            if x + 1 >= width {
                if wrap && matches!(opts.direction, Direction::Right) && y + 1 < height {
                    x = 0;
                    y += 1;
                } else {
                    write(x, y, ' ', 0);
                    break;
                }
            }
            write(x, y, ch, special::LEADING_FULLWIDTH);
            write(x + 1, y, ' ', special::TRAILING_FULLWIDTH);
            if matches!(opts.direction, Direction::None) {
                continue;
            }
            x += 2;
        } else {
            let ch = if glyph_width == 2 { ' ' } else { ch };
            write(x, y, ch, 0);
            x += step_x;
            y += step_y;
        }

        if x >= width {
            if wrap && matches!(opts.direction, Direction::Right) {
                x = 0;
                y += 1;
                if y >= height {
                    y = height - 1;
                    break;
                }
            } else {
                x = width - 1;
                break;
            }
        }
        if x < 0 {
            x = 0;
            break;
        }
        if y < 0 {
            y = 0;
            break;
        }
        if y >= height {
            y = height - 1;
            break;
        }
    }

    (x.clamp(0, width - 1), y.clamp(0, height - 1))
}
