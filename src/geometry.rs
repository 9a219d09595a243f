//! Geometric primitives
//!
//! `Rect` is the axis-aligned integer rectangle every blit is expressed in,
//! together with the span iterators that turn a pair of mutually clipped
//! rectangles into absolute byte ranges over the flat cell arrays.
//!
//! Rectangles store inclusive corners; width/height are always derived from
//! them. A rect with `xmin > xmax` or `ymin > ymax` is "null" and every
//! operation treats it as empty.

use std::ops::Range;

/// An axis-aligned rectangle with inclusive integer corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

impl Rect {
    /// Create a rectangle from its corners.
    #[inline]
    pub const fn new(xmin: i32, ymin: i32, xmax: i32, ymax: i32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Create a rectangle from an origin and a size.
    #[inline]
    pub const fn from_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            xmin: x,
            ymin: y,
            xmax: x + width - 1,
            ymax: y + height - 1,
        }
    }

    /// The rectangle covering a whole buffer in 0-based coordinates,
    /// `{0, 0, width-1, height-1}`.
    #[inline]
    pub const fn of_buffer(width: i32, height: i32) -> Self {
        Self::new(0, 0, width - 1, height - 1)
    }

    /// The rectangle covering a whole terminal in 1-based coordinates,
    /// `{1, 1, width, height}`.
    #[inline]
    pub const fn of_terminal(width: i32, height: i32) -> Self {
        Self::new(1, 1, width, height)
    }

    /// Width in cells. Negative or zero for null rects.
    #[inline]
    pub const fn width(&self) -> i32 {
        self.xmax - self.xmin + 1
    }

    /// Height in cells. Negative or zero for null rects.
    #[inline]
    pub const fn height(&self) -> i32 {
        self.ymax - self.ymin + 1
    }

    /// True iff the rectangle is inverted on either axis and therefore empty.
    #[inline]
    pub const fn is_null(&self) -> bool {
        self.xmin > self.xmax || self.ymin > self.ymax
    }

    /// Area in cells, zero for null rects.
    #[inline]
    pub fn area(&self) -> i64 {
        if self.is_null() {
            0
        } else {
            self.width() as i64 * self.height() as i64
        }
    }

    /// Adjust `xmax`/`ymax` from the min corner and the given size.
    ///
    /// This is the only mutator that touches size directly; everything else
    /// goes through the corners.
    #[inline]
    pub fn set_size(&mut self, width: i32, height: i32) {
        self.xmax = self.xmin + width - 1;
        self.ymax = self.ymin + height - 1;
    }

    /// Check if a point is inside the rectangle.
    #[inline]
    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }

    /// Translate the rectangle by an offset.
    #[inline]
    pub const fn translated(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.xmin + dx, self.ymin + dy, self.xmax + dx, self.ymax + dy)
    }

    /// Intersect `self` with `other` translated by `(dx, dy)`.
    ///
    /// If `also_clip_other` is set, `other` is shrunk to the overlap expressed
    /// in its own coordinate space. A blit must clip in *both* directions
    /// (source against destination and vice versa) before touching any cell,
    /// so that it can never read or write outside either buffer.
    pub fn clip(&mut self, other: &mut Rect, dx: i32, dy: i32, also_clip_other: bool) {
        self.xmin = self.xmin.max(other.xmin + dx);
        self.ymin = self.ymin.max(other.ymin + dy);
        self.xmax = self.xmax.min(other.xmax + dx);
        self.ymax = self.ymax.min(other.ymax + dy);

        if also_clip_other {
            other.xmin = self.xmin - dx;
            other.ymin = self.ymin - dy;
            other.xmax = self.xmax - dx;
            other.ymax = self.ymax - dy;
        }
    }

    /// Grow `self` to the union bounding box of both rectangles.
    pub fn merge(&mut self, other: &Rect) {
        if other.is_null() {
            return;
        }
        if self.is_null() {
            *self = *other;
            return;
        }
        self.xmin = self.xmin.min(other.xmin);
        self.ymin = self.ymin.min(other.ymin);
        self.xmax = self.xmax.max(other.xmax);
        self.ymax = self.ymax.max(other.ymax);
    }
}

/// One sub-blit of a modulo-wrapped (toroidal) draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapChunk {
    /// Region of the source, in source coordinates.
    pub src: Rect,
    /// Same-sized region of the destination, in destination coordinates.
    pub dst: Rect,
}

/// Parameters for [`wrapping_rect`].
#[derive(Debug, Clone, Copy)]
pub struct WrapParams {
    /// Source region to place.
    pub src: Rect,
    /// Destination region to tile into.
    pub dst: Rect,
    /// Placement offset of the source inside the destination; may be out of
    /// range, it is reduced modulo the destination size.
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Split an out-of-range placement into up to four in-range sub-blits.
///
/// The North-West chunk is always produced; East and South chunks only when
/// the NW chunk did not cover the full source extent along that axis, and the
/// South-East chunk only when both wrapped. Source cells that would tile more
/// than once are dropped, so the chunks never overlap inside `dst`.
pub fn wrapping_rect(p: &WrapParams) -> Vec<WrapChunk> {
    let mut chunks = Vec::with_capacity(4);

    if p.src.is_null() || p.dst.is_null() {
        return chunks;
    }

    let dst_w = p.dst.width();
    let dst_h = p.dst.height();
    let ox = p.offset_x.rem_euclid(dst_w);
    let oy = p.offset_y.rem_euclid(dst_h);

    let src_w = p.src.width();
    let src_h = p.src.height();

    // North-West: the unwrapped part.
    let nw_w = src_w.min(dst_w - ox);
    let nw_h = src_h.min(dst_h - oy);
    chunks.push(WrapChunk {
        src: Rect::from_size(p.src.xmin, p.src.ymin, nw_w, nw_h),
        dst: Rect::from_size(p.dst.xmin + ox, p.dst.ymin + oy, nw_w, nw_h),
    });

    // East: columns wrapped back to the left edge.
    let e_w = (src_w - nw_w).min(ox);
    if e_w > 0 {
        chunks.push(WrapChunk {
            src: Rect::from_size(p.src.xmin + nw_w, p.src.ymin, e_w, nw_h),
            dst: Rect::from_size(p.dst.xmin, p.dst.ymin + oy, e_w, nw_h),
        });
    }

    // South: rows wrapped back to the top edge.
    let s_h = (src_h - nw_h).min(oy);
    if s_h > 0 {
        chunks.push(WrapChunk {
            src: Rect::from_size(p.src.xmin, p.src.ymin + nw_h, nw_w, s_h),
            dst: Rect::from_size(p.dst.xmin + ox, p.dst.ymin, nw_w, s_h),
        });
    }

    // South-East: only when both axes wrapped.
    if e_w > 0 && s_h > 0 {
        chunks.push(WrapChunk {
            src: Rect::from_size(p.src.xmin + nw_w, p.src.ymin + nw_h, e_w, s_h),
            dst: Rect::from_size(p.dst.xmin, p.dst.ymin, e_w, s_h),
        });
    }

    chunks
}

/// Parameters shared by the span iterators.
///
/// `src` and `dst` must already be mutually clipped to the same size; the
/// iterators yield nothing when they are not. `cell_size` is the per-cell
/// byte stride of both arrays, and the row widths are in cells.
#[derive(Debug, Clone, Copy)]
pub struct RegionParams {
    pub src: Rect,
    pub dst: Rect,
    pub src_row_width: i32,
    pub dst_row_width: i32,
    pub cell_size: usize,
}

impl RegionParams {
    fn usable(&self) -> bool {
        !self.src.is_null()
            && !self.dst.is_null()
            && self.src.width() == self.dst.width()
            && self.src.height() == self.dst.height()
            && self.src.xmin >= 0
            && self.src.ymin >= 0
            && self.dst.xmin >= 0
            && self.dst.ymin >= 0
    }

    #[inline]
    fn src_offset(&self, x: i32, y: i32) -> usize {
        (y as usize * self.src_row_width as usize + x as usize) * self.cell_size
    }

    #[inline]
    fn dst_offset(&self, x: i32, y: i32) -> usize {
        (y as usize * self.dst_row_width as usize + x as usize) * self.cell_size
    }
}

/// Byte ranges for one scanline (or one cell) of a blit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSpan {
    pub src: Range<usize>,
    pub dst: Range<usize>,
}

/// Top-to-bottom scanline iterator, the fast path for opaque copies.
#[derive(Debug)]
pub struct RegionIter {
    p: RegionParams,
    row: i32,
    done: bool,
}

/// Create a [`RegionIter`] over already clipped rectangles.
pub fn region_iter(p: RegionParams) -> RegionIter {
    let done = !p.usable();
    RegionIter { p, row: 0, done }
}

impl Iterator for RegionIter {
    type Item = LineSpan;

    fn next(&mut self) -> Option<LineSpan> {
        if self.done || self.row >= self.p.src.height() {
            return None;
        }
        let row = self.row;
        self.row += 1;
        Some(line_span(&self.p, row))
    }
}

/// Bottom-to-top scanline iterator.
///
/// Required when copying a region onto itself with a downward offset: rows
/// must be read before they are overwritten.
#[derive(Debug)]
pub struct RegionIterRev {
    p: RegionParams,
    row: i32,
    done: bool,
}

/// Create a [`RegionIterRev`] over already clipped rectangles.
pub fn region_iter_rev(p: RegionParams) -> RegionIterRev {
    let done = !p.usable();
    let row = if done { 0 } else { p.src.height() - 1 };
    RegionIterRev { p, row, done }
}

impl Iterator for RegionIterRev {
    type Item = LineSpan;

    fn next(&mut self) -> Option<LineSpan> {
        if self.done || self.row < 0 {
            return None;
        }
        let row = self.row;
        self.row -= 1;
        Some(line_span(&self.p, row))
    }
}

fn line_span(p: &RegionParams, row: i32) -> LineSpan {
    let width = p.src.width() as usize * p.cell_size;
    let src_start = p.src_offset(p.src.xmin, p.src.ymin + row);
    let dst_start = p.dst_offset(p.dst.xmin, p.dst.ymin + row);
    LineSpan {
        src: src_start..src_start + width,
        dst: dst_start..dst_start + width,
    }
}

/// One cell of a per-cell blit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellSpan {
    pub src: Range<usize>,
    pub dst: Range<usize>,
    /// Destination coordinates of the cell.
    pub x: i32,
    pub y: i32,
    /// First cell of a blit line; a trailing full-width half landing here
    /// has lost its lead.
    pub start_of_line: bool,
    /// Last cell of a blit line; a leading full-width half landing here has
    /// lost its tail.
    pub end_of_line: bool,
}

/// Per-cell iterator, used for compositing and full-width-aware copies.
#[derive(Debug)]
pub struct CellIter {
    p: RegionParams,
    col: i32,
    row: i32,
    skip_pending: bool,
    done: bool,
}

/// Create a [`CellIter`] over already clipped rectangles.
pub fn cell_iter(p: RegionParams) -> CellIter {
    let done = !p.usable();
    CellIter {
        p,
        col: 0,
        row: 0,
        skip_pending: false,
        done,
    }
}

impl CellIter {
    /// Skip the next cell of the current line.
    ///
    /// Called by a consumer that just wrote a full-width lead; the trailing
    /// half is part of the same glyph and must not be re-copied.
    pub fn skip_next(&mut self) {
        self.skip_pending = true;
    }

    fn advance(&mut self) {
        self.col += 1;
        if self.col >= self.p.src.width() {
            self.col = 0;
            self.row += 1;
        }
    }
}

impl Iterator for CellIter {
    type Item = CellSpan;

    fn next(&mut self) -> Option<CellSpan> {
        if self.done {
            return None;
        }
        if self.skip_pending {
            self.skip_pending = false;
            // A skip never crosses a line boundary.
            if self.col < self.p.src.width() - 1 {
                self.col += 1;
            } else {
                self.col = 0;
                self.row += 1;
            }
        }
        if self.row >= self.p.src.height() {
            return None;
        }

        let (col, row) = (self.col, self.row);
        let width = self.p.src.width();
        let src_start = self
            .p
            .src_offset(self.p.src.xmin + col, self.p.src.ymin + row);
        let dst_start = self
            .p
            .dst_offset(self.p.dst.xmin + col, self.p.dst.ymin + row);
        let span = CellSpan {
            src: src_start..src_start + self.p.cell_size,
            dst: dst_start..dst_start + self.p.cell_size,
            x: self.p.dst.xmin + col,
            y: self.p.dst.ymin + row,
            start_of_line: col == 0,
            end_of_line: col == width - 1,
        };
        self.advance();
        Some(span)
    }
}

/// Parameters for [`tile_iter`]: the destination is walked cell by cell and
/// source coordinates wrap modulo the source size instead of clipping.
#[derive(Debug, Clone, Copy)]
pub struct TileParams {
    pub src: Rect,
    pub dst: Rect,
    pub src_row_width: i32,
    pub dst_row_width: i32,
    pub cell_size: usize,
    /// Phase of the tiling pattern.
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Per-cell tiling iterator for repeating fills.
#[derive(Debug)]
pub struct TileIter {
    p: TileParams,
    col: i32,
    row: i32,
    done: bool,
}

/// Create a [`TileIter`]. The destination rect must lie inside the
/// destination buffer; the source rect may be any non-null region.
pub fn tile_iter(p: TileParams) -> TileIter {
    let done = p.src.is_null()
        || p.dst.is_null()
        || p.src.xmin < 0
        || p.src.ymin < 0
        || p.dst.xmin < 0
        || p.dst.ymin < 0;
    TileIter {
        p,
        col: 0,
        row: 0,
        done,
    }
}

impl Iterator for TileIter {
    type Item = LineSpan;

    fn next(&mut self) -> Option<LineSpan> {
        if self.done || self.row >= self.p.dst.height() {
            return None;
        }

        let x = self.p.dst.xmin + self.col;
        let y = self.p.dst.ymin + self.row;
        let sx = self.p.src.xmin + (self.col - self.p.offset_x).rem_euclid(self.p.src.width());
        let sy = self.p.src.ymin + (self.row - self.p.offset_y).rem_euclid(self.p.src.height());

        let src_start =
            (sy as usize * self.p.src_row_width as usize + sx as usize) * self.p.cell_size;
        let dst_start =
            (y as usize * self.p.dst_row_width as usize + x as usize) * self.p.cell_size;

        self.col += 1;
        if self.col >= self.p.dst.width() {
            self.col = 0;
            self.row += 1;
        }

        Some(LineSpan {
            src: src_start..src_start + self.p.cell_size,
            dst: dst_start..dst_start + self.p.cell_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_size_derivation() {
        let r = Rect::new(2, 3, 5, 7);
        assert_eq!(r.width(), 4);
        assert_eq!(r.height(), 5);
        assert!(!r.is_null());
        assert_eq!(r.area(), 20);
    }

    #[test]
    fn rect_null_when_inverted() {
        assert!(Rect::new(5, 0, 4, 10).is_null());
        assert!(Rect::new(0, 5, 10, 4).is_null());
        assert_eq!(Rect::new(5, 0, 4, 10).area(), 0);
    }

    #[test]
    fn rect_from_size_and_set_size() {
        let mut r = Rect::from_size(1, 1, 8, 3);
        assert_eq!(r, Rect::new(1, 1, 8, 3));
        r.set_size(2, 2);
        assert_eq!(r, Rect::new(1, 1, 2, 2));
    }

    #[test]
    fn rect_buffer_and_terminal_conventions() {
        assert_eq!(Rect::of_buffer(80, 24), Rect::new(0, 0, 79, 23));
        assert_eq!(Rect::of_terminal(80, 24), Rect::new(1, 1, 80, 24));
    }

    #[test]
    fn clip_self_is_identity() {
        let mut a = Rect::new(2, 3, 10, 12);
        let mut b = a;
        a.clip(&mut b, 0, 0, false);
        assert_eq!(a, Rect::new(2, 3, 10, 12));
    }

    #[test]
    fn clip_both_directions() {
        // Source 4x4 placed at (-2,-2) in an 8x8 destination.
        let mut dst = Rect::of_buffer(8, 8);
        let mut src = Rect::of_buffer(4, 4);
        dst.clip(&mut src, -2, -2, true);
        assert_eq!(dst, Rect::new(0, 0, 1, 1));
        assert_eq!(src, Rect::new(2, 2, 3, 3));
    }

    #[test]
    fn clip_disjoint_is_null() {
        let mut dst = Rect::of_buffer(4, 4);
        let mut src = Rect::of_buffer(2, 2);
        dst.clip(&mut src, 10, 10, true);
        assert!(dst.is_null());
        assert!(src.is_null());
    }

    #[test]
    fn merge_grows_to_union() {
        let mut a = Rect::new(0, 0, 2, 2);
        a.merge(&Rect::new(5, 1, 6, 8));
        assert_eq!(a, Rect::new(0, 0, 6, 8));
    }

    #[test]
    fn merge_with_null_is_noop() {
        let mut a = Rect::new(0, 0, 2, 2);
        a.merge(&Rect::new(3, 3, 1, 1));
        assert_eq!(a, Rect::new(0, 0, 2, 2));
    }

    #[test]
    fn wrapping_rect_no_wrap_single_chunk() {
        let chunks = wrapping_rect(&WrapParams {
            src: Rect::of_buffer(2, 2),
            dst: Rect::of_buffer(8, 8),
            offset_x: 3,
            offset_y: 3,
        });
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].dst, Rect::new(3, 3, 4, 4));
        assert_eq!(chunks[0].src, Rect::new(0, 0, 1, 1));
    }

    #[test]
    fn wrapping_rect_east_wrap() {
        let chunks = wrapping_rect(&WrapParams {
            src: Rect::of_buffer(4, 2),
            dst: Rect::of_buffer(8, 8),
            offset_x: 6,
            offset_y: 0,
        });
        assert_eq!(chunks.len(), 2);
        // NW: source columns 0..1 at destination x 6..7.
        assert_eq!(chunks[0].dst, Rect::new(6, 0, 7, 1));
        assert_eq!(chunks[0].src, Rect::new(0, 0, 1, 1));
        // East: source columns 2..3 wrapped to destination x 0..1.
        assert_eq!(chunks[1].dst, Rect::new(0, 0, 1, 1));
        assert_eq!(chunks[1].src, Rect::new(2, 0, 3, 1));
    }

    #[test]
    fn wrapping_rect_four_chunks() {
        let chunks = wrapping_rect(&WrapParams {
            src: Rect::of_buffer(4, 4),
            dst: Rect::of_buffer(8, 8),
            offset_x: 6,
            offset_y: 6,
        });
        assert_eq!(chunks.len(), 4);
        let total: i64 = chunks.iter().map(|c| c.dst.area()).sum();
        assert_eq!(total, 16);
        for c in &chunks {
            assert_eq!(c.src.area(), c.dst.area());
        }
    }

    #[test]
    fn wrapping_rect_negative_offset_reduced() {
        let chunks = wrapping_rect(&WrapParams {
            src: Rect::of_buffer(2, 2),
            dst: Rect::of_buffer(8, 8),
            offset_x: -7, // == 1 mod 8
            offset_y: -16, // == 0 mod 8
        });
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].dst, Rect::new(1, 0, 2, 1));
    }

    #[test]
    fn region_iter_spans() {
        // Copy a 2x2 region from a 4-wide source to a 6-wide destination.
        let p = RegionParams {
            src: Rect::new(1, 1, 2, 2),
            dst: Rect::new(3, 0, 4, 1),
            src_row_width: 4,
            dst_row_width: 6,
            cell_size: 2,
        };
        let spans: Vec<_> = region_iter(p).collect();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].src, 10..14); // (1*4+1)*2
        assert_eq!(spans[0].dst, 6..10); // (0*6+3)*2
        assert_eq!(spans[1].src, 18..22);
        assert_eq!(spans[1].dst, 18..22);
    }

    #[test]
    fn region_iter_rev_bottom_up() {
        let p = RegionParams {
            src: Rect::new(0, 0, 1, 1),
            dst: Rect::new(0, 2, 1, 3),
            src_row_width: 2,
            dst_row_width: 2,
            cell_size: 1,
        };
        let rows: Vec<_> = region_iter_rev(p).map(|s| s.src.start).collect();
        assert_eq!(rows, vec![2, 0]);
    }

    #[test]
    fn region_iter_null_rect_yields_nothing() {
        let p = RegionParams {
            src: Rect::new(2, 2, 1, 1),
            dst: Rect::new(2, 2, 1, 1),
            src_row_width: 4,
            dst_row_width: 4,
            cell_size: 8,
        };
        assert_eq!(region_iter(p).count(), 0);
        assert_eq!(region_iter_rev(p).count(), 0);
        assert_eq!(cell_iter(p).count(), 0);
    }

    #[test]
    fn region_iter_mismatched_sizes_yields_nothing() {
        let p = RegionParams {
            src: Rect::of_buffer(2, 2),
            dst: Rect::of_buffer(3, 2),
            src_row_width: 4,
            dst_row_width: 4,
            cell_size: 1,
        };
        assert_eq!(region_iter(p).count(), 0);
    }

    #[test]
    fn cell_iter_flags_and_skip() {
        let p = RegionParams {
            src: Rect::of_buffer(3, 2),
            dst: Rect::of_buffer(3, 2),
            src_row_width: 3,
            dst_row_width: 3,
            cell_size: 1,
        };
        let mut it = cell_iter(p);

        let first = it.next().unwrap();
        assert!(first.start_of_line);
        assert!(!first.end_of_line);

        // Pretend the first cell was a full-width lead: skip its tail.
        it.skip_next();
        let third = it.next().unwrap();
        assert_eq!(third.x, 2);
        assert!(third.end_of_line);

        // Next line restarts at column 0.
        let fourth = it.next().unwrap();
        assert_eq!((fourth.x, fourth.y), (0, 1));
        assert!(fourth.start_of_line);
    }

    #[test]
    fn cell_iter_skip_at_line_end_moves_to_next_line() {
        let p = RegionParams {
            src: Rect::of_buffer(2, 2),
            dst: Rect::of_buffer(2, 2),
            src_row_width: 2,
            dst_row_width: 2,
            cell_size: 1,
        };
        let mut it = cell_iter(p);
        it.next().unwrap(); // (0,0)
        it.next().unwrap(); // (1,0)
        it.skip_next(); // would skip (0,1)
        let c = it.next().unwrap();
        assert_eq!((c.x, c.y), (1, 1));
    }

    #[test]
    fn tile_iter_wraps_source_coordinates() {
        let p = TileParams {
            src: Rect::of_buffer(2, 1),
            dst: Rect::of_buffer(5, 1),
            src_row_width: 2,
            dst_row_width: 5,
            cell_size: 1,
            offset_x: 0,
            offset_y: 0,
        };
        let srcs: Vec<_> = tile_iter(p).map(|s| s.src.start).collect();
        assert_eq!(srcs, vec![0, 1, 0, 1, 0]);
    }

    #[test]
    fn tile_iter_phase_offset() {
        let p = TileParams {
            src: Rect::of_buffer(3, 1),
            dst: Rect::of_buffer(3, 1),
            src_row_width: 3,
            dst_row_width: 3,
            cell_size: 1,
            offset_x: 1,
            offset_y: 0,
        };
        let srcs: Vec<_> = tile_iter(p).map(|s| s.src.start).collect();
        assert_eq!(srcs, vec![2, 0, 1]);
    }
}
