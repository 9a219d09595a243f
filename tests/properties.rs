//! Property tests for the geometric and codec invariants.

use proptest::prelude::*;

use termframe::buffer::cell::{decode_glyph, encode_glyph, GLYPH_LEN};
use termframe::geometry::{wrapping_rect, WrapParams};
use termframe::{
    Attr, BlendFn, CellBuffer, Event, PutOptions, Rect, ScreenBuffer, SequenceDecoder,
};

fn arb_rect() -> impl Strategy<Value = Rect> {
    (-20i32..20, -20i32..20, -20i32..20, -20i32..20)
        .prop_map(|(a, b, c, d)| Rect::new(a, b, c, d))
}

fn arb_attr() -> impl Strategy<Value = Attr> {
    (any::<u8>(), any::<u8>(), any::<u8>(), 0u8..16).prop_map(|(fg, bg, style, sp)| {
        let mut bytes = Attr { fg, bg, ..Attr::default() }.encode();
        bytes[2] = style;
        bytes[3] = sp;
        Attr::decode(bytes)
    })
}

proptest! {
    #[test]
    fn clip_is_idempotent(mut a in arb_rect(), b in arb_rect(), dx in -10i32..10, dy in -10i32..10) {
        let mut b1 = b;
        a.clip(&mut b1, dx, dy, false);
        let once = a;
        let mut b2 = b;
        a.clip(&mut b2, dx, dy, false);
        prop_assert_eq!(a, once);
    }

    #[test]
    fn clip_result_fits_both(a in arb_rect(), b in arb_rect(), dx in -10i32..10, dy in -10i32..10) {
        let mut clipped = a;
        let mut other = b;
        clipped.clip(&mut other, dx, dy, true);
        if !clipped.is_null() {
            prop_assert!(clipped.xmin >= a.xmin && clipped.xmax <= a.xmax);
            prop_assert!(clipped.ymin >= a.ymin && clipped.ymax <= a.ymax);
            // The mirrored rect is the same region in the other space.
            prop_assert_eq!(clipped.width(), other.width());
            prop_assert_eq!(clipped.height(), other.height());
        }
    }

    #[test]
    fn wrapping_chunks_tile_exactly(
        src_w in 1i32..10, src_h in 1i32..10,
        dst_w in 1i32..12, dst_h in 1i32..12,
        ox in -30i32..30, oy in -30i32..30,
    ) {
        let chunks = wrapping_rect(&WrapParams {
            src: Rect::of_buffer(src_w, src_h),
            dst: Rect::of_buffer(dst_w, dst_h),
            offset_x: ox,
            offset_y: oy,
        });
        // Each destination cell is covered at most once, each chunk maps a
        // same-sized source region, and everything lands inside dst.
        let mut covered = vec![false; (dst_w * dst_h) as usize];
        for c in &chunks {
            prop_assert_eq!(c.src.width(), c.dst.width());
            prop_assert_eq!(c.src.height(), c.dst.height());
            prop_assert!(c.dst.xmin >= 0 && c.dst.xmax < dst_w);
            prop_assert!(c.dst.ymin >= 0 && c.dst.ymax < dst_h);
            prop_assert!(c.src.xmin >= 0 && c.src.xmax < src_w);
            prop_assert!(c.src.ymin >= 0 && c.src.ymax < src_h);
            for y in c.dst.ymin..=c.dst.ymax {
                for x in c.dst.xmin..=c.dst.xmax {
                    let i = (y * dst_w + x) as usize;
                    prop_assert!(!covered[i], "cell ({x},{y}) covered twice");
                    covered[i] = true;
                }
            }
        }
        // When the source fits, it is placed in full.
        if src_w <= dst_w && src_h <= dst_h {
            let placed: i64 = chunks.iter().map(|c| c.dst.area()).sum();
            prop_assert_eq!(placed, (src_w * src_h) as i64);
        }
    }

    #[test]
    fn attr_roundtrips(attr in arb_attr()) {
        prop_assert_eq!(Attr::decode(attr.encode()), attr);
    }

    #[test]
    fn glyph_roundtrips(ch in any::<char>()) {
        let mut buf = [0u8; GLYPH_LEN];
        encode_glyph(ch, &mut buf);
        prop_assert_eq!(decode_glyph(&buf), ch);
    }

    #[test]
    fn blend_alpha_extremes(s in any::<u8>(), d in any::<u8>()) {
        use termframe::buffer::blend::composite_channel;
        prop_assert_eq!(composite_channel(s, d, 0.0, BlendFn::Normal), d);
        prop_assert_eq!(composite_channel(s, d, 1.0, BlendFn::Normal), s);
        // Every blend function stays within channel range by construction;
        // exercise them all for panics.
        for f in [BlendFn::Multiply, BlendFn::Screen, BlendFn::Overlay,
                  BlendFn::HardLight, BlendFn::SoftLight] {
            let _ = composite_channel(s, d, 0.5, f);
        }
    }

    #[test]
    fn put_stays_in_bounds(
        w in 1i32..12, h in 1i32..8,
        x in -5i32..15, y in -5i32..10,
        text in "\\PC{0,20}",
    ) {
        let mut buf = ScreenBuffer::new(w, h);
        buf.put(&PutOptions::at(x, y), &Attr::default(), &text);
        let (cx, cy) = buf.cursor();
        prop_assert!(cx >= 0 && cx < w);
        prop_assert!(cy >= 0 && cy < h);
        prop_assert_eq!(buf.raw().len(), (w * h) as usize * buf.cell_size());
    }

    #[test]
    fn decoder_is_split_invariant(
        bytes in proptest::collection::vec(any::<u8>(), 0..64),
        split in 0usize..64,
    ) {
        let mut whole = SequenceDecoder::new();
        let all = whole.feed(&bytes);

        let split = split.min(bytes.len());
        let mut parts = SequenceDecoder::new();
        let mut events = parts.feed(&bytes[..split]);
        events.extend(parts.feed(&bytes[split..]));
        prop_assert_eq!(events, all);
    }

    #[test]
    fn decoder_never_drops_plain_text(text in "[ -~]{0,40}") {
        let events = SequenceDecoder::new().feed(text.as_bytes());
        let printed: String = events.iter().filter_map(|e| match e {
            Event::Print(c) => Some(*c),
            _ => None,
        }).collect();
        prop_assert_eq!(printed, text);
    }

    #[test]
    fn v_scroll_round_trip_restores_surviving_rows(
        h in 3i32..8,
        n in 1i32..4,
        ymin in 0i32..3,
    ) {
        let w = 4;
        let mut buf = ScreenBuffer::new(w, h);
        for y in 0..h {
            buf.put(&PutOptions::at(0, y), &Attr::default(), &format!("{y}{y}{y}{y}"));
        }
        let ymin = ymin.min(h - 2);
        let ymax = h - 1;
        let n = n.min(ymax - ymin);
        let before: Vec<String> = (0..h).map(|y| buf.row_text(y)).collect();
        buf.v_scroll(n, &Attr::default(), ymin, ymax, true);
        buf.v_scroll(-n, &Attr::default(), ymin, ymax, true);
        // Rows that stayed inside the region through both shifts come back.
        for y in ymin..=ymax - n {
            prop_assert_eq!(&buf.row_text(y), &before[y as usize]);
        }
    }

    #[test]
    fn v_scroll_keeps_unscrolled_rows(
        h in 2i32..8,
        offset in -3i32..4,
        ymin in 0i32..4,
    ) {
        let w = 4;
        let mut buf = ScreenBuffer::new(w, h);
        for y in 0..h {
            buf.put(&PutOptions::at(0, y), &Attr::default(), &format!("{y}{y}{y}{y}"));
        }
        let ymin = ymin.min(h - 1);
        let ymax = h - 1;
        let before: Vec<String> = (0..h).map(|y| buf.row_text(y)).collect();
        buf.v_scroll(offset, &Attr::default(), ymin, ymax, true);
        // Rows outside the region are untouched.
        for y in 0..ymin {
            prop_assert_eq!(&buf.row_text(y), &before[y as usize]);
        }
    }
}
