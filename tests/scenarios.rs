//! End-to-end scenarios across the decoder, emulator, buffers, and sink.

use termframe::{
    Attr, CellBuffer, DrawOptions, Emulator, Event, PutOptions, Rect, ScreenBuffer,
    SequenceDecoder, TermDrawOptions, TerminalSink,
};

/// Opt-in trace output for debugging failing scenarios (`RUST_LOG=trace`).
fn trace_init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn delta_bytes(screen: &ScreenBuffer, sink: &mut TerminalSink) -> String {
    screen.draw_to_terminal(
        sink,
        &TermDrawOptions {
            x: 0,
            y: 0,
            delta: true,
        },
    );
    String::from_utf8(sink.take_bytes()).unwrap()
}

#[test]
fn styled_text_reaches_the_terminal_with_one_sgr() {
    trace_init();
    let mut emu = Emulator::new(20, 5);
    emu.feed(b"\x1b[31mAB");

    let mut sink = TerminalSink::new(20, 5);
    let out = delta_bytes(emu.screen(), &mut sink);

    // One cursor move, one attribute change, the two glyphs.
    assert_eq!(out.matches('H').count(), 1);
    assert_eq!(out.matches('m').count(), 1);
    assert!(out.contains("\x1b[0;31;40m"));
    assert!(out.ends_with("AB"));

    // Nothing more to send for an unchanged frame.
    assert!(delta_bytes(emu.screen(), &mut sink).is_empty());
}

#[test]
fn editor_like_session() {
    let mut emu = Emulator::new(10, 4);
    emu.feed(b"line one\r\nline two\r\nline 3");
    // Go back and correct line two.
    emu.feed(b"\x1b[2;6H\x1b[Ktwo!");
    assert_eq!(emu.screen().row_text(0), "line one  ");
    assert_eq!(emu.screen().row_text(1), "line two! ");
    assert_eq!(emu.screen().row_text(2), "line 3    ");
}

#[test]
fn scrolling_region_log_pane() {
    let mut emu = Emulator::new(8, 5);
    // Static header on row 1, log confined to rows 2-5.
    emu.feed(b"header\x1b[2;5r\x1b[2;1H");
    for i in 0..6 {
        emu.feed(format!("log {}\r\n", i).as_bytes());
    }
    assert_eq!(emu.screen().row_text(0), "header  ");
    // Six lines through a four-row pane: the last four remain, with the
    // final line feed leaving the bottom row blank.
    assert_eq!(emu.screen().row_text(1), "log 3   ");
    assert_eq!(emu.screen().row_text(2), "log 4   ");
    assert_eq!(emu.screen().row_text(3), "log 5   ");
    assert_eq!(emu.screen().row_text(4), "        ");
}

#[test]
fn wrapped_draw_covers_every_cell_exactly_once() {
    // Fill a source with distinct glyphs, draw it wrapped at an awkward
    // offset, and verify the destination is a permutation of the source.
    let mut src = ScreenBuffer::new(4, 3);
    let mut counter = b'a';
    for y in 0..3 {
        for x in 0..4 {
            src.put(
                &PutOptions::at(x, y),
                &Attr::default(),
                &(counter as char).to_string(),
            );
            counter += 1;
        }
    }
    let mut dst = ScreenBuffer::new(4, 3);
    src.draw_into(
        &mut dst,
        &DrawOptions {
            x: 3,
            y: 2,
            wrap: true,
            ..DrawOptions::default()
        },
    );

    let mut seen: Vec<char> = (0..3)
        .flat_map(|y| (0..4).map(move |x| (x, y)))
        .map(|(x, y)| dst.glyph_at(x, y))
        .collect();
    seen.sort_unstable();
    let expected: Vec<char> = (b'a'..b'a' + 12).map(|b| b as char).collect();
    assert_eq!(seen, expected);
}

#[test]
fn reports_decode_back_to_their_requests_answers() {
    let mut emu = Emulator::new(80, 24);
    emu.feed(b"\x1b[10;20H\x1b[6n\x1b[18t");
    let reply = emu.take_output();

    // The reply stream is itself valid input for the decoder.
    let events = SequenceDecoder::new().feed(&reply);
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        Event::Device(termframe::decoder::DeviceOp::CursorLocation { y: 10, x: 20 })
    ));
    assert!(matches!(
        events[1],
        Event::Device(termframe::decoder::DeviceOp::ScreenSize { rows: 24, cols: 80 })
    ));
}

#[test]
fn mouse_reports_roundtrip_through_the_decoder() {
    let mut emu = Emulator::new(10, 10);
    emu.feed(b"\x1b[?1000h\x1b[?1006h");
    emu.mouse_event(0, 4, 7, true);
    emu.mouse_event(0, 4, 7, false);
    let events = SequenceDecoder::new().feed(&emu.take_output());
    assert_eq!(events.len(), 2);
    assert!(matches!(
        events[0],
        Event::Device(termframe::decoder::DeviceOp::MouseReport {
            code: 0,
            x: 4,
            y: 7,
            pressed: true
        })
    ));
    assert!(matches!(
        events[1],
        Event::Device(termframe::decoder::DeviceOp::MouseReport {
            pressed: false,
            ..
        })
    ));
}

#[test]
fn emulator_screen_survives_a_snapshot() {
    let mut emu = Emulator::new(12, 3);
    emu.feed("\x1b[1;35mtitle\x1b[0m\r\nbody 世界".as_bytes());

    let mut bytes = Vec::new();
    emu.screen().save_snapshot(&mut bytes).unwrap();
    let restored = ScreenBuffer::load_snapshot(&bytes[..]).unwrap();

    assert_eq!(restored.raw(), emu.screen().raw());
    assert_eq!(restored.row_text(1), emu.screen().row_text(1));
}

#[test]
fn overlapping_panes_compose_in_order() {
    // Two buffers drawn into a backing buffer, then delta-drawn to a sink:
    // the later pane wins where they overlap.
    let mut back = ScreenBuffer::new(8, 3);
    let mut left = ScreenBuffer::new(4, 3);
    left.fill(None, &Attr::default(), 'L');
    let mut right = ScreenBuffer::new(4, 3);
    right.fill(None, &Attr::default(), 'R');

    left.draw_into(&mut back, &DrawOptions::default());
    right.draw_into(
        &mut back,
        &DrawOptions {
            x: 2,
            y: 0,
            ..DrawOptions::default()
        },
    );
    assert_eq!(back.row_text(0), "LLRRRR  ");

    let mut sink = TerminalSink::new(8, 3);
    let out = delta_bytes(&back, &mut sink);
    assert_eq!(out.matches('L').count(), 6);
    assert_eq!(out.matches('R').count(), 12);
}

#[test]
fn chunked_feed_matches_single_feed() {
    trace_init();
    let stream = "\x1b[2J\x1b[1;1H\x1b[38;5;208mwarm\x1b[0m \x1b]0;t\x07世";
    let mut whole = Emulator::new(10, 3);
    whole.feed(stream.as_bytes());

    let bytes = stream.as_bytes();
    for split in 1..bytes.len() {
        let mut parts = Emulator::new(10, 3);
        parts.feed(&bytes[..split]);
        parts.feed(&bytes[split..]);
        assert_eq!(
            parts.screen().raw(),
            whole.screen().raw(),
            "split at {split}"
        );
        assert_eq!(parts.title(), whole.title());
    }
}

#[test]
fn region_copy_keeps_scrollback_shape() {
    // Moving a block down over itself must not smear.
    let mut buf = ScreenBuffer::new(4, 6);
    for y in 0..4 {
        buf.put(
            &PutOptions::at(0, y),
            &Attr::default(),
            &format!("r{}r{}", y, y),
        );
    }
    buf.copy_region(Rect::new(0, 0, 3, 3), 0, 2);
    assert_eq!(buf.row_text(2), "r0r0");
    assert_eq!(buf.row_text(3), "r1r1");
    assert_eq!(buf.row_text(4), "r2r2");
    assert_eq!(buf.row_text(5), "r3r3");
}
