//! Sequence dispatch tables
//!
//! CSI dispatch is a tree keyed first on the private marker plus final byte,
//! then on parameter values. Interior nodes branch on the next parameter;
//! leaves carry a builder function, the count of extra parameters they
//! consume, and whether dispatch restarts from the root afterwards (SGR
//! sequences chain many attribute changes into one CSI).

use std::collections::HashMap;

use super::event::{
    AttrOp, ControlOp, CursorOp, DeviceOp, EditOp, EraseExtent, Event, ModeOp, PaletteOp,
    ScreenOp, SystemOp,
};

/// Builds an event from the parameters consumed along the dispatch path.
/// `None` means "recognized key, unhandled parameters" and falls back to a
/// generic CSI event.
pub(crate) type LeafFn = fn(&[u32]) -> Option<Event>;

pub(crate) enum Node {
    Leaf {
        build: LeafFn,
        /// Extra parameters consumed beyond those eaten by branches.
        extra: usize,
        /// Restart from the root with the remaining parameters.
        continue_from_root: bool,
    },
    Branch {
        children: HashMap<u32, Node>,
        default: Option<Box<Node>>,
    },
}

fn leaf(build: LeafFn, extra: usize) -> Node {
    Node::Leaf {
        build,
        extra,
        continue_from_root: false,
    }
}

fn sgr_leaf(build: LeafFn, extra: usize) -> Node {
    Node::Leaf {
        build,
        extra,
        continue_from_root: true,
    }
}

/// First parameter, with `0` promoted to `1` as for most counted sequences.
fn nz(params: &[u32], at: usize) -> u32 {
    params.get(at).copied().unwrap_or(1).max(1)
}

fn p(params: &[u32], at: usize) -> u32 {
    params.get(at).copied().unwrap_or(0)
}

fn extent(params: &[u32]) -> Option<EraseExtent> {
    match p(params, 0) {
        0 => Some(EraseExtent::ToEnd),
        1 => Some(EraseExtent::ToStart),
        2 => Some(EraseExtent::All),
        _ => None,
    }
}

fn sgr_simple(params: &[u32]) -> Option<Event> {
    let op = match p(params, 0) {
        0 => AttrOp::Reset,
        1 => AttrOp::Bold(true),
        2 => AttrOp::Dim(true),
        3 => AttrOp::Italic(true),
        4 => AttrOp::Underline(true),
        5 => AttrOp::Blink(true),
        7 => AttrOp::Inverse(true),
        8 => AttrOp::Hidden(true),
        9 => AttrOp::Strike(true),
        22 => AttrOp::NormalIntensity,
        23 => AttrOp::Italic(false),
        24 => AttrOp::Underline(false),
        25 => AttrOp::Blink(false),
        27 => AttrOp::Inverse(false),
        28 => AttrOp::Hidden(false),
        29 => AttrOp::Strike(false),
        n @ 30..=37 => AttrOp::Fg((n - 30) as u8),
        39 => AttrOp::DefaultFg,
        n @ 40..=47 => AttrOp::Bg((n - 40) as u8),
        49 => AttrOp::DefaultBg,
        n @ 90..=97 => AttrOp::Fg((n - 90 + 8) as u8),
        n @ 100..=107 => AttrOp::Bg((n - 100 + 8) as u8),
        _ => return None,
    };
    Some(Event::Attr(op))
}

fn sgr_fg_indexed(params: &[u32]) -> Option<Event> {
    // args: [38, 5, index]
    Some(Event::Attr(AttrOp::Fg(p(params, 2).min(255) as u8)))
}

fn sgr_bg_indexed(params: &[u32]) -> Option<Event> {
    Some(Event::Attr(AttrOp::Bg(p(params, 2).min(255) as u8)))
}

fn sgr_fg_rgb(params: &[u32]) -> Option<Event> {
    // args: [38, 2, r, g, b]
    Some(Event::Attr(AttrOp::FgRgb(
        p(params, 2).min(255) as u8,
        p(params, 3).min(255) as u8,
        p(params, 4).min(255) as u8,
    )))
}

fn sgr_bg_rgb(params: &[u32]) -> Option<Event> {
    Some(Event::Attr(AttrOp::BgRgb(
        p(params, 2).min(255) as u8,
        p(params, 3).min(255) as u8,
        p(params, 4).min(255) as u8,
    )))
}

fn sgr_color_branch(indexed: LeafFn, rgb: LeafFn) -> Node {
    let mut children = HashMap::new();
    children.insert(5, sgr_leaf(indexed, 1));
    children.insert(2, sgr_leaf(rgb, 3));
    Node::Branch {
        children,
        default: None,
    }
}

fn private_mode(number: u32, set: bool) -> Option<Event> {
    let op = match number {
        7 => ModeOp::AutoWrap(set),
        25 => ModeOp::ShowCursor(set),
        1000 => ModeOp::MouseButtonReporting(set),
        1002 => ModeOp::MouseDragReporting(set),
        1003 => ModeOp::MouseMotionReporting(set),
        1004 => ModeOp::FocusReporting(set),
        1006 => ModeOp::SgrMouse(set),
        1049 => ModeOp::AlternateScreen(set),
        2004 => ModeOp::BracketedPaste(set),
        _ => return None,
    };
    Some(Event::Mode(op))
}

fn mode_set(params: &[u32]) -> Option<Event> {
    private_mode(p(params, 0), true)
}

fn mode_reset(params: &[u32]) -> Option<Event> {
    private_mode(p(params, 0), false)
}

fn mouse_report(params: &[u32], pressed: bool) -> Option<Event> {
    Some(Event::Device(DeviceOp::MouseReport {
        code: p(params, 0),
        x: nz(params, 1),
        y: nz(params, 2),
        pressed,
    }))
}

/// The CSI dispatch tree, keyed on private marker plus final byte.
pub(crate) fn csi_table() -> HashMap<&'static str, Node> {
    let mut t: HashMap<&'static str, Node> = HashMap::new();

    t.insert("A", leaf(|a| Some(Event::Cursor(CursorOp::Up(nz(a, 0)))), 1));
    t.insert("B", leaf(|a| Some(Event::Cursor(CursorOp::Down(nz(a, 0)))), 1));
    t.insert("C", leaf(|a| Some(Event::Cursor(CursorOp::Right(nz(a, 0)))), 1));
    t.insert("D", leaf(|a| Some(Event::Cursor(CursorOp::Left(nz(a, 0)))), 1));
    t.insert(
        "E",
        leaf(|a| Some(Event::Cursor(CursorOp::NextLine(nz(a, 0)))), 1),
    );
    t.insert(
        "F",
        leaf(|a| Some(Event::Cursor(CursorOp::PrevLine(nz(a, 0)))), 1),
    );
    t.insert(
        "G",
        leaf(|a| Some(Event::Cursor(CursorOp::Column(nz(a, 0)))), 1),
    );
    t.insert("d", leaf(|a| Some(Event::Cursor(CursorOp::Row(nz(a, 0)))), 1));
    let move_to: LeafFn = |a| {
        Some(Event::Cursor(CursorOp::MoveTo {
            y: nz(a, 0),
            x: nz(a, 1),
        }))
    };
    t.insert("H", leaf(move_to, 2));
    t.insert("f", leaf(move_to, 2));
    t.insert("s", leaf(|_| Some(Event::Cursor(CursorOp::Save)), 0));
    t.insert("u", leaf(|_| Some(Event::Cursor(CursorOp::Restore)), 0));

    t.insert(
        "J",
        leaf(|a| extent(a).map(|e| Event::Edit(EditOp::EraseDisplay(e))), 1),
    );
    t.insert(
        "K",
        leaf(|a| extent(a).map(|e| Event::Edit(EditOp::EraseLine(e))), 1),
    );
    t.insert(
        "L",
        leaf(|a| Some(Event::Edit(EditOp::InsertLines(nz(a, 0)))), 1),
    );
    t.insert(
        "M",
        leaf(|a| Some(Event::Edit(EditOp::DeleteLines(nz(a, 0)))), 1),
    );
    t.insert(
        "@",
        leaf(|a| Some(Event::Edit(EditOp::InsertChars(nz(a, 0)))), 1),
    );
    t.insert(
        "P",
        leaf(|a| Some(Event::Edit(EditOp::DeleteChars(nz(a, 0)))), 1),
    );
    t.insert(
        "X",
        leaf(|a| Some(Event::Edit(EditOp::EraseChars(nz(a, 0)))), 1),
    );
    t.insert(
        "S",
        leaf(|a| Some(Event::Edit(EditOp::ScrollUp(nz(a, 0)))), 1),
    );
    t.insert(
        "T",
        leaf(|a| Some(Event::Edit(EditOp::ScrollDown(nz(a, 0)))), 1),
    );

    // SGR: branch on the extended-color introducers, everything else takes
    // the simple-code leaf and continues from the root.
    let mut sgr_children = HashMap::new();
    sgr_children.insert(38, sgr_color_branch(sgr_fg_indexed, sgr_fg_rgb));
    sgr_children.insert(48, sgr_color_branch(sgr_bg_indexed, sgr_bg_rgb));
    t.insert(
        "m",
        Node::Branch {
            children: sgr_children,
            default: Some(Box::new(sgr_leaf(sgr_simple, 1))),
        },
    );

    t.insert(
        "r",
        leaf(
            |a| {
                if a.is_empty() {
                    Some(Event::Screen(ScreenOp::ResetScrollingRegion))
                } else {
                    // Bottom 0 means "last row"; the interpreter clamps it.
                    Some(Event::Screen(ScreenOp::SetScrollingRegion {
                        top: nz(a, 0),
                        bottom: p(a, 1),
                    }))
                }
            },
            2,
        ),
    );

    let mut dsr = HashMap::new();
    dsr.insert(5, leaf(|_| Some(Event::Device(DeviceOp::RequestStatus)), 0));
    dsr.insert(
        6,
        leaf(|_| Some(Event::Device(DeviceOp::RequestCursorLocation)), 0),
    );
    t.insert(
        "n",
        Node::Branch {
            children: dsr,
            default: None,
        },
    );

    let mut window = HashMap::new();
    window.insert(
        8,
        leaf(
            |a| {
                Some(Event::Device(DeviceOp::ScreenSize {
                    rows: nz(a, 1),
                    cols: nz(a, 2),
                }))
            },
            2,
        ),
    );
    window.insert(
        18,
        leaf(|_| Some(Event::Device(DeviceOp::RequestScreenSize)), 0),
    );
    t.insert(
        "t",
        Node::Branch {
            children: window,
            default: None,
        },
    );

    t.insert(
        "R",
        leaf(
            |a| {
                Some(Event::Device(DeviceOp::CursorLocation {
                    y: nz(a, 0),
                    x: nz(a, 1),
                }))
            },
            2,
        ),
    );
    t.insert("I", leaf(|_| Some(Event::Device(DeviceOp::FocusIn)), 0));
    t.insert("O", leaf(|_| Some(Event::Device(DeviceOp::FocusOut)), 0));

    t.insert("?h", sgr_leaf(mode_set, 1));
    t.insert("?l", sgr_leaf(mode_reset, 1));

    t.insert("<M", leaf(|a| mouse_report(a, true), 3));
    t.insert("<m", leaf(|a| mouse_report(a, false), 3));

    t
}

/// Walk the tree for one CSI sequence, producing every event it encodes.
/// Returns `None` when the key has no entry at all.
pub(crate) fn dispatch_csi(
    table: &HashMap<&'static str, Node>,
    key: &str,
    params: &[u32],
) -> Option<Vec<Event>> {
    let root = table.get(key)?;
    let mut events = Vec::new();
    let mut i = 0usize;

    loop {
        let start = i;
        let mut node = root;
        let (build, extra, cont) = loop {
            match node {
                Node::Leaf {
                    build,
                    extra,
                    continue_from_root,
                } => break (*build, *extra, *continue_from_root),
                Node::Branch { children, default } => {
                    if let Some(child) = params.get(i).and_then(|v| children.get(v)) {
                        i += 1;
                        node = child;
                    } else if let Some(d) = default {
                        node = d;
                    } else {
                        // Unhandled branch value.
                        return Some(events);
                    }
                }
            }
        };
        i = (i + extra).min(params.len());
        let args = &params[start..i];
        match build(args) {
            Some(event) => events.push(event),
            None => return None,
        }
        if !cont || i >= params.len() {
            return Some(events);
        }
    }
}

/// What an escape final byte means.
pub(crate) enum EscOutcome {
    Event(Event),
    /// Charset designation: the next byte belongs to the sequence and is
    /// discarded with it.
    Charset,
    Unknown(char),
}

pub(crate) fn esc_dispatch(byte: u8) -> EscOutcome {
    match byte {
        b'7' => EscOutcome::Event(Event::Cursor(CursorOp::Save)),
        b'8' => EscOutcome::Event(Event::Cursor(CursorOp::Restore)),
        b'c' => EscOutcome::Event(Event::Screen(ScreenOp::FullReset)),
        b'D' => EscOutcome::Event(Event::Cursor(CursorOp::Index)),
        b'E' => EscOutcome::Event(Event::Cursor(CursorOp::NextLine(1))),
        b'M' => EscOutcome::Event(Event::Cursor(CursorOp::ReverseLineFeed)),
        b'(' | b')' | b'*' | b'+' => EscOutcome::Charset,
        other => EscOutcome::Unknown(other as char),
    }
}

pub(crate) fn control_event(byte: u8) -> Option<Event> {
    let op = match byte {
        0x07 => ControlOp::Bell,
        0x08 => ControlOp::Backspace,
        0x09 => ControlOp::Tab,
        0x0a..=0x0c => ControlOp::LineFeed,
        0x0d => ControlOp::CarriageReturn,
        _ => return None,
    };
    Some(Event::Control(op))
}

/// Parse an X11 color spec of the form `rgb:RR/GG/BB` with 1-4 hex digits
/// per component.
fn parse_x_color(spec: &str) -> Option<(u8, u8, u8)> {
    let body = spec.strip_prefix("rgb:")?;
    let mut parts = body.split('/');
    let channel = |s: &str| -> Option<u8> {
        if s.is_empty() || s.len() > 4 {
            return None;
        }
        let v = u32::from_str_radix(s, 16).ok()?;
        Some(match s.len() {
            1 => (v * 17) as u8,
            2 => v as u8,
            3 => (v >> 4) as u8,
            _ => (v >> 8) as u8,
        })
    };
    let r = channel(parts.next()?)?;
    let g = channel(parts.next()?)?;
    let b = channel(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some((r, g, b))
}

/// Dispatch an OSC string already split on `;`. An empty result means the
/// code is unhandled and the caller falls back to a generic OSC event.
pub(crate) fn osc_dispatch(parts: &[&str]) -> Vec<Event> {
    let Some(code) = parts.first().and_then(|s| s.parse::<u32>().ok()) else {
        return Vec::new();
    };
    match code {
        0 | 2 => {
            if parts.len() < 2 {
                return Vec::new();
            }
            vec![Event::System(SystemOp::WindowTitle(parts[1..].join(";")))]
        }
        4 => {
            // Pairs of (index, spec); "?" asks for the register's value.
            let mut events = Vec::new();
            let mut it = parts[1..].chunks_exact(2);
            for pair in &mut it {
                let Ok(index) = pair[0].parse::<u32>() else {
                    continue;
                };
                if index > 255 {
                    continue;
                }
                let index = index as u8;
                if pair[1] == "?" {
                    events.push(Event::Palette(PaletteOp::Request(index)));
                } else if let Some((r, g, b)) = parse_x_color(pair[1]) {
                    events.push(Event::Palette(PaletteOp::Set { index, r, g, b }));
                }
            }
            events
        }
        9 => {
            if parts.len() < 2 {
                return Vec::new();
            }
            vec![Event::System(SystemOp::Notification {
                title: None,
                body: parts[1..].join(";"),
            })]
        }
        104 => {
            if parts.len() == 1 {
                return vec![Event::Palette(PaletteOp::ResetAll)];
            }
            parts[1..]
                .iter()
                .filter_map(|s| s.parse::<u32>().ok())
                .filter(|&i| i <= 255)
                .map(|i| Event::Palette(PaletteOp::ResetIndex(i as u8)))
                .collect()
        }
        777 => {
            if parts.len() >= 4 && parts[1] == "notify" {
                vec![Event::System(SystemOp::Notification {
                    title: Some(parts[2].to_string()),
                    body: parts[3..].join(";"),
                })]
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    }
}
