//! Channel blend functions for alpha compositing
//!
//! Each function is pure over two 0-255 channel values. Compositing a source
//! channel over a destination channel at a given alpha is
//! `round(f(src, dst) * alpha + dst * (1 - alpha))`.

/// Named blend function applied per color channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendFn {
    /// Source replaces destination.
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    HardLight,
    SoftLight,
}

impl BlendFn {
    /// Apply the function to one channel pair.
    pub fn apply(self, src: u8, dst: u8) -> u8 {
        match self {
            BlendFn::Normal => src,
            BlendFn::Multiply => multiply(src, dst),
            BlendFn::Screen => screen(src, dst),
            BlendFn::Overlay => {
                // Multiply or screen, selected by the destination.
                if dst <= 127 {
                    mul2(src, dst)
                } else {
                    screen2(src, dst)
                }
            }
            BlendFn::HardLight => {
                // Overlay with the roles of source and destination swapped.
                if src <= 127 {
                    mul2(dst, src)
                } else {
                    screen2(dst, src)
                }
            }
            BlendFn::SoftLight => soft_light(src, dst),
        }
    }

    /// True for the identity function; the opaque fast path requires it.
    pub fn is_identity(self) -> bool {
        matches!(self, BlendFn::Normal)
    }
}

#[inline]
fn multiply(src: u8, dst: u8) -> u8 {
    ((src as u32 * dst as u32 + 127) / 255) as u8
}

#[inline]
fn screen(src: u8, dst: u8) -> u8 {
    255 - multiply(255 - src, 255 - dst)
}

#[inline]
fn mul2(src: u8, dst: u8) -> u8 {
    ((2 * src as u32 * dst as u32 + 127) / 255).min(255) as u8
}

#[inline]
fn screen2(src: u8, dst: u8) -> u8 {
    (255u32.saturating_sub((2 * (255 - src as u32) * (255 - dst as u32) + 127) / 255)) as u8
}

/// W3C compositing soft-light formula, computed in f32 and rounded once.
fn soft_light(src: u8, dst: u8) -> u8 {
    let s = src as f32 / 255.0;
    let d = dst as f32 / 255.0;
    let out = if s <= 0.5 {
        d - (1.0 - 2.0 * s) * d * (1.0 - d)
    } else {
        let g = if d <= 0.25 {
            ((16.0 * d - 12.0) * d + 4.0) * d
        } else {
            d.sqrt()
        };
        d + (2.0 * s - 1.0) * (g - d)
    };
    (out * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Composite one source channel over a destination channel.
///
/// `alpha` is the effective source weight in `[0, 1]` (opacity times the
/// source plane's alpha).
#[inline]
pub fn composite_channel(src: u8, dst: u8, alpha: f32, f: BlendFn) -> u8 {
    let blended = f.apply(src, dst) as f32;
    (blended * alpha + dst as f32 * (1.0 - alpha))
        .round()
        .clamp(0.0, 255.0) as u8
}
