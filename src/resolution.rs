//! Resolution selection.
//!
//! Maps the client's reported viewport width and pixel density to exactly one
//! breakpoint: the smallest breakpoint not smaller than the effective width,
//! or the largest breakpoint when the effective width exceeds them all.
//!
//! Clients report themselves through a `resolution` cookie holding
//! `"<css width>,<device pixel ratio>"`, typically set by a one-line script:
//!
//! ```text
//! document.cookie = 'resolution=' + Math.max(screen.width, screen.height)
//!     + ',' + (window.devicePixelRatio || 1) + '; path=/';
//! ```

use crate::breakpoints::BreakpointSet;

/// Name of the cookie carrying the client signal.
pub const RESOLUTION_COOKIE: &str = "resolution";

/// Viewport width and pixel density reported by the client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientSignal {
    pub client_width: u32,
    pub pixel_density: f64,
}

impl ClientSignal {
    /// Parse a `"<width>,<density>"` cookie value.
    ///
    /// Returns `None` when there is no usable signal: empty value, a width
    /// that does not parse, or a width of zero. A missing or unusable
    /// density counts as 1.
    pub fn parse(value: &str) -> Option<Self> {
        let mut fields = value.split(',');
        let client_width = fields
            .next()
            .and_then(|w| w.trim().parse::<u32>().ok())
            .unwrap_or(0);
        if client_width == 0 {
            return None;
        }

        let pixel_density = fields
            .next()
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .unwrap_or(1.0);

        Some(Self {
            client_width,
            pixel_density,
        })
    }

    /// Width in physical pixels used for breakpoint matching.
    ///
    /// Density only scales widths that already fit under the largest
    /// breakpoint; wider viewports get the largest breakpoint anyway.
    pub fn effective_width(&self, largest: u32) -> f64 {
        let width = f64::from(self.client_width);
        if self.pixel_density != 1.0 && self.client_width <= largest {
            width * self.pixel_density
        } else {
            width
        }
    }
}

/// Choose the breakpoint to serve.
///
/// Without a signal, mobile clients get the smallest breakpoint (mobile
/// first) and everyone else the largest.
pub fn select_resolution(
    signal: Option<&ClientSignal>,
    is_mobile: bool,
    breakpoints: &BreakpointSet,
) -> u32 {
    let Some(signal) = signal else {
        return if is_mobile {
            breakpoints.smallest()
        } else {
            breakpoints.largest()
        };
    };

    let effective = signal.effective_width(breakpoints.largest());
    // Smallest breakpoint that still covers the effective width
    breakpoints
        .descending()
        .iter()
        .rev()
        .copied()
        .find(|&bp| effective <= f64::from(bp))
        .unwrap_or(breakpoints.largest())
}
