//! Breakpoint set: the candidate widths derivatives are generated at.
//!
//! Widths are sorted into descending order once, when the set is built, and
//! never mutated afterwards. The set is shared read-only across requests.

use crate::config::ConfigError;

/// Non-empty list of positive pixel widths in descending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointSet(Vec<u32>);

impl BreakpointSet {
    /// Build a set from widths in any order. Duplicates are kept.
    pub fn new(widths: impl IntoIterator<Item = u32>) -> Result<Self, ConfigError> {
        let mut widths: Vec<u32> = widths.into_iter().collect();
        if widths.is_empty() {
            return Err(ConfigError::Validation(
                "breakpoints must not be empty".into(),
            ));
        }
        if widths.contains(&0) {
            return Err(ConfigError::Validation(
                "breakpoints must be positive".into(),
            ));
        }
        widths.sort_unstable_by(|a, b| b.cmp(a));
        Ok(Self(widths))
    }

    /// The widest breakpoint; the default and fallback resolution.
    pub fn largest(&self) -> u32 {
        self.0[0]
    }

    /// The narrowest breakpoint; served to mobile clients without a signal.
    pub fn smallest(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    /// All breakpoints, widest first.
    pub fn descending(&self) -> &[u32] {
        &self.0
    }
}
