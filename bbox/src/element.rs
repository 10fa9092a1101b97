use crate::common::*;

/// Floating point types usable as unchecked box components.
pub trait Element: Float {}

impl<T> Element for T where T: Float {}
