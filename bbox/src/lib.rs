//! Safe bounding box types and functions.

mod common;

pub mod into_cycxhw;
pub use into_cycxhw::*;

pub use transform::*;
mod transform;

pub use rect::*;
pub mod rect;

pub use cycxhw::*;
pub mod cycxhw;

pub use hw::*;
pub mod hw;

pub use element::*;
pub mod element;

pub mod prelude {
    pub use crate::rect::{Rect, RectNum};
}
