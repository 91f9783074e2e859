mod color;
mod transform;

pub use color::Color;
pub use transform::{Axis, Transform};
