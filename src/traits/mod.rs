pub mod controller;
pub mod renderer;
pub mod surface;
pub mod time;

pub use controller::*;
pub use renderer::*;
pub use surface::*;
pub use time::*;
