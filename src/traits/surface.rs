/// Drawing surface whose backing store follows the window
pub trait DrawSurface {
    /// Logical size in CSS-style pixels
    fn set_size(&mut self, width: u32, height: u32);

    /// Backing store pixels per logical pixel
    fn set_pixel_ratio(&mut self, ratio: f32);
}
