/// Monotonic time in seconds from an arbitrary origin
pub trait TimeSource {
    fn seconds(&self) -> f64;
}
