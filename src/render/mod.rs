pub mod color;
pub mod dominant_color;
pub mod palette;
