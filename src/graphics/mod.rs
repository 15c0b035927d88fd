pub mod palette;
pub mod pixels;
