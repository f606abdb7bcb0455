//! Picks a readable accent color from an image's palette.
//!
//! An image is fetched and downscaled, quantized into a few swatches, and the
//! most populous swatch with enough contrast against black becomes the accent.

pub mod data;
pub mod fetch;
pub mod render;

pub use data::config::Config;
pub use fetch::image_fetch::{FetchError, FetchOptions, ImageFetch, ImageFetcher};
pub use fetch::worker::{start_dominant_color_worker, AccentRequest, AccentResult};
pub use render::color::Color;
pub use render::dominant_color::{select_dominant_color, DominantColor, DominantColorPipeline, SelectionPolicy};
pub use render::palette::{MedianCutQuantizer, PaletteQuantizer, Swatch};
