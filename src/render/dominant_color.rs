use crate::data::config::{Config, DEFAULT_MAX_SWATCHES, DEFAULT_MIN_CONTRAST};
use crate::fetch::image_fetch::{FetchOptions, ImageFetch, ImageFetcher};
use crate::render::color::{Color, BLACK};
use crate::render::palette::{MedianCutQuantizer, PaletteQuantizer, Swatch};

/// Accent color plus a text color that reads on top of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DominantColor {
    pub color: Color,
    /// Always fully opaque.
    pub on_color: Color,
}

/// Picks the most populous swatch with at least `min_contrast` against black.
///
/// Ties in population keep the input order.
pub fn select_dominant_color(swatches: &[Swatch], min_contrast: f32) -> Option<DominantColor> {
    let mut ranked: Vec<&Swatch> = swatches.iter().collect();
    ranked.sort_by(|a, b| b.population().cmp(&a.population()));

    ranked
        .into_iter()
        .find(|s| s.color().contrast_ratio(BLACK) >= min_contrast)
        .map(|s| DominantColor {
            color: s.color(),
            on_color: s.body_text_color().opaque(),
        })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionPolicy {
    pub min_contrast: f32,
    pub max_swatches: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            min_contrast: DEFAULT_MIN_CONTRAST,
            max_swatches: DEFAULT_MAX_SWATCHES,
        }
    }
}

impl SelectionPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_contrast: config.min_contrast,
            max_swatches: config.max_swatches,
        }
    }
}

/// Fetch, quantize, select.
#[derive(Debug)]
pub struct DominantColorPipeline<F, Q> {
    fetcher: F,
    quantizer: Q,
    policy: SelectionPolicy,
}

impl DominantColorPipeline<ImageFetch, MedianCutQuantizer> {
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ImageFetch::new(FetchOptions::from_config(config)),
            MedianCutQuantizer,
            SelectionPolicy::from_config(config),
        )
    }
}

impl<F: ImageFetcher, Q: PaletteQuantizer> DominantColorPipeline<F, Q> {
    pub fn new(fetcher: F, quantizer: Q, policy: SelectionPolicy) -> Self {
        Self {
            fetcher,
            quantizer,
            policy,
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    pub fn resolve(&self, locator: &str) -> Option<DominantColor> {
        let image = self.fetcher.fetch(locator)?;
        let swatches = self.quantizer.quantize(&image, self.policy.max_swatches);
        let picked = select_dominant_color(&swatches, self.policy.min_contrast);
        match picked {
            Some(c) => log::debug!(
                "{locator}: picked {} from {} swatches (on {})",
                c.color,
                swatches.len(),
                c.on_color
            ),
            None => log::debug!("{locator}: no swatch of {} passed contrast", swatches.len()),
        }
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::color::WHITE;

    fn swatch(hex: &str, population: u32) -> Swatch {
        Swatch::new(Color::parse_hex(hex).unwrap(), population)
    }

    #[test]
    fn empty_swatches_give_none() {
        assert_eq!(select_dominant_color(&[], DEFAULT_MIN_CONTRAST), None);
    }

    #[test]
    fn dark_swatches_give_none() {
        let swatches = [swatch("#101010", 500), swatch("#202020", 100), swatch("#000000", 10)];
        assert_eq!(select_dominant_color(&swatches, DEFAULT_MIN_CONTRAST), None);
    }

    #[test]
    fn skips_populous_dark_swatch() {
        let gold = Color::rgb(0xFF, 0xD7, 0x00);
        let swatches = [
            swatch("#101010", 500),
            Swatch::with_text_colors(gold, 300, BLACK, BLACK),
        ];
        let picked = select_dominant_color(&swatches, DEFAULT_MIN_CONTRAST).unwrap();
        assert_eq!(picked, DominantColor { color: gold, on_color: BLACK });
    }

    #[test]
    fn highest_population_wins() {
        let swatches = [swatch("#FF8080", 10), swatch("#80FF80", 30), swatch("#8080FF", 20)];
        let picked = select_dominant_color(&swatches, DEFAULT_MIN_CONTRAST).unwrap();
        assert_eq!(picked.color, Color::rgb(0x80, 0xFF, 0x80));
    }

    #[test]
    fn ties_keep_input_order() {
        let swatches = [swatch("#FF8080", 30), swatch("#80FF80", 30)];
        let picked = select_dominant_color(&swatches, DEFAULT_MIN_CONTRAST).unwrap();
        assert_eq!(picked.color, Color::rgb(0xFF, 0x80, 0x80));

        let swatches = [swatch("#80FF80", 30), swatch("#FF8080", 30)];
        let picked = select_dominant_color(&swatches, DEFAULT_MIN_CONTRAST).unwrap();
        assert_eq!(picked.color, Color::rgb(0x80, 0xFF, 0x80));
    }

    #[test]
    fn on_color_is_forced_opaque() {
        let s = Swatch::with_text_colors(Color::rgb(0xFF, 0xD7, 0x00), 1, BLACK.with_alpha(0x40), WHITE);
        let picked = select_dominant_color(&[s], DEFAULT_MIN_CONTRAST).unwrap();
        assert_eq!(picked.on_color, BLACK);
        assert!(picked.on_color.is_opaque());
    }

    #[test]
    fn translucent_swatch_is_judged_and_returned_opaque() {
        let gold = Color::rgb(0xFF, 0xD7, 0x00);
        let s = Swatch::with_text_colors(gold.with_alpha(0x10), 1, BLACK, BLACK);
        let picked = select_dominant_color(&[s], DEFAULT_MIN_CONTRAST).unwrap();
        assert_eq!(picked.color, gold);
    }

    #[test]
    fn threshold_is_configurable() {
        let swatches = [swatch("#777777", 1)];
        assert!(select_dominant_color(&swatches, DEFAULT_MIN_CONTRAST).is_some());
        assert!(select_dominant_color(&swatches, 7.0).is_none());
    }
}
