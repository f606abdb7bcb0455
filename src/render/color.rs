use palette::{LinSrgb, Srgb};
use std::fmt;

/// Opaque black, the reference background for the dominant color contrast check.
pub const BLACK: Color = Color::rgb(0, 0, 0);
pub const WHITE: Color = Color::rgb(255, 255, 255);

const MIN_ALPHA_SEARCH_MAX_ITERATIONS: u32 = 10;
const MIN_ALPHA_SEARCH_PRECISION: u32 = 1;

/// 8-bit ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { a: 0xFF, r, g, b }
    }

    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    pub const fn opaque(self) -> Self {
        self.with_alpha(0xFF)
    }

    pub const fn is_opaque(self) -> bool {
        self.a == 0xFF
    }

    /// Accepts `#RRGGBB` or `#AARRGGBB`, with or without the leading `#`.
    pub fn parse_hex(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('#');
        if !s.is_ascii() {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();
        match s.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::argb(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// `#RRGGBB` for opaque colors, `#AARRGGBB` otherwise.
    pub fn to_hex(self) -> String {
        if self.is_opaque() {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
        }
    }

    /// WCAG relative luminance of the color channels. Alpha is ignored.
    pub fn relative_luminance(self) -> f32 {
        let lin: LinSrgb<f32> = Srgb::new(self.r, self.g, self.b)
            .into_format::<f32>()
            .into_linear();
        0.2126 * lin.red + 0.7152 * lin.green + 0.0722 * lin.blue
    }

    /// WCAG contrast ratio in `1.0..=21.0`.
    ///
    /// `background` is treated as opaque. A translucent `self` is composited
    /// over it first, which is how text drawn with alpha is actually seen.
    pub fn contrast_ratio(self, background: Color) -> f32 {
        let background = background.opaque();
        let foreground = if self.is_opaque() {
            self
        } else {
            self.composite_over(background)
        };

        let a = foreground.relative_luminance();
        let b = background.relative_luminance();
        let (l1, l2) = if a >= b { (a, b) } else { (b, a) };
        (l1 + 0.05) / (l2 + 0.05)
    }

    /// Source-over compositing onto an opaque background.
    pub fn composite_over(self, background: Color) -> Color {
        let fa = self.a as u32;
        let mix = |f: u8, b: u8| ((f as u32 * fa + b as u32 * (0xFF - fa)) / 0xFF) as u8;
        Color::rgb(
            mix(self.r, background.r),
            mix(self.g, background.g),
            mix(self.b, background.b),
        )
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Smallest alpha at which `foreground` drawn over `background` still reaches
/// `min_ratio`. `None` when even the opaque foreground falls short, or when
/// the background itself is translucent.
pub fn minimum_alpha(foreground: Color, background: Color, min_ratio: f32) -> Option<u8> {
    if !background.is_opaque() {
        return None;
    }

    if foreground.opaque().contrast_ratio(background) < min_ratio {
        return None;
    }

    // Binary search over 0..=255.
    let mut low: u32 = 0;
    let mut high: u32 = 0xFF;
    let mut iterations = 0;
    while iterations <= MIN_ALPHA_SEARCH_MAX_ITERATIONS && high - low > MIN_ALPHA_SEARCH_PRECISION {
        let mid = (low + high) / 2;
        let test = foreground.with_alpha(mid as u8);
        if test.contrast_ratio(background) < min_ratio {
            low = mid;
        } else {
            high = mid;
        }
        iterations += 1;
    }

    Some(high as u8)
}
