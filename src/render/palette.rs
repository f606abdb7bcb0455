use crate::render::color::{minimum_alpha, Color, BLACK, WHITE};
use image::RgbaImage;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

pub const MIN_CONTRAST_BODY_TEXT: f32 = 4.5;
pub const MIN_CONTRAST_TITLE_TEXT: f32 = 3.0;

const QUANTIZE_WORD_WIDTH: u32 = 5;
const QUANTIZE_WORD_MASK: u16 = (1 << QUANTIZE_WORD_WIDTH) - 1;
const HISTOGRAM_SIZE: usize = 1 << (QUANTIZE_WORD_WIDTH * 3);

/// A representative image color with its pixel count and readable text colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swatch {
    color: Color,
    population: u32,
    body_text_color: Color,
    title_text_color: Color,
}

impl Swatch {
    pub fn new(color: Color, population: u32) -> Self {
        let color = color.opaque();
        let (body_text_color, title_text_color) = text_colors_for(color);
        Self {
            color,
            population,
            body_text_color,
            title_text_color,
        }
    }

    /// Swatch with caller-supplied text colors, for quantizers that compute
    /// their own.
    pub fn with_text_colors(color: Color, population: u32, body_text_color: Color, title_text_color: Color) -> Self {
        Self {
            color: color.opaque(),
            population,
            body_text_color,
            title_text_color,
        }
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn population(&self) -> u32 {
        self.population
    }

    pub fn body_text_color(&self) -> Color {
        self.body_text_color
    }

    pub fn title_text_color(&self) -> Color {
        self.title_text_color
    }
}

/// Prefers white text, then black, then whichever passes for each role.
fn text_colors_for(color: Color) -> (Color, Color) {
    let light_body = minimum_alpha(WHITE, color, MIN_CONTRAST_BODY_TEXT);
    let light_title = minimum_alpha(WHITE, color, MIN_CONTRAST_TITLE_TEXT);
    if let (Some(body), Some(title)) = (light_body, light_title) {
        return (WHITE.with_alpha(body), WHITE.with_alpha(title));
    }

    let dark_body = minimum_alpha(BLACK, color, MIN_CONTRAST_BODY_TEXT);
    let dark_title = minimum_alpha(BLACK, color, MIN_CONTRAST_TITLE_TEXT);
    if let (Some(body), Some(title)) = (dark_body, dark_title) {
        return (BLACK.with_alpha(body), BLACK.with_alpha(title));
    }

    let pick = |light: Option<u8>, dark: Option<u8>| match (light, dark) {
        (Some(a), _) => WHITE.with_alpha(a),
        (None, Some(a)) => BLACK.with_alpha(a),
        (None, None) => BLACK,
    };
    (pick(light_body, dark_body), pick(light_title, dark_title))
}

/// Reduces an image to a handful of swatches.
pub trait PaletteQuantizer {
    /// Returns at most `max_colors` swatches. Order carries no meaning.
    fn quantize(&self, image: &RgbaImage, max_colors: usize) -> Vec<Swatch>;
}

impl<T: PaletteQuantizer + ?Sized> PaletteQuantizer for &T {
    fn quantize(&self, image: &RgbaImage, max_colors: usize) -> Vec<Swatch> {
        (**self).quantize(image, max_colors)
    }
}

/// Median cut over a 5-bit-per-channel histogram.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianCutQuantizer;

impl PaletteQuantizer for MedianCutQuantizer {
    fn quantize(&self, image: &RgbaImage, max_colors: usize) -> Vec<Swatch> {
        if max_colors == 0 {
            return Vec::new();
        }

        let mut hist = vec![0u32; HISTOGRAM_SIZE];
        for p in image.pixels() {
            let [r, g, b, a] = p.0;
            if a == 0 {
                continue;
            }
            let idx = quantize_rgb(r, g, b) as usize;
            hist[idx] = hist[idx].saturating_add(1);
        }

        let mut colors: Vec<u16> = hist
            .iter()
            .enumerate()
            .filter(|&(_, &count)| count > 0)
            .map(|(i, _)| i as u16)
            .collect();

        if colors.len() <= max_colors {
            return colors
                .iter()
                .map(|&c| {
                    let (r, g, b) = unpack(c);
                    Swatch::new(Color::rgb(widen(r), widen(g), widen(b)), hist[c as usize])
                })
                .collect();
        }

        let mut queue = BinaryHeap::with_capacity(max_colors);
        queue.push(ColorBox::new(&colors, &hist, 0, colors.len() - 1));
        while queue.len() < max_colors {
            let Some(largest) = queue.pop() else { break };
            if !largest.can_split() {
                queue.push(largest);
                break;
            }
            let (lo, hi) = largest.split(&mut colors, &hist);
            queue.push(lo);
            queue.push(hi);
        }

        queue.into_iter().map(|b| b.average_swatch(&colors, &hist)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Red,
    Green,
    Blue,
}

/// Inclusive range `lower..=upper` of `colors` plus its bounding box.
#[derive(Debug, Clone, Copy)]
struct ColorBox {
    lower: usize,
    upper: usize,
    population: u64,
    min: [u8; 3],
    max: [u8; 3],
}

impl ColorBox {
    fn new(colors: &[u16], hist: &[u32], lower: usize, upper: usize) -> Self {
        let mut min = [u8::MAX; 3];
        let mut max = [0u8; 3];
        let mut population = 0u64;
        for &c in &colors[lower..=upper] {
            population += hist[c as usize] as u64;
            let (r, g, b) = unpack(c);
            for (i, v) in [r, g, b].into_iter().enumerate() {
                min[i] = min[i].min(v);
                max[i] = max[i].max(v);
            }
        }
        Self {
            lower,
            upper,
            population,
            min,
            max,
        }
    }

    fn volume(&self) -> u32 {
        (0..3)
            .map(|i| (self.max[i] - self.min[i]) as u32 + 1)
            .product()
    }

    fn can_split(&self) -> bool {
        self.upper > self.lower
    }

    fn longest_channel(&self) -> Channel {
        let len = |i: usize| self.max[i] - self.min[i];
        let (r, g, b) = (len(0), len(1), len(2));
        if r >= g && r >= b {
            Channel::Red
        } else if g >= r && g >= b {
            Channel::Green
        } else {
            Channel::Blue
        }
    }

    /// Splits at the population median along the longest channel.
    fn split(self, colors: &mut [u16], hist: &[u32]) -> (ColorBox, ColorBox) {
        let channel = self.longest_channel();
        colors[self.lower..=self.upper].sort_unstable_by_key(|&c| (channel_value(c, channel), c));

        let midpoint = self.population / 2;
        let mut count = 0u64;
        let mut split_at = self.lower;
        for i in self.lower..=self.upper {
            count += hist[colors[i] as usize] as u64;
            if count >= midpoint {
                split_at = i.min(self.upper - 1);
                break;
            }
        }

        (
            ColorBox::new(colors, hist, self.lower, split_at),
            ColorBox::new(colors, hist, split_at + 1, self.upper),
        )
    }

    fn average_swatch(&self, colors: &[u16], hist: &[u32]) -> Swatch {
        let mut sums = [0u64; 3];
        for &c in &colors[self.lower..=self.upper] {
            let count = hist[c as usize] as u64;
            let (r, g, b) = unpack(c);
            sums[0] += r as u64 * count;
            sums[1] += g as u64 * count;
            sums[2] += b as u64 * count;
        }
        let total = self.population.max(1) as f64;
        let mean = |sum: u64| (sum as f64 / total).round() as u8;
        let color = Color::rgb(widen(mean(sums[0])), widen(mean(sums[1])), widen(mean(sums[2])));
        Swatch::new(color, self.population.min(u32::MAX as u64) as u32)
    }
}

impl PartialEq for ColorBox {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ColorBox {}

impl PartialOrd for ColorBox {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Max-heap on volume; the lower index breaks ties so the queue is deterministic.
impl Ord for ColorBox {
    fn cmp(&self, other: &Self) -> Ordering {
        self.volume()
            .cmp(&other.volume())
            .then_with(|| other.lower.cmp(&self.lower))
    }
}

fn quantize_rgb(r: u8, g: u8, b: u8) -> u16 {
    let ri = (r >> 3) as u16;
    let gi = (g >> 3) as u16;
    let bi = (b >> 3) as u16;
    (ri << 10) | (gi << 5) | bi
}

fn unpack(c: u16) -> (u8, u8, u8) {
    (
        ((c >> 10) & QUANTIZE_WORD_MASK) as u8,
        ((c >> 5) & QUANTIZE_WORD_MASK) as u8,
        (c & QUANTIZE_WORD_MASK) as u8,
    )
}

fn channel_value(c: u16, channel: Channel) -> u8 {
    let (r, g, b) = unpack(c);
    match channel {
        Channel::Red => r,
        Channel::Green => g,
        Channel::Blue => b,
    }
}

// Bucket value back to 8 bits.
fn widen(v5: u8) -> u8 {
    (v5 << 3) | (v5 >> 2)
}
