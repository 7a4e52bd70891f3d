use std::io::Cursor;

use bytes::Bytes;
use domains::models::{CaptchaImage, CAPTCHA_HEIGHT, CAPTCHA_WIDTH};
use domains::ports::CaptchaRenderer;
use domains::{AppError, Result};
use image::{ImageFormat, Rgb, RgbImage};
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::font::{glyph, GLYPH_HEIGHT, GLYPH_WIDTH};

const SCALE: u32 = 4;
const CELL: u32 = 30;
const NOISE_DOTS: u32 = 400;
const NOISE_LINES: u32 = 6;

/// Noise source reproducible from the per-challenge seed.
struct Noise(StdRng);

impl Noise {
    fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }

    fn below(&mut self, n: u32) -> u32 {
        Uniform::new(0, n.max(1))
            .map(|d| d.sample(&mut self.0))
            .unwrap_or(0)
    }

    fn offset(&mut self, spread: i32) -> i32 {
        Uniform::new_inclusive(-spread, spread)
            .map(|d| d.sample(&mut self.0))
            .unwrap_or(0)
    }
}

/// Draws the challenge as a 200x80 PNG and runs it through `oxipng`.
#[derive(Debug, Clone)]
pub struct PngCaptchaRenderer {
    optimize: oxipng::Options,
}

impl Default for PngCaptchaRenderer {
    fn default() -> Self {
        Self {
            optimize: oxipng::Options::from_preset(1),
        }
    }
}

impl PngCaptchaRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn draw(&self, text: &str, noise: &mut Noise) -> RgbImage {
        let mut img = RgbImage::from_pixel(CAPTCHA_WIDTH, CAPTCHA_HEIGHT, Rgb([246, 244, 238]));

        for _ in 0..NOISE_LINES {
            let shade = 120 + noise.below(100) as u8;
            let from = (noise.below(CAPTCHA_WIDTH) as i32, noise.below(CAPTCHA_HEIGHT) as i32);
            let to = (noise.below(CAPTCHA_WIDTH) as i32, noise.below(CAPTCHA_HEIGHT) as i32);
            line(&mut img, from, to, Rgb([shade, shade, 200]));
        }

        let top = (CAPTCHA_HEIGHT - GLYPH_HEIGHT * SCALE) as i32 / 2;
        for (i, c) in text.chars().enumerate() {
            let Some(rows) = glyph(c) else { continue };
            let x0 = 12 + (i as u32 * CELL) as i32 + noise.offset(3);
            let y0 = top + noise.offset(8);
            let ink = Rgb([
                noise.below(90) as u8,
                noise.below(90) as u8,
                40 + noise.below(90) as u8,
            ]);
            for (row, bits) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if bits & (0x10 >> col) == 0 {
                        continue;
                    }
                    let px = x0 + (col * SCALE) as i32;
                    let py = y0 + (row as u32 * SCALE) as i32;
                    fill(&mut img, px, py, SCALE, ink);
                }
            }
        }

        for _ in 0..NOISE_DOTS {
            let x = noise.below(CAPTCHA_WIDTH);
            let y = noise.below(CAPTCHA_HEIGHT);
            let v = noise.below(256) as u8;
            img.put_pixel(x, y, Rgb([v, v, v]));
        }
        img
    }
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill(img: &mut RgbImage, x: i32, y: i32, size: u32, color: Rgb<u8>) {
    for dy in 0..size as i32 {
        for dx in 0..size as i32 {
            put(img, x + dx, y + dy, color);
        }
    }
}

fn line(img: &mut RgbImage, (x0, y0): (i32, i32), (x1, y1): (i32, i32), color: Rgb<u8>) {
    let steps = (x1 - x0).abs().max((y1 - y0).abs()).max(1);
    for s in 0..=steps {
        let x = x0 + (x1 - x0) * s / steps;
        let y = y0 + (y1 - y0) * s / steps;
        put(img, x, y, color);
    }
}

impl CaptchaRenderer for PngCaptchaRenderer {
    fn render(&self, text: &str, seed: u64) -> Result<CaptchaImage> {
        let img = self.draw(text, &mut Noise::new(seed));

        let mut raw = Cursor::new(Vec::new());
        img.write_to(&mut raw, ImageFormat::Png)
            .map_err(|e| AppError::Internal(format!("captcha encode: {e}")))?;
        let png = oxipng::optimize_from_memory(raw.get_ref(), &self.optimize)
            .map_err(|e| AppError::Internal(format!("captcha optimize: {e}")))?;

        Ok(CaptchaImage {
            bytes: Bytes::from(png),
            content_type: mime::IMAGE_PNG,
        })
    }
}
