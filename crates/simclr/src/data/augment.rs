//! Stochastic view generation for contrastive training.
//!
//! `SimclrAugment` follows the CIFAR-10 SimCLR recipe: random resized crop,
//! horizontal flip, color jitter (applied with probability), random grayscale,
//! then per-channel normalization into a CHW `f32` buffer.
//!
//! Hue rotation and grayscale come from `image::imageops`; brightness,
//! contrast and saturation are multiplicative blends (`imageops::brighten`
//! is additive).

use burn::prelude::*;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

/// One augmented rendering of an image: CHW `f32`, normalized.
pub type View = Vec<f32>;

/// CIFAR-10 per-channel mean (RGB, [0, 1] scale).
pub const CIFAR10_MEAN: [f32; 3] = [0.4914, 0.4822, 0.4465];
/// CIFAR-10 per-channel standard deviation.
pub const CIFAR10_STD: [f32; 3] = [0.2470, 0.2435, 0.2616];

const CROP_ATTEMPTS: usize = 10;
const MIN_ASPECT: f64 = 3.0 / 4.0;
const MAX_ASPECT: f64 = 4.0 / 3.0;

/// A transform from a source image to a tensor-ready view.
///
/// Implementations must draw all randomness from `rng` so that two calls on
/// the same image are independent draws.
pub trait Augment: Send + Sync {
    /// Produce one view of `image`.
    fn view(&self, image: &RgbImage, rng: &mut dyn RngCore) -> View;

    /// Shape `[channels, height, width]` of every view.
    fn view_shape(&self) -> [usize; 3];
}

/// Parameters of the SimCLR augmentation pipeline.
#[derive(Config, Debug)]
pub struct AugmentConfig {
    /// Output side length in pixels.
    #[config(default = 32)]
    pub image_size: usize,
    /// Lower bound of the crop area fraction.
    #[config(default = 0.08)]
    pub min_crop_scale: f64,
    /// Color distortion strength `s`: brightness/contrast/saturation 0.8s, hue 0.2s.
    #[config(default = 0.5)]
    pub jitter_strength: f64,
    #[config(default = 0.5)]
    pub flip_prob: f64,
    #[config(default = 0.8)]
    pub jitter_prob: f64,
    #[config(default = 0.2)]
    pub grayscale_prob: f64,
    #[config(default = "CIFAR10_MEAN")]
    pub mean: [f32; 3],
    #[config(default = "CIFAR10_STD")]
    pub std: [f32; 3],
}

impl AugmentConfig {
    pub fn init(&self) -> SimclrAugment {
        SimclrAugment {
            config: self.clone(),
        }
    }
}

/// The stochastic SimCLR pipeline.
#[derive(Debug, Clone)]
pub struct SimclrAugment {
    config: AugmentConfig,
}

impl Augment for SimclrAugment {
    fn view(&self, image: &RgbImage, rng: &mut dyn RngCore) -> View {
        let c = &self.config;
        let size = c.image_size as u32;

        let mut img = random_resized_crop(image, size, c.min_crop_scale, rng);
        if rng.gen_bool(c.flip_prob) {
            imageops::flip_horizontal_in_place(&mut img);
        }

        if rng.gen_bool(c.jitter_prob) {
            color_jitter(&mut img, c.jitter_strength, rng);
        }
        if rng.gen_bool(c.grayscale_prob) {
            img = grayscale(&img);
        }
        to_normalized_chw(&to_unit_pixels(&img), &c.mean, &c.std)
    }

    fn view_shape(&self) -> [usize; 3] {
        [3, self.config.image_size, self.config.image_size]
    }
}

/// Deterministic pipeline: resize to `image_size` if needed, then normalize.
#[derive(Debug, Clone)]
pub struct Normalize {
    image_size: usize,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Normalize {
    pub fn new(image_size: usize, mean: [f32; 3], std: [f32; 3]) -> Self {
        Self {
            image_size,
            mean,
            std,
        }
    }

    pub fn cifar10() -> Self {
        Self::new(32, CIFAR10_MEAN, CIFAR10_STD)
    }
}

impl Augment for Normalize {
    fn view(&self, image: &RgbImage, _rng: &mut dyn RngCore) -> View {
        let size = self.image_size as u32;
        let pixels = if image.dimensions() == (size, size) {
            to_unit_pixels(image)
        } else {
            to_unit_pixels(&imageops::resize(image, size, size, FilterType::Triangle))
        };
        to_normalized_chw(&pixels, &self.mean, &self.std)
    }

    fn view_shape(&self) -> [usize; 3] {
        [3, self.image_size, self.image_size]
    }
}

/// Crop a random region (area fraction in `[min_scale, 1]`, aspect ratio
/// log-uniform in `[3/4, 4/3]`) and resize it to `size x size`.
///
/// Falls back to a center crop clamped to the aspect range when no sampled
/// region fits inside the image.
fn random_resized_crop(
    image: &RgbImage,
    size: u32,
    min_scale: f64,
    rng: &mut dyn RngCore,
) -> RgbImage {
    let (w, h) = image.dimensions();
    let area = (w * h) as f64;

    for _ in 0..CROP_ATTEMPTS {
        let target_area = area * rng.gen_range(min_scale..=1.0);
        let aspect = rng
            .gen_range(MIN_ASPECT.ln()..=MAX_ASPECT.ln())
            .exp();
        let cw = (target_area * aspect).sqrt().round() as u32;
        let ch = (target_area / aspect).sqrt().round() as u32;
        if cw > 0 && ch > 0 && cw <= w && ch <= h {
            let x = rng.gen_range(0..=w - cw);
            let y = rng.gen_range(0..=h - ch);
            let crop = imageops::crop_imm(image, x, y, cw, ch).to_image();
            return imageops::resize(&crop, size, size, FilterType::Triangle);
        }
    }

    let ratio = w as f64 / h as f64;
    let (cw, ch) = if ratio < MIN_ASPECT {
        (w, ((w as f64 / MIN_ASPECT).round() as u32).min(h))
    } else if ratio > MAX_ASPECT {
        (((h as f64 * MAX_ASPECT).round() as u32).min(w), h)
    } else {
        (w, h)
    };
    let crop = imageops::crop_imm(image, (w - cw) / 2, (h - ch) / 2, cw, ch).to_image();
    imageops::resize(&crop, size, size, FilterType::Triangle)
}

fn to_unit_pixels(image: &RgbImage) -> Vec<[f32; 3]> {
    image
        .pixels()
        .map(|p| {
            let [r, g, b] = p.0;
            [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0]
        })
        .collect()
}

fn to_normalized_chw(pixels: &[[f32; 3]], mean: &[f32; 3], std: &[f32; 3]) -> View {
    let n = pixels.len();
    let mut out = vec![0.0_f32; 3 * n];
    for (i, px) in pixels.iter().enumerate() {
        for c in 0..3 {
            out[c * n + i] = (px[c] - mean[c]) / std[c];
        }
    }
    out
}

fn luma(px: &Rgb<u8>) -> f32 {
    let [r, g, b] = px.0;
    0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32
}

fn grayscale(image: &RgbImage) -> RgbImage {
    DynamicImage::ImageLuma8(imageops::grayscale(image)).into_rgb8()
}

/// Brightness, contrast, saturation and hue jitter in random order.
fn color_jitter(image: &mut RgbImage, strength: f64, rng: &mut dyn RngCore) {
    let spread = 0.8 * strength;
    let low = (1.0 - spread).max(0.0);
    let brightness = rng.gen_range(low..=1.0 + spread) as f32;
    let contrast = rng.gen_range(low..=1.0 + spread) as f32;
    let saturation = rng.gen_range(low..=1.0 + spread) as f32;
    let hue_span = (0.2 * strength).min(0.5);
    let hue = rng.gen_range(-hue_span..=hue_span);

    let mut order = [0usize, 1, 2, 3];
    order.shuffle(rng);

    for op in order {
        match op {
            0 => blend_towards(image, brightness, |_| [0.0; 3]),
            1 => {
                let n = image.pixels().len().max(1) as f32;
                let mean = image.pixels().map(luma).sum::<f32>() / n;
                blend_towards(image, contrast, |_| [mean; 3]);
            }
            2 => blend_towards(image, saturation, |px| [luma(px); 3]),
            _ => *image = imageops::huerotate(&*image, (hue * 360.0).round() as i32),
        }
    }
}

/// `px = anchor + factor * (px - anchor)`, clamped to the `u8` range.
fn blend_towards(image: &mut RgbImage, factor: f32, anchor: impl Fn(&Rgb<u8>) -> [f32; 3]) {
    for px in image.pixels_mut() {
        let a = anchor(px);
        for c in 0..3 {
            let v = a[c] + factor * (px.0[c] as f32 - a[c]);
            px.0[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn gradient_image(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            image::Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 3 % 256) as u8])
        })
    }

    #[test]
    fn test_view_has_configured_shape() {
        let augment = AugmentConfig::new().with_image_size(16).init();
        let mut rng = StdRng::seed_from_u64(0);
        let view = augment.view(&gradient_image(32, 32), &mut rng);
        assert_eq!(augment.view_shape(), [3, 16, 16]);
        assert_eq!(view.len(), 3 * 16 * 16);
        assert!(view.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_two_draws_differ() {
        let augment = AugmentConfig::new().init();
        let image = gradient_image(32, 32);
        let mut rng = StdRng::seed_from_u64(42);
        let a = augment.view(&image, &mut rng);
        let b = augment.view(&image, &mut rng);
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b, "independent draws should not be bit-identical");
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let normalize = Normalize::cifar10();
        let image = RgbImage::from_pixel(32, 32, image::Rgb([255, 0, 0]));
        let mut rng = StdRng::seed_from_u64(1);
        let a = normalize.view(&image, &mut rng);
        let b = normalize.view(&image, &mut rng);
        assert_eq!(a, b);

        let plane = 32 * 32;
        let expected_r = (1.0 - CIFAR10_MEAN[0]) / CIFAR10_STD[0];
        let expected_g = (0.0 - CIFAR10_MEAN[1]) / CIFAR10_STD[1];
        assert!((a[0] - expected_r).abs() < 1e-5);
        assert!((a[plane] - expected_g).abs() < 1e-5);
    }

    #[test]
    fn test_normalize_resizes_other_sizes() {
        let normalize = Normalize::new(8, [0.0; 3], [1.0; 3]);
        let mut rng = StdRng::seed_from_u64(1);
        let view = normalize.view(&gradient_image(20, 12), &mut rng);
        assert_eq!(view.len(), 3 * 8 * 8);
    }

    #[test]
    fn test_resized_crop_non_square_input() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let out = random_resized_crop(&gradient_image(40, 10), 12, 0.08, &mut rng);
            assert_eq!(out.dimensions(), (12, 12));
        }
    }

    #[test]
    fn test_grayscale_equalizes_channels() {
        let gray = grayscale(&gradient_image(6, 4));
        assert_eq!(gray.dimensions(), (6, 4));
        for px in gray.pixels() {
            assert_eq!(px.0[0], px.0[1]);
            assert_eq!(px.0[1], px.0[2]);
        }
    }

    #[test]
    fn test_blend_endpoints() {
        let image = gradient_image(5, 5);

        let mut same = image.clone();
        blend_towards(&mut same, 1.0, |_| [128.0; 3]);
        assert_eq!(same, image);

        let mut flat = image.clone();
        blend_towards(&mut flat, 0.0, |_| [128.0; 3]);
        assert!(flat.pixels().all(|px| px.0 == [128, 128, 128]));

        let mut dark = image;
        blend_towards(&mut dark, 0.0, |_| [0.0; 3]);
        assert!(dark.pixels().all(|px| px.0 == [0, 0, 0]));
    }

    #[test]
    fn test_jitter_changes_colors() {
        let image = gradient_image(16, 16);
        let mut rng = StdRng::seed_from_u64(9);
        let changed = (0..5).any(|_| {
            let mut jittered = image.clone();
            color_jitter(&mut jittered, 1.0, &mut rng);
            jittered != image
        });
        assert!(changed);
    }
}
