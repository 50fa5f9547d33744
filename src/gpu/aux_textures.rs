//! Procedural auxiliary textures for the noise, burn and distort effects.
//!
//! Generated on the CPU as RGBA8 and uploaded once at startup.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::post_processing::AuxTexture;

/// Edge length of every generated texture.
pub const AUX_TEXTURE_SIZE: u32 = 256;

/// Tightly packed RGBA8 pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct AuxImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl AuxImage {
    fn from_fn(size: u32, mut f: impl FnMut(u32, u32) -> [u8; 4]) -> Self {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                data.extend_from_slice(&f(x, y));
            }
        }
        Self {
            width: size,
            height: size,
            data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * self.width + x) * 4) as usize;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}

pub fn generate(kind: AuxTexture, size: u32, seed: u64) -> AuxImage {
    match kind {
        AuxTexture::Noise => grey_noise(size, seed),
        AuxTexture::Burn => burn_map(size, seed),
        AuxTexture::Distort => distort_map(size, seed),
    }
}

/// Independent random grey per texel.
fn grey_noise(size: u32, seed: u64) -> AuxImage {
    let mut rng = StdRng::seed_from_u64(seed);
    AuxImage::from_fn(size, |_, _| {
        let v: u8 = rng.random();
        [v, v, v, 255]
    })
}

/// Tileable fractal value noise, stretched to cover the full 0..255 range
/// so the burn front sweeps every pixel once per cycle.
fn burn_map(size: u32, seed: u64) -> AuxImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let octaves: Vec<Lattice> = (0..5).map(|i| Lattice::new(4 << i, &mut rng)).collect();

    let mut heights = Vec::with_capacity((size * size) as usize);
    for y in 0..size {
        for x in 0..size {
            let (u, v) = (x as f32 / size as f32, y as f32 / size as f32);
            let mut h = 0.0;
            let mut amplitude = 1.0;
            for lattice in &octaves {
                h += lattice.sample(u, v) * amplitude;
                amplitude *= 0.5;
            }
            heights.push(h);
        }
    }

    let (min, max) = heights
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)));
    let range = (max - min).max(f32::EPSILON);

    let mut i = 0;
    AuxImage::from_fn(size, |_, _| {
        let v = ((heights[i] - min) / range * 255.0).round() as u8;
        i += 1;
        [v, v, v, 255]
    })
}

/// Faceted offset map: each cell of a jittered grid gets one random 2D
/// direction, stored as `0.5 + 0.5 * dir` in R and G.
fn distort_map(size: u32, seed: u64) -> AuxImage {
    const CELLS: u32 = 8;
    let mut rng = StdRng::seed_from_u64(seed);
    let directions: Vec<(f32, f32)> = (0..CELLS * CELLS)
        .map(|_| {
            let angle = rng.random::<f32>() * std::f32::consts::TAU;
            let length = rng.random_range(0.3..1.0f32);
            (angle.cos() * length, angle.sin() * length)
        })
        .collect();

    let cell_size = (size / CELLS).max(1);
    AuxImage::from_fn(size, |x, y| {
        let cx = (x / cell_size).min(CELLS - 1);
        let cy = (y / cell_size).min(CELLS - 1);
        let (dx, dy) = directions[(cy * CELLS + cx) as usize];
        [to_unorm(0.5 + 0.5 * dx), to_unorm(0.5 + 0.5 * dy), 128, 255]
    })
}

fn to_unorm(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Random values on a wrapping grid, sampled with smooth interpolation.
struct Lattice {
    cells: u32,
    values: Vec<f32>,
}

impl Lattice {
    fn new(cells: u32, rng: &mut StdRng) -> Self {
        let values = (0..cells * cells).map(|_| rng.random::<f32>()).collect();
        Self { cells, values }
    }

    fn at(&self, x: u32, y: u32) -> f32 {
        self.values[((y % self.cells) * self.cells + (x % self.cells)) as usize]
    }

    fn sample(&self, u: f32, v: f32) -> f32 {
        let fx = u * self.cells as f32;
        let fy = v * self.cells as f32;
        let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
        let smooth = |t: f32| t * t * (3.0 - 2.0 * t);
        let (tx, ty) = (smooth(fx.fract()), smooth(fy.fract()));

        let top = lerp(self.at(x0, y0), self.at(x0 + 1, y0), tx);
        let bottom = lerp(self.at(x0, y0 + 1), self.at(x0 + 1, y0 + 1), tx);
        lerp(top, bottom, ty)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        for kind in AuxTexture::ALL {
            let image = generate(kind, 64, 1);
            assert_eq!(image.width, 64);
            assert_eq!(image.height, 64);
            assert_eq!(image.data.len(), 64 * 64 * 4);
        }
    }

    #[test]
    fn test_deterministic_per_seed() {
        for kind in AuxTexture::ALL {
            assert_eq!(generate(kind, 32, 9), generate(kind, 32, 9));
        }
        assert_ne!(generate(AuxTexture::Noise, 32, 1), generate(AuxTexture::Noise, 32, 2));
    }

    #[test]
    fn test_burn_map_spans_full_range() {
        let image = generate(AuxTexture::Burn, 64, 3);
        let reds: Vec<u8> = image.data.chunks(4).map(|p| p[0]).collect();
        assert_eq!(reds.iter().min(), Some(&0));
        assert_eq!(reds.iter().max(), Some(&255));
    }

    #[test]
    fn test_noise_is_grey_and_opaque() {
        let image = generate(AuxTexture::Noise, 16, 5);
        for p in image.data.chunks(4) {
            assert_eq!(p[0], p[1]);
            assert_eq!(p[1], p[2]);
            assert_eq!(p[3], 255);
        }
    }

    #[test]
    fn test_distort_cells_are_flat() {
        let image = generate(AuxTexture::Distort, 64, 4);
        // 8x8 texel cells: every texel in a cell shares one direction.
        assert_eq!(image.pixel(0, 0), image.pixel(7, 7));
        assert_eq!(image.pixel(8, 0), image.pixel(15, 7));
    }
}
