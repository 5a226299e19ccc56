// ReelForge Noise Sampler
// Copyright (c) 2026 Xing_The_Creator | ReelForge
//
// Built-in DDPM-style sampler. Each frame starts as standard-normal noise
// and is walked back through a linear beta schedule toward a smooth
// procedural field. The field drifts between frames so the segment moves.
//
// Rows are independent, so each row gets its own RNG seeded from the
// model RNG. That keeps output byte-identical for a given seed while rayon
// spreads the rows across cores.

use super::{frame_len, DiffusionModel, Frame, ModelError};
use crate::config::NoiseModelConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::f32::consts::TAU;

/// Posterior coefficients for one reverse step:
/// x_{t-1} = c_x0 * x0 + c_xt * x_t + sigma * z
#[derive(Debug, Clone, Copy)]
struct StepCoefficients {
    c_x0: f32,
    c_xt: f32,
    sigma: f32,
}

/// Linear schedule stretched so that few steps still start from pure noise.
fn build_schedule(steps: u32) -> Vec<StepCoefficients> {
    let n = steps.max(1) as usize;
    let scale = 1000.0 / n as f64;
    let beta_start = (1e-4 * scale).min(0.999);
    let beta_end = (0.02 * scale).min(0.999);

    let betas: Vec<f64> = (0..n)
        .map(|i| {
            if n == 1 {
                beta_end
            } else {
                beta_start + (beta_end - beta_start) * i as f64 / (n - 1) as f64
            }
        })
        .collect();

    let mut alpha_bars = Vec::with_capacity(n);
    let mut acc = 1.0f64;
    for beta in &betas {
        acc *= 1.0 - beta;
        alpha_bars.push(acc);
    }

    (0..n)
        .map(|t| {
            let beta = betas[t];
            let alpha = 1.0 - beta;
            let ab = alpha_bars[t];
            let ab_prev = if t == 0 { 1.0 } else { alpha_bars[t - 1] };
            let denom = (1.0 - ab).max(1e-12);
            StepCoefficients {
                c_x0: (ab_prev.sqrt() * beta / denom) as f32,
                c_xt: (alpha.sqrt() * (1.0 - ab_prev) / denom) as f32,
                sigma: (beta * (1.0 - ab_prev) / denom).max(0.0).sqrt() as f32,
            }
        })
        .collect()
}

/// Box-Muller; rand 0.8 has no normal distribution without rand_distr.
fn standard_normal(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Shape of the target field. Drawn once per model so a seed fixes the "scene".
#[derive(Debug, Clone, Copy)]
struct FieldParams {
    freq_x: [f32; 3],
    freq_y: [f32; 3],
    phase: [f32; 3],
}

impl FieldParams {
    fn random(rng: &mut StdRng) -> Self {
        let mut p = FieldParams {
            freq_x: [0.0; 3],
            freq_y: [0.0; 3],
            phase: [0.0; 3],
        };
        for c in 0..3 {
            p.freq_x[c] = rng.gen_range(0.5..3.0);
            p.freq_y[c] = rng.gen_range(0.5..3.0);
            p.phase[c] = rng.gen_range(0.0..1.0);
        }
        p
    }

    /// Clean signal in [-1, 1] for channel `c` at normalised (u, v) and time `t`.
    fn value(&self, c: usize, u: f32, v: f32, t: f32) -> f32 {
        let a = (TAU * (self.freq_x[c] * u + self.phase[c] + t)).sin();
        let b = (TAU * (self.freq_y[c] * v - 0.5 * t + self.phase[c])).cos();
        0.9 * a * b
    }
}

pub struct NoiseSampler {
    config: NoiseModelConfig,
    rng: StdRng,
    field: FieldParams,
    schedule: Vec<StepCoefficients>,
    frame_index: u64,
}

impl NoiseSampler {
    pub fn new(config: NoiseModelConfig, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let field = FieldParams::random(&mut rng);
        let schedule = build_schedule(config.steps);
        Self {
            config,
            rng,
            field,
            schedule,
            frame_index: 0,
        }
    }

    fn denoise_row(&self, row: &mut [u8], y: u32, row_seed: u64, time: f32) {
        let width = self.config.width;
        let height = self.config.height;
        let mut rng = StdRng::seed_from_u64(row_seed);
        let v = if height > 1 { y as f32 / (height - 1) as f32 } else { 0.0 };

        for x in 0..width {
            let u = if width > 1 { x as f32 / (width - 1) as f32 } else { 0.0 };
            for c in 0..3 {
                let x0 = self.field.value(c, u, v, time);
                let mut xt = standard_normal(&mut rng);
                for (t, step) in self.schedule.iter().enumerate().rev() {
                    xt = step.c_x0 * x0 + step.c_xt * xt;
                    if t > 0 {
                        xt += step.sigma * standard_normal(&mut rng);
                    }
                }
                xt += self.config.noise_floor * standard_normal(&mut rng);
                let px = ((xt.clamp(-1.0, 1.0) + 1.0) * 127.5).round() as u8;
                row[(x as usize) * 3 + c] = px;
            }
        }
    }
}

impl DiffusionModel for NoiseSampler {
    fn sample(&mut self) -> Result<Frame, ModelError> {
        let width = self.config.width;
        let height = self.config.height;
        let len = frame_len(width, height)?;
        let stride = width as usize * 3;
        let time = self.config.drift * self.frame_index as f32;

        let row_seeds: Vec<u64> = (0..height).map(|_| self.rng.gen()).collect();
        let mut buf = vec![0u8; len];

        let this = &*self;
        buf.par_chunks_mut(stride)
            .zip(row_seeds.par_iter())
            .enumerate()
            .for_each(|(y, (row, seed))| this.denoise_row(row, y as u32, *seed, time));

        self.frame_index += 1;
        Frame::from_raw(width, height, buf).ok_or(ModelError::Buffer(width, height))
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn name(&self) -> &str {
        "noise"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> NoiseModelConfig {
        NoiseModelConfig {
            width: 16,
            height: 9,
            steps: 10,
            drift: 0.1,
            noise_floor: 0.0,
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let mut a = NoiseSampler::new(small_config(), Some(42));
        let mut b = NoiseSampler::new(small_config(), Some(42));
        for _ in 0..3 {
            assert_eq!(a.sample().unwrap().into_raw(), b.sample().unwrap().into_raw());
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut a = NoiseSampler::new(small_config(), Some(1));
        let mut b = NoiseSampler::new(small_config(), Some(2));
        assert_ne!(a.sample().unwrap().into_raw(), b.sample().unwrap().into_raw());
    }

    #[test]
    fn test_consecutive_frames_change() {
        let mut model = NoiseSampler::new(small_config(), Some(3));
        let first = model.sample().unwrap();
        let second = model.sample().unwrap();
        assert_eq!(first.dimensions(), (16, 9));
        assert_ne!(first.into_raw(), second.into_raw());
    }

    #[test]
    fn test_schedule_ends_near_target() {
        // With no residual noise the last step must land on x0.
        let schedule = build_schedule(30);
        let last = schedule[0];
        assert!((last.c_x0 - 1.0).abs() < 1e-3, "c_x0 was {}", last.c_x0);
        assert!(last.c_xt.abs() < 1e-3);
        assert_eq!(last.sigma, 0.0);
    }

    #[test]
    fn test_single_step_schedule() {
        let schedule = build_schedule(1);
        assert_eq!(schedule.len(), 1);
        assert!(schedule[0].c_x0.is_finite());
    }

    #[test]
    fn test_one_pixel_frame() {
        let mut model = NoiseSampler::new(
            NoiseModelConfig {
                width: 1,
                height: 1,
                ..small_config()
            },
            None,
        );
        assert_eq!(model.sample().unwrap().dimensions(), (1, 1));
    }
}
