//! Spectrum-based level metric.
//!
//! Mirrors a browser analyser node: a Blackman-windowed 256-point transform,
//! per-bin magnitudes smoothed over time, converted to decibels and scaled
//! onto bytes between `MIN_DECIBELS` and `MAX_DECIBELS`. The level is the RMS
//! of those bytes mapped onto 0-100.

use std::f32::consts::PI;

pub const FFT_SIZE: usize = 256;
pub const BIN_COUNT: usize = FFT_SIZE / 2;
pub const SMOOTHING_TIME_CONSTANT: f32 = 0.8;
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;
const BLACKMAN_ALPHA: f32 = 0.16;

pub struct LevelAnalyser {
    window: Vec<f32>,
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
}

impl Default for LevelAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelAnalyser {
    pub fn new() -> Self {
        let a0 = 0.5 * (1.0 - BLACKMAN_ALPHA);
        let a1 = 0.5;
        let a2 = 0.5 * BLACKMAN_ALPHA;
        let n = FFT_SIZE as f32;

        let window = (0..FFT_SIZE)
            .map(|i| {
                let x = i as f32 / n;
                a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
            })
            .collect();
        let cos_table = (0..FFT_SIZE)
            .map(|i| (2.0 * PI * i as f32 / n).cos())
            .collect();
        let sin_table = (0..FFT_SIZE)
            .map(|i| (2.0 * PI * i as f32 / n).sin())
            .collect();

        Self {
            window,
            cos_table,
            sin_table,
            smoothed: vec![0.0; BIN_COUNT],
            bytes: vec![0; BIN_COUNT],
        }
    }

    /// Byte spectrum of the newest `FFT_SIZE` samples in `frame`. Shorter
    /// frames are zero-padded at the front.
    pub fn byte_frequency_data(&mut self, frame: &[f32]) -> &[u8] {
        let tail = &frame[frame.len().saturating_sub(FFT_SIZE)..];
        let offset = FFT_SIZE - tail.len();

        let mut windowed = [0.0f32; FFT_SIZE];
        for (i, sample) in tail.iter().enumerate() {
            windowed[offset + i] = sample * self.window[offset + i];
        }

        for k in 0..BIN_COUNT {
            let mut real = 0.0f32;
            let mut imag = 0.0f32;
            for (n, x) in windowed.iter().enumerate() {
                let idx = (k * n) % FFT_SIZE;
                real += x * self.cos_table[idx];
                imag -= x * self.sin_table[idx];
            }

            let magnitude = (real * real + imag * imag).sqrt() / FFT_SIZE as f32;
            let smoothed = SMOOTHING_TIME_CONSTANT * self.smoothed[k]
                + (1.0 - SMOOTHING_TIME_CONSTANT) * magnitude;
            self.smoothed[k] = if smoothed.is_finite() { smoothed } else { 0.0 };

            let decibels = 20.0 * self.smoothed[k].log10();
            let scaled = 255.0 * (decibels - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS);
            self.bytes[k] = if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, 255.0) as u8
            };
        }

        &self.bytes
    }

    /// 0-100 level for `frame`, advancing the smoothing state.
    pub fn analyse(&mut self, frame: &[f32]) -> f64 {
        let bytes = self.byte_frequency_data(frame);
        level_from_bytes(bytes)
    }
}

/// `min(100, rms / 128 * 100)` over the byte spectrum.
pub fn level_from_bytes(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let sum: f64 = bytes.iter().map(|&b| f64::from(b) * f64::from(b)).sum();
    let rms = (sum / bytes.len() as f64).sqrt();
    (rms / 128.0 * 100.0).min(100.0)
}
