//! Fundamental frequency estimation
//!
//! The estimator sees one capture block per call and keeps a rolling analysis
//! window of recent samples, so short hops still get enough periods to lock on
//! low notes. Pitch is picked from the normalized square difference function
//! (McLeod pitch method) computed with an FFT autocorrelation.

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Default analysis window, four hops of 512 frames
pub const DEFAULT_WINDOW_SIZE: usize = 2048;

/// Lowest and highest fundamentals the estimator searches for
const MIN_FREQUENCY: f32 = 40.0;
const MAX_FREQUENCY: f32 = 2000.0;

/// Fraction of the highest key maximum a peak must reach to be picked
const PEAK_THRESHOLD: f32 = 0.93;
/// Below this clarity the block is reported as unpitched
const CLARITY_FLOOR: f32 = 0.5;

/// Turns audio blocks into a frequency estimate in Hz
/// Returns 0.0 when no pitch is found
pub trait FrequencyEstimator {
    fn estimate(&mut self, block: &[f32]) -> f32;
}

/// Mean squared sample value of a block
pub fn mean_square(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    block.iter().map(|s| s * s).sum::<f32>() / block.len() as f32
}

pub struct AutocorrelationEstimator {
    sample_rate: f32,
    history: Vec<f32>,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
    fft_input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    correlation: Vec<f32>,
    forward_scratch: Vec<Complex<f32>>,
    inverse_scratch: Vec<Complex<f32>>,
    nsdf: Vec<f32>,
    min_lag: usize,
    max_lag: usize,
}

impl AutocorrelationEstimator {
    pub fn new(sample_rate: u32, window_size: usize) -> Self {
        let sample_rate = sample_rate as f32;
        let window_size = window_size.max(64);

        let max_lag = ((sample_rate / MIN_FREQUENCY) as usize).min(window_size - 2);
        let min_lag = ((sample_rate / MAX_FREQUENCY) as usize).max(2);

        // Zero padding to window + lags avoids circular wrap-around
        let fft_size = (window_size + max_lag).next_power_of_two();
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        Self {
            sample_rate,
            history: vec![0.0; window_size],
            fft_input: forward.make_input_vec(),
            spectrum: forward.make_output_vec(),
            correlation: inverse.make_output_vec(),
            forward_scratch: forward.make_scratch_vec(),
            inverse_scratch: inverse.make_scratch_vec(),
            forward,
            inverse,
            nsdf: vec![0.0; max_lag + 2],
            min_lag,
            max_lag,
        }
    }

    /// Slide the analysis window forward by one block
    fn push_block(&mut self, block: &[f32]) {
        let window = self.history.len();
        if block.len() >= window {
            self.history.copy_from_slice(&block[block.len() - window..]);
        } else {
            self.history.copy_within(block.len().., 0);
            self.history[window - block.len()..].copy_from_slice(block);
        }
    }

    /// Fill `self.nsdf` for lags `0..=max_lag + 1`
    /// Returns false when the window holds no energy or the FFT fails
    fn compute_nsdf(&mut self) -> bool {
        let window = self.history.len();
        let energy: f32 = self.history.iter().map(|s| s * s).sum();
        if energy <= f32::EPSILON {
            return false;
        }

        self.fft_input[..window].copy_from_slice(&self.history);
        self.fft_input[window..].iter_mut().for_each(|s| *s = 0.0);

        if self
            .forward
            .process_with_scratch(&mut self.fft_input, &mut self.spectrum, &mut self.forward_scratch)
            .is_err()
        {
            return false;
        }

        // Power spectrum, purely real so the inverse transform accepts it
        for bin in self.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }

        if self
            .inverse
            .process_with_scratch(&mut self.spectrum, &mut self.correlation, &mut self.inverse_scratch)
            .is_err()
        {
            return false;
        }

        let scale = 1.0 / self.correlation.len() as f32;
        let mut m = 2.0 * energy;
        self.nsdf[0] = 1.0;
        for lag in 1..self.nsdf.len() {
            let leaving_front = self.history[lag - 1];
            let leaving_back = self.history[window - lag];
            m -= leaving_front * leaving_front + leaving_back * leaving_back;

            let r = self.correlation[lag] * scale;
            self.nsdf[lag] = if m > f32::EPSILON { 2.0 * r / m } else { 0.0 };
        }

        true
    }

    /// Highest point of each positive lobe after the first zero crossing
    fn key_maxima(&self) -> Vec<(usize, f32)> {
        let mut maxima = Vec::new();
        let mut seen_negative = false;
        let mut lobe: Option<(usize, f32)> = None;

        for lag in 1..=self.max_lag {
            let value = self.nsdf[lag];
            if !seen_negative {
                seen_negative = value < 0.0;
                continue;
            }

            if value > 0.0 {
                match lobe {
                    Some((_, best)) if best >= value => {}
                    _ => lobe = Some((lag, value)),
                }
            } else if let Some(peak) = lobe.take() {
                maxima.push(peak);
            }
        }

        if let Some(peak) = lobe {
            maxima.push(peak);
        }

        maxima.retain(|(lag, _)| *lag >= self.min_lag);
        maxima
    }

    /// Sub-sample peak position from a parabola through the neighbours
    fn refine(&self, lag: usize) -> f32 {
        let left = self.nsdf[lag - 1];
        let center = self.nsdf[lag];
        let right = self.nsdf[lag + 1];

        let denominator = left - 2.0 * center + right;
        if denominator.abs() <= f32::EPSILON {
            return lag as f32;
        }
        lag as f32 + 0.5 * (left - right) / denominator
    }
}

impl FrequencyEstimator for AutocorrelationEstimator {
    fn estimate(&mut self, block: &[f32]) -> f32 {
        self.push_block(block);

        if !self.compute_nsdf() {
            return 0.0;
        }

        let maxima = self.key_maxima();
        let highest = maxima.iter().map(|(_, value)| *value).fold(0.0_f32, f32::max);
        if highest < CLARITY_FLOOR {
            return 0.0;
        }

        let threshold = highest * PEAK_THRESHOLD;
        match maxima.iter().find(|(_, value)| *value >= threshold) {
            Some(&(lag, _)) => self.sample_rate / self.refine(lag),
            None => 0.0,
        }
    }
}
