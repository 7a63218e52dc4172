//! PCM front-end that produces the byte buffers consumed by
//! [`AudioFeatureExtractor`](crate::AudioFeatureExtractor).
//!
//! The output matches what a browser analyser node reports: a Blackman
//! windowed FFT whose magnitudes are smoothed over time, converted to decibels
//! and mapped into `0..=255` between the configured decibel bounds, plus the
//! raw waveform mapped around 128.

use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AudioConfig, FeedbackError, Result};

/// Byte buffers for one analysis tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyserFrame {
    /// `fft_size / 2` frequency magnitudes.
    pub frequency: Vec<u8>,
    /// `fft_size` waveform samples centred on 128.
    pub time_domain: Vec<u8>,
}

pub struct Analyser {
    fft_size: usize,
    smoothing_time_constant: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    samples: Vec<f32>,
    smoothed: Vec<f32>,
    fft: FftResources,
}

impl Analyser {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let fft_size = config.fft_size;
        if !fft_size.is_power_of_two() || !(32..=32_768).contains(&fft_size) {
            return Err(FeedbackError::Initialization {
                component: "analyser",
                reason: format!("fft size {fft_size} must be a power of two in 32..=32768"),
            });
        }
        if !(0.0..=1.0).contains(&config.smoothing_time_constant) {
            return Err(FeedbackError::Initialization {
                component: "analyser",
                reason: format!(
                    "smoothing constant {} must be in 0..=1",
                    config.smoothing_time_constant
                ),
            });
        }
        if config.min_decibels >= config.max_decibels {
            return Err(FeedbackError::Initialization {
                component: "analyser",
                reason: format!(
                    "decibel range {}..{} is empty",
                    config.min_decibels, config.max_decibels
                ),
            });
        }

        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let fft = FftResources {
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        };

        Ok(Self {
            fft_size,
            smoothing_time_constant: config.smoothing_time_constant,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            window: blackman_window(fft_size),
            samples: vec![0.0; fft_size],
            smoothed: vec![0.0; fft_size / 2],
            fft,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Number of frequency bins in every [`AnalyserFrame`].
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Clears the sample history and the temporal smoothing.
    pub fn reset(&mut self) {
        self.samples.fill(0.0);
        self.smoothed.fill(0.0);
    }

    /// Appends a block of mono samples and analyses the most recent
    /// `fft_size` samples.
    pub fn process(&mut self, block: &[f32]) -> Result<AnalyserFrame> {
        self.push_samples(block);

        for ((slot, sample), weight) in self
            .fft
            .input
            .iter_mut()
            .zip(&self.samples)
            .zip(&self.window)
        {
            *slot = sample * weight;
        }
        self.fft.plan.process_with_scratch(
            &mut self.fft.input,
            &mut self.fft.spectrum,
            &mut self.fft.scratch,
        )?;

        let scale = 1.0 / self.fft_size as f32;
        let tau = self.smoothing_time_constant;
        let range = self.max_decibels - self.min_decibels;
        let mut frequency = Vec::with_capacity(self.smoothed.len());
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.fft.spectrum) {
            *smoothed = tau * *smoothed + (1.0 - tau) * bin.norm() * scale;
            let byte = if *smoothed > 0.0 {
                let db = 20.0 * smoothed.log10();
                (255.0 / range * (db - self.min_decibels)).clamp(0.0, 255.0)
            } else {
                0.0
            };
            frequency.push(byte as u8);
        }

        let time_domain = self
            .samples
            .iter()
            .map(|sample| (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8)
            .collect();

        Ok(AnalyserFrame {
            frequency,
            time_domain,
        })
    }

    fn push_samples(&mut self, block: &[f32]) {
        if block.len() >= self.fft_size {
            let tail = &block[block.len() - self.fft_size..];
            self.samples.copy_from_slice(tail);
            return;
        }
        self.samples.drain(..block.len());
        self.samples.extend_from_slice(block);
    }
}

struct FftResources {
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for Analyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.fft_size)
            .field("smoothing_time_constant", &self.smoothing_time_constant)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

fn blackman_window(len: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    (0..len)
        .map(|n| {
            let phase = 2.0 * PI * n as f32 / len as f32;
            A0 - A1 * phase.cos() + A2 * (2.0 * phase).cos()
        })
        .collect()
}
