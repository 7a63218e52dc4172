use std::{collections::VecDeque, fmt};

use serde::{Deserialize, Serialize};

use crate::AudioConfig;

const VOLUME_WINDOW: usize = 10;
const BEAT_COOLDOWN_MS: f64 = 300.0;
const BEAT_THRESHOLD_START: f32 = 0.3;
const BEAT_THRESHOLD_DECAY: f32 = 0.98;
const BEAT_THRESHOLD_FLOOR: f32 = 0.15;

/// Bin layout the band edges are expressed in; other buffer lengths are
/// scaled proportionally.
const REFERENCE_BINS: usize = 1024;
const BAND_EDGES: [(Band, usize, usize); 5] = [
    (Band::Bass, 0, 10),
    (Band::LowMid, 10, 40),
    (Band::Mid, 40, 160),
    (Band::HighMid, 160, 400),
    (Band::Treble, 400, 1024),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Band {
    Bass,
    LowMid,
    Mid,
    HighMid,
    Treble,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandEnergy {
    pub band: Band,
    /// Normalised [0, 1] mean energy of the band.
    pub energy: f32,
}

/// Feature set derived from one analysis tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFeatures {
    pub timestamp: f64,
    pub volume: f32,
    pub spectrum: Vec<BandEnergy>,
    /// True only on the tick a beat was detected.
    pub beat: bool,
    /// Frequency of the loudest bin, in Hz.
    pub pitch: f32,
    /// RMS of the time-domain buffer, normalised to [0, 1].
    pub waveform_rms: f32,
}

impl AudioFeatures {
    pub fn silent(timestamp: f64) -> Self {
        Self {
            timestamp,
            spectrum: BAND_EDGES
                .iter()
                .map(|(band, _, _)| BandEnergy {
                    band: *band,
                    energy: 0.0,
                })
                .collect(),
            ..Default::default()
        }
    }

    pub fn band(&self, band: Band) -> f32 {
        self.spectrum
            .iter()
            .find(|entry| entry.band == band)
            .map(|entry| entry.energy)
            .unwrap_or(0.0)
    }
}

/// Turns analyser byte buffers into [`AudioFeatures`].
///
/// Beat detection compares the bass band against a threshold that only ever
/// decays towards its floor; quiet passages therefore make later beats easier
/// to trigger.
pub struct AudioFeatureExtractor {
    sample_rate: u32,
    sensitivity: f32,
    smoothing: bool,
    volume_history: VecDeque<f32>,
    beat_threshold: f32,
    last_beat: Option<f64>,
}

impl AudioFeatureExtractor {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            sensitivity: 1.0,
            smoothing: true,
            volume_history: VecDeque::with_capacity(VOLUME_WINDOW),
            beat_threshold: BEAT_THRESHOLD_START,
            last_beat: None,
        }
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = sensitivity;
    }

    pub fn set_smoothing(&mut self, enabled: bool) {
        self.smoothing = enabled;
        if !enabled {
            self.volume_history.clear();
        }
    }

    pub fn beat_threshold(&self) -> f32 {
        self.beat_threshold
    }

    /// Clears the beat and volume state while preserving configuration.
    pub fn reset(&mut self) {
        self.volume_history.clear();
        self.beat_threshold = BEAT_THRESHOLD_START;
        self.last_beat = None;
    }

    /// Processes one analysis tick.
    pub fn ingest(&mut self, frequency: &[u8], time_domain: &[u8], now_ms: f64) -> AudioFeatures {
        if frequency.is_empty() {
            self.decay_threshold();
            return AudioFeatures {
                waveform_rms: waveform_rms(time_domain),
                ..AudioFeatures::silent(now_ms)
            };
        }

        let volume = self.update_volume(frequency);
        let spectrum = BAND_EDGES
            .iter()
            .map(|(band, start, end)| BandEnergy {
                band: *band,
                energy: (band_mean(frequency, *start, *end) * self.sensitivity).clamp(0.0, 1.0),
            })
            .collect();
        let beat = self.detect_beat(band_mean(frequency, 0, BAND_EDGES[0].2), now_ms);

        AudioFeatures {
            timestamp: now_ms,
            volume,
            spectrum,
            beat,
            pitch: self.dominant_frequency(frequency),
            waveform_rms: waveform_rms(time_domain),
        }
    }

    fn update_volume(&mut self, frequency: &[u8]) -> f32 {
        let mean_square = frequency
            .iter()
            .map(|&value| {
                let v = f32::from(value) / 255.0;
                v * v
            })
            .sum::<f32>()
            / frequency.len() as f32;
        let volume = (mean_square.sqrt() * self.sensitivity).clamp(0.0, 1.0);

        if !self.smoothing {
            return volume;
        }

        if self.volume_history.len() == VOLUME_WINDOW {
            self.volume_history.pop_front();
        }
        self.volume_history.push_back(volume);
        self.volume_history.iter().sum::<f32>() / self.volume_history.len() as f32
    }

    fn detect_beat(&mut self, bass_energy: f32, now_ms: f64) -> bool {
        let cooled_down = self
            .last_beat
            .map(|last| now_ms - last >= BEAT_COOLDOWN_MS)
            .unwrap_or(true);
        let beat = bass_energy > self.beat_threshold && cooled_down;
        if beat {
            self.last_beat = Some(now_ms);
        }
        self.decay_threshold();
        beat
    }

    fn decay_threshold(&mut self) {
        self.beat_threshold = (self.beat_threshold * BEAT_THRESHOLD_DECAY).max(BEAT_THRESHOLD_FLOOR);
    }

    fn dominant_frequency(&self, frequency: &[u8]) -> f32 {
        let (bin, peak) = frequency
            .iter()
            .enumerate()
            .fold((0, 0u8), |best, (index, &value)| {
                if value > best.1 {
                    (index, value)
                } else {
                    best
                }
            });
        if peak == 0 {
            return 0.0;
        }
        let nyquist = self.sample_rate as f32 * 0.5;
        bin as f32 / frequency.len() as f32 * nyquist
    }
}

impl fmt::Debug for AudioFeatureExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioFeatureExtractor")
            .field("sample_rate", &self.sample_rate)
            .field("sensitivity", &self.sensitivity)
            .field("smoothing", &self.smoothing)
            .field("beat_threshold", &self.beat_threshold)
            .field("last_beat", &self.last_beat)
            .finish()
    }
}

/// Mean of the bins that fall in `[start, end)` of the reference layout,
/// normalised to [0, 1].
fn band_mean(frequency: &[u8], start: usize, end: usize) -> f32 {
    let len = frequency.len();
    let from = (start * len / REFERENCE_BINS).min(len);
    let to = (end * len / REFERENCE_BINS).min(len);
    if to <= from {
        return 0.0;
    }

    let sum: u32 = frequency[from..to].iter().map(|&v| u32::from(v)).sum();
    sum as f32 / (to - from) as f32 / 255.0
}

fn waveform_rms(time_domain: &[u8]) -> f32 {
    if time_domain.is_empty() {
        return 0.0;
    }
    let sum: f32 = time_domain
        .iter()
        .map(|&sample| {
            let centred = (f32::from(sample) - 128.0) / 128.0;
            centred * centred
        })
        .sum();
    (sum / time_domain.len() as f32).sqrt().clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> AudioFeatureExtractor {
        AudioFeatureExtractor::new(&AudioConfig::default())
    }

    /// 1024 bins with a constant bass level and silence elsewhere.
    fn bass_only(level: f32) -> Vec<u8> {
        let mut bins = vec![0u8; 1024];
        for bin in bins.iter_mut().take(10) {
            *bin = (level * 255.0).round() as u8;
        }
        bins
    }

    #[test]
    fn silence_has_no_features() {
        let mut analysis = extractor();
        let features = analysis.ingest(&[0; 1024], &[128; 2048], 0.0);

        assert_eq!(features.volume, 0.0);
        assert!(!features.beat);
        assert_eq!(features.pitch, 0.0);
        assert_eq!(features.waveform_rms, 0.0);
        assert_eq!(features.spectrum.len(), 5);
        assert!(features.spectrum.iter().all(|band| band.energy == 0.0));
    }

    #[test]
    fn volume_is_rms_of_bins() {
        let mut analysis = extractor();
        analysis.set_smoothing(false);
        let features = analysis.ingest(&[255; 64], &[], 0.0);
        assert!((features.volume - 1.0).abs() < 1e-6);

        analysis.set_sensitivity(0.5);
        let features = analysis.ingest(&[255; 64], &[], 16.0);
        assert!((features.volume - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rolling_volume_averages_last_ten_ticks() {
        let mut analysis = extractor();
        for tick in 0..10 {
            analysis.ingest(&[0; 64], &[], tick as f64 * 16.0);
        }
        let features = analysis.ingest(&[255; 64], &[], 200.0);
        assert!((features.volume - 0.1).abs() < 1e-5);
    }

    #[test]
    fn bands_split_the_spectrum() {
        let mut analysis = extractor();
        let features = analysis.ingest(&bass_only(1.0), &[], 0.0);

        assert!((features.band(Band::Bass) - 1.0).abs() < 1e-6);
        assert_eq!(features.band(Band::Mid), 0.0);
        assert_eq!(features.band(Band::Treble), 0.0);
    }

    #[test]
    fn bands_scale_with_buffer_length() {
        let mut analysis = extractor();
        let mut bins = vec![0u8; 2048];
        for bin in bins.iter_mut().take(20) {
            *bin = 255;
        }
        let features = analysis.ingest(&bins, &[], 0.0);
        assert!((features.band(Band::Bass) - 1.0).abs() < 1e-6);
        assert_eq!(features.band(Band::LowMid), 0.0);
    }

    #[test]
    fn pitch_comes_from_the_loudest_bin() {
        let mut analysis = extractor();
        let mut bins = vec![10u8; 1024];
        bins[256] = 200;
        let features = analysis.ingest(&bins, &[], 0.0);
        assert!((features.pitch - 256.0 / 1024.0 * 22_050.0).abs() < 1e-2);
    }

    #[test]
    fn beat_fires_at_most_once_per_cooldown_window() {
        let mut analysis = extractor();
        let bins = bass_only(0.4);
        let mut beats = Vec::new();

        for tick in 0..120 {
            let now = tick as f64 * 16.0;
            if analysis.ingest(&bins, &[], now).beat {
                beats.push(now);
            }
        }

        assert_eq!(beats[0], 0.0);
        assert!(beats.len() > 1);
        for pair in beats.windows(2) {
            assert!(pair[1] - pair[0] >= 300.0, "beats at {pair:?}");
        }
    }

    #[test]
    fn threshold_decays_to_floor_and_never_rises() {
        let mut analysis = extractor();
        let mut previous = analysis.beat_threshold();
        for tick in 0..200 {
            analysis.ingest(&[0; 1024], &[], tick as f64 * 16.0);
            let threshold = analysis.beat_threshold();
            assert!(threshold <= previous);
            previous = threshold;
        }
        assert!((previous - 0.15).abs() < 1e-6);

        analysis.ingest(&bass_only(1.0), &[], 10_000.0);
        assert!((analysis.beat_threshold() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn empty_input_is_silent() {
        let mut analysis = extractor();
        let features = analysis.ingest(&[], &[], 5.0);
        assert_eq!(features.timestamp, 5.0);
        assert!(!features.beat);
        assert_eq!(features.spectrum.len(), 5);
    }
}
