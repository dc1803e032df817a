//! Probe embedding
//!
//! Turns decoded audio into the fixed-length feature vector the catalog is
//! indexed by. The vector is a band-energy spectrogram summary: the first
//! 30 seconds are resampled to a working rate, split into equal time
//! segments, and each segment is measured at log-spaced band frequencies
//! (Goertzel). Log-compressed energies are L2-normalized into the final
//! embedding. Deterministic for a given signal.

use crate::error::{EngineError, EngineResult};
use crate::services::audio_decoder::{decode_audio_file, DecodedAudio};
use dualproof_common::EngineConfig;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::path::Path;

/// Time segments per embedding; bands = dim / segments
const TIME_SEGMENTS: usize = 8;

/// Analysis sample rate in Hz
const WORKING_SAMPLE_RATE: u32 = 22_050;

/// Analysis span; audio beyond this is ignored
const ANALYSIS_SECONDS: usize = 30;

/// Shortest probe worth fingerprinting
const MIN_SECONDS: f64 = 1.0;

/// Band frequency range (log-spaced), chosen to cover the musically
/// relevant spectrum below the working Nyquist
const BAND_FREQ_LOW: f64 = 55.0;
const BAND_FREQ_HIGH: f64 = 8_000.0;

/// Fixed-length audio feature extractor
pub struct Embedder {
    dim: usize,
    bands: usize,
}

impl Embedder {
    /// Create an embedder producing `embedding_dim`-length vectors
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let dim = config.embedding_dim;
        if dim % TIME_SEGMENTS != 0 {
            return Err(EngineError::Configuration(format!(
                "embedding_dim {} must be a multiple of {}",
                dim, TIME_SEGMENTS
            )));
        }
        Ok(Self {
            dim,
            bands: dim / TIME_SEGMENTS,
        })
    }

    /// Embedding dimensionality
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Decode and embed a probe file
    pub fn embed_file(&self, path: &Path) -> EngineResult<Vec<f32>> {
        let audio = decode_audio_file(path)?;
        self.embed(&audio)
    }

    /// Embed decoded probe audio
    pub fn embed(&self, audio: &DecodedAudio) -> EngineResult<Vec<f32>> {
        if audio.samples.is_empty() {
            return Err(EngineError::InvalidInput("Empty probe audio".to_string()));
        }
        if audio.duration_seconds < MIN_SECONDS {
            return Err(EngineError::InvalidInput(format!(
                "Probe too short: {:.2}s (minimum {:.0}s)",
                audio.duration_seconds, MIN_SECONDS
            )));
        }

        let samples = resample(&audio.samples, audio.sample_rate, WORKING_SAMPLE_RATE)?;
        let max_samples = WORKING_SAMPLE_RATE as usize * ANALYSIS_SECONDS;
        let analysis = &samples[..samples.len().min(max_samples)];

        let mut embedding = Vec::with_capacity(self.dim);
        let segment_len = (analysis.len() / TIME_SEGMENTS).max(1);

        for segment_idx in 0..TIME_SEGMENTS {
            let start = segment_idx * segment_len;
            // Final segment absorbs the remainder
            let end = if segment_idx == TIME_SEGMENTS - 1 {
                analysis.len()
            } else {
                (start + segment_len).min(analysis.len())
            };
            let segment = if start < end { &analysis[start..end] } else { &[][..] };

            for band_idx in 0..self.bands {
                let freq = band_frequency(band_idx, self.bands);
                let power = goertzel_power(segment, WORKING_SAMPLE_RATE as f64, freq);
                embedding.push((1.0 + power).ln() as f32);
            }
        }

        normalize_l2(&mut embedding);
        Ok(embedding)
    }
}

/// Log-spaced band center frequency
fn band_frequency(band_idx: usize, bands: usize) -> f64 {
    if bands <= 1 {
        return BAND_FREQ_LOW;
    }
    let ratio = BAND_FREQ_HIGH / BAND_FREQ_LOW;
    BAND_FREQ_LOW * ratio.powf(band_idx as f64 / (bands - 1) as f64)
}

/// Goertzel power of one band over a window, normalized by window length
fn goertzel_power(samples: &[f32], sample_rate: f64, freq: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let omega = 2.0 * std::f64::consts::PI * freq / sample_rate;
    let coeff = 2.0 * omega.cos();

    let mut s_prev = 0.0f64;
    let mut s_prev2 = 0.0f64;
    for &x in samples {
        let s = x as f64 + coeff * s_prev - s_prev2;
        s_prev2 = s_prev;
        s_prev = s;
    }

    let power = s_prev * s_prev + s_prev2 * s_prev2 - coeff * s_prev * s_prev2;
    power.max(0.0) / samples.len() as f64
}

/// L2-normalize in place; an all-zero vector stays zero
fn normalize_l2(values: &mut [f32]) {
    let norm: f64 = values.iter().map(|&v| v as f64 * v as f64).sum::<f64>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for value in values.iter_mut() {
            *value = (*value as f64 / norm) as f32;
        }
    }
}

/// Resample mono samples between rates (no-op when they match)
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> EngineResult<Vec<f32>> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };
    let chunk_size = 1024;
    let mut resampler = SincFixedIn::<f32>::new(
        to_rate as f64 / from_rate as f64,
        2.0,
        params,
        chunk_size,
        1,
    )
    .map_err(|e| EngineError::InvalidInput(format!("Resampler init failed: {}", e)))?;

    let expected = samples.len() as f64 * to_rate as f64 / from_rate as f64;
    let mut out = Vec::with_capacity(expected as usize + chunk_size);
    let mut pos = 0;

    while pos + chunk_size <= samples.len() {
        let frames = resampler
            .process(&[&samples[pos..pos + chunk_size]], None)
            .map_err(|e| EngineError::InvalidInput(format!("Resampling failed: {}", e)))?;
        out.extend_from_slice(&frames[0]);
        pos += chunk_size;
    }

    if pos < samples.len() {
        let frames = resampler
            .process_partial(Some(&[&samples[pos..]]), None)
            .map_err(|e| EngineError::InvalidInput(format!("Resampling failed: {}", e)))?;
        out.extend_from_slice(&frames[0]);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_dim(dim: usize) -> EngineConfig {
        EngineConfig {
            embedding_dim: dim,
            ..EngineConfig::default()
        }
    }

    fn sine_audio(freq: f32, seconds: f32, sample_rate: u32) -> DecodedAudio {
        let total = (sample_rate as f32 * seconds) as usize;
        let samples: Vec<f32> = (0..total)
            .map(|i| {
                (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.5
            })
            .collect();
        DecodedAudio {
            duration_seconds: samples.len() as f64 / sample_rate as f64,
            samples,
            sample_rate,
            channels: 1,
        }
    }

    #[test]
    fn test_dim_must_divide_by_segments() {
        assert!(Embedder::new(&config_with_dim(513)).is_err());
        assert!(Embedder::new(&config_with_dim(512)).is_ok());
    }

    #[test]
    fn test_embedding_has_configured_dim_and_unit_norm() {
        let embedder = Embedder::new(&config_with_dim(512)).unwrap();
        let audio = sine_audio(440.0, 2.0, WORKING_SAMPLE_RATE);
        let embedding = embedder.embed(&audio).unwrap();

        assert_eq!(embedding.len(), 512);
        let norm: f32 = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4, "norm was {}", norm);
    }

    #[test]
    fn test_embedding_is_deterministic() {
        let embedder = Embedder::new(&config_with_dim(64)).unwrap();
        let audio = sine_audio(440.0, 2.0, WORKING_SAMPLE_RATE);
        assert_eq!(
            embedder.embed(&audio).unwrap(),
            embedder.embed(&audio).unwrap()
        );
    }

    #[test]
    fn test_different_tones_embed_differently() {
        let embedder = Embedder::new(&config_with_dim(64)).unwrap();
        let low = embedder.embed(&sine_audio(220.0, 2.0, WORKING_SAMPLE_RATE)).unwrap();
        let high = embedder.embed(&sine_audio(3_000.0, 2.0, WORKING_SAMPLE_RATE)).unwrap();
        assert_ne!(low, high);
    }

    #[test]
    fn test_too_short_probe_rejected() {
        let embedder = Embedder::new(&config_with_dim(64)).unwrap();
        let audio = sine_audio(440.0, 0.2, WORKING_SAMPLE_RATE);
        assert!(matches!(
            embedder.embed(&audio),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_empty_probe_rejected() {
        let embedder = Embedder::new(&config_with_dim(64)).unwrap();
        let audio = DecodedAudio {
            samples: Vec::new(),
            sample_rate: WORKING_SAMPLE_RATE,
            channels: 1,
            duration_seconds: 0.0,
        };
        assert!(matches!(
            embedder.embed(&audio),
            Err(EngineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_silence_embeds_to_zero_vector() {
        let embedder = Embedder::new(&config_with_dim(64)).unwrap();
        let audio = DecodedAudio {
            samples: vec![0.0; WORKING_SAMPLE_RATE as usize * 2],
            sample_rate: WORKING_SAMPLE_RATE,
            channels: 1,
            duration_seconds: 2.0,
        };
        let embedding = embedder.embed(&audio).unwrap();
        assert_eq!(embedding.len(), 64);
        assert!(embedding.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_band_frequencies_span_range() {
        assert!((band_frequency(0, 64) - BAND_FREQ_LOW).abs() < 1e-9);
        assert!((band_frequency(63, 64) - BAND_FREQ_HIGH).abs() < 1e-6);
    }
}
