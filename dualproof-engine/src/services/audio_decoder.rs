//! Probe audio decoding
//!
//! Decodes an audio artifact to mono f32 PCM using symphonia (MP3, FLAC,
//! AAC, WAV, OGG, ...). Decode failures are invalid-input errors: the
//! caller must fix the probe; the engine never substitutes an empty
//! signal.

use crate::error::{EngineError, EngineResult};
use std::io::Cursor;
use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::FromSample;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decoded probe audio
#[derive(Debug)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Original channel count
    pub channels: usize,
    /// Duration in seconds
    pub duration_seconds: f64,
}

/// Decode an audio file to mono f32 PCM
pub fn decode_audio_file(path: &Path) -> EngineResult<DecodedAudio> {
    tracing::debug!(path = %path.display(), "Decoding probe audio");

    let file = std::fs::File::open(path).map_err(|e| {
        EngineError::InvalidInput(format!("Cannot open probe {}: {}", path.display(), e))
    })?;

    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_owned);
    decode_source(Box::new(file), extension.as_deref())
}

/// Decode in-memory audio bytes to mono f32 PCM
///
/// `extension` is an optional format hint (e.g. "mp3") for the probe.
pub fn decode_audio_bytes(data: Vec<u8>, extension: Option<&str>) -> EngineResult<DecodedAudio> {
    if data.is_empty() {
        return Err(EngineError::InvalidInput("Empty probe audio".to_string()));
    }
    decode_source(Box::new(Cursor::new(data)), extension)
}

fn decode_source(
    source: Box<dyn MediaSource>,
    extension: Option<&str>,
) -> EngineResult<DecodedAudio> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| EngineError::InvalidInput(format!("Unsupported probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| EngineError::InvalidInput("No audio track in probe".to_string()))?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| EngineError::InvalidInput("Probe sample rate unknown".to_string()))?;
    let channels = track
        .codec_params
        .channels
        .ok_or_else(|| EngineError::InvalidInput("Probe channel layout unknown".to_string()))?
        .count();

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| EngineError::InvalidInput(format!("No decoder for probe codec: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(EngineError::InvalidInput(format!(
                    "Error reading probe packet: {}",
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| EngineError::InvalidInput(format!("Corrupt probe audio: {}", e)))?;

        mix_to_mono(&decoded, &mut samples);
    }

    if samples.is_empty() {
        return Err(EngineError::InvalidInput(
            "Probe decoded to zero samples".to_string(),
        ));
    }

    let duration_seconds = samples.len() as f64 / sample_rate as f64;
    tracing::debug!(
        total_samples = samples.len(),
        duration_seconds = format!("{:.2}", duration_seconds),
        "Probe decoding complete"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
        duration_seconds,
    })
}

/// Mix one decoded buffer to mono f32 and append to `out`
fn mix_to_mono(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    macro_rules! mix {
        ($buf:expr) => {{
            let buf = $buf;
            let num_channels = buf.spec().channels.count();
            let num_frames = buf.frames();
            out.reserve(num_frames);
            for frame_idx in 0..num_frames {
                let mut sum = 0.0f32;
                for ch in 0..num_channels {
                    sum += f32::from_sample(buf.chan(ch)[frame_idx]);
                }
                out.push(sum / num_channels as f32);
            }
        }};
    }

    match decoded {
        AudioBufferRef::U8(buf) => mix!(buf),
        AudioBufferRef::U16(buf) => mix!(buf),
        AudioBufferRef::U24(buf) => mix!(buf),
        AudioBufferRef::U32(buf) => mix!(buf),
        AudioBufferRef::S8(buf) => mix!(buf),
        AudioBufferRef::S16(buf) => mix!(buf),
        AudioBufferRef::S24(buf) => mix!(buf),
        AudioBufferRef::S32(buf) => mix!(buf),
        AudioBufferRef::F32(buf) => mix!(buf),
        AudioBufferRef::F64(buf) => mix!(buf),
    }
}
