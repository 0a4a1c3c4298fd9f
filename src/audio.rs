//! Audio loading and preprocessing for transcription.
//!
//! This module decodes audio files into in-memory sample buffers and
//! converts them to the format expected by the transcription engines:
//! mono, 16 kHz, f32 samples in [-1.0, 1.0].

use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Sample rate required by the transcription engines.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("failed to open audio file: {0}")]
    Open(#[from] std::io::Error),
    #[error("unsupported audio container: {0}")]
    Probe(symphonia::core::errors::Error),
    #[error("no decodable audio track")]
    NoTrack,
    #[error("source sample rate unknown")]
    UnknownRate,
    #[error("audio decode failed: {0}")]
    Decode(symphonia::core::errors::Error),
    #[error("audio stream contained no samples")]
    Empty,
    #[error("resampler failure: {0}")]
    Resample(String),
    #[error("unexpected wav format: {0}")]
    WavFormat(String),
    #[error("wav i/o failed: {0}")]
    Wav(#[from] hound::Error),
}

/// Decoded waveform: interleaved f32 samples plus the source layout.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio file (wav, mp3, m4a, ...) into an [`AudioBuffer`].
///
/// The container is probed by content with a filename-extension hint, the
/// first decodable track is selected, and every packet is converted to
/// interleaved f32. Channel layout and sample rate are reported as found
/// in the source; see [`preprocess`] for conversion to engine format.
pub fn decode_audio(path: &Path) -> Result<AudioBuffer, AudioError> {
    let src = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(AudioError::Probe)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(AudioError::NoTrack)?;

    let codec_params = track.codec_params.clone();
    let track_id = track.id;
    let sample_rate = codec_params.sample_rate.ok_or(AudioError::UnknownRate)?;
    let channels = codec_params.channels.map_or(1, |c| c.count()) as u16;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(AudioError::Decode)?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AudioError::Decode(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder.decode(&packet).map_err(AudioError::Decode)?;
        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buf.samples());
    }

    if samples.is_empty() {
        return Err(AudioError::Empty);
    }

    log::debug!(
        "decoded {}: {} frames, {} Hz, {} channel(s)",
        path.display(),
        samples.len() / channels.max(1) as usize,
        sample_rate,
        channels
    );

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}

/// Average interleaved multi-channel samples down to a single channel.
pub fn mix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    let mut mono = Vec::with_capacity(samples.len() / channels);
    for frame in samples.chunks(channels) {
        let sum: f32 = frame.iter().sum();
        mono.push(sum / channels as f32);
    }
    mono
}

/// Resample mono audio from `from_rate` to `to_rate` with a band-limited
/// sinc interpolator.
///
/// Output length is the input length scaled by `to_rate / from_rate`,
/// rounded to the nearest sample. Equal rates are an identity transform.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| AudioError::Resample(e.to_string()))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            vec![padded]
        } else {
            vec![chunk.to_vec()]
        };

        let resampled = resampler
            .process(&input, None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;

        if let Some(channel) = resampled.into_iter().next() {
            output.extend(channel);
        }
    }

    // The zero-padded tail chunk can overshoot the time-scaled length.
    let expected = (samples.len() as f64 * ratio).round() as usize;
    if output.len() > expected {
        output.truncate(expected);
    } else {
        output.resize(expected, 0.0);
    }

    Ok(output)
}

/// Convert a buffer to engine format: mono, [`TARGET_SAMPLE_RATE`].
///
/// Already-conforming buffers pass through unchanged, so the transform is
/// idempotent.
pub fn preprocess(buffer: AudioBuffer) -> Result<AudioBuffer, AudioError> {
    let AudioBuffer {
        samples,
        sample_rate,
        channels,
    } = buffer;

    let mono = if channels > 1 {
        mix_to_mono(&samples, channels)
    } else {
        samples
    };

    let resampled = resample(&mono, sample_rate, TARGET_SAMPLE_RATE)?;

    Ok(AudioBuffer {
        samples: resampled,
        sample_rate: TARGET_SAMPLE_RATE,
        channels: 1,
    })
}

/// Read WAV file samples and convert them to the required format.
///
/// The input must already be engine format (16 kHz, 16-bit PCM, mono);
/// anything else is rejected. Samples are normalized to [-1.0, 1.0].
pub fn read_wav_samples(wav_path: &Path) -> Result<Vec<f32>, AudioError> {
    let mut reader = hound::WavReader::open(wav_path)?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(AudioError::WavFormat(format!(
            "expected 1 channel, found {}",
            spec.channels
        )));
    }

    if spec.sample_rate != TARGET_SAMPLE_RATE {
        return Err(AudioError::WavFormat(format!(
            "expected {} Hz sample rate, found {} Hz",
            TARGET_SAMPLE_RATE, spec.sample_rate
        )));
    }

    if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
        return Err(AudioError::WavFormat(format!(
            "expected 16-bit int samples, found {}-bit {:?}",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples: Result<Vec<f32>, _> = reader
        .samples::<i16>()
        .map(|sample| sample.map(|s| s as f32 / i16::MAX as f32))
        .collect();

    Ok(samples?)
}

/// Write mono 16 kHz f32 samples as a 16-bit PCM WAV file.
pub fn write_wav_samples(wav_path: &Path, samples: &[f32]) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(wav_path, spec)?;
    for &sample in samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    Ok(())
}
