use std::error::Error;

use vocalscribe::audio::{
    decode_audio, mix_to_mono, preprocess, read_wav_samples, resample, AudioBuffer, AudioError,
    TARGET_SAMPLE_RATE,
};

fn write_silent_wav(
    path: &std::path::Path,
    sample_rate: u32,
    channels: u16,
    frames: u32,
) -> Result<(), Box<dyn Error>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for _ in 0..frames * channels as u32 {
        writer.write_sample(0i16)?;
    }
    writer.finalize()?;
    Ok(())
}

#[test]
fn read_wav_samples_normalizes_full_range() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let wav_path = temp_dir.path().join("extreme.wav");

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    {
        let mut writer = hound::WavWriter::create(&wav_path, spec)?;
        writer.write_sample(i16::MAX)?;
        writer.write_sample(i16::MIN)?;
        writer.finalize()?;
    }

    let samples = read_wav_samples(&wav_path)?;
    assert_eq!(samples.len(), 2);

    assert_eq!(samples[0], 1.0);
    assert_eq!(samples[1], -1.0);

    Ok(())
}

#[test]
fn read_wav_samples_rejects_wrong_sample_rate() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let wav_path = temp_dir.path().join("8khz.wav");
    write_silent_wav(&wav_path, 8_000, 1, 100)?;

    match read_wav_samples(&wav_path) {
        Err(AudioError::WavFormat(message)) => assert!(message.contains("8000")),
        other => panic!("expected wav format error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn mix_to_mono_averages_channels() {
    let stereo = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6];
    let mono = mix_to_mono(&stereo, 2);
    assert_eq!(mono.len(), 3);
    assert!((mono[0] - 0.15).abs() < 1e-6);
    assert!((mono[1] - 0.35).abs() < 1e-6);
    assert!((mono[2] - 0.55).abs() < 1e-6);

    let quad = vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8];
    let mono = mix_to_mono(&quad, 4);
    assert_eq!(mono.len(), 2);
    assert!((mono[0] - 0.25).abs() < 1e-6);
    assert!((mono[1] - 0.65).abs() < 1e-6);
}

#[test]
fn mix_to_mono_passes_single_channel_through() {
    let mono = vec![0.1, -0.2, 0.3];
    assert_eq!(mix_to_mono(&mono, 1), mono);
}

#[test]
fn resample_scales_length_by_rate_ratio() -> Result<(), Box<dyn Error>> {
    // One second of 48kHz audio resamples to exactly one second at 16kHz.
    let samples: Vec<f32> = (0..48_000)
        .map(|i| (i as f32 * 0.01).sin() * 0.5)
        .collect();
    let resampled = resample(&samples, 48_000, 16_000)?;
    assert_eq!(resampled.len(), 16_000);

    // Non-integer ratios round to the nearest sample.
    let samples = vec![0.0f32; 44_100];
    let resampled = resample(&samples, 44_100, 16_000)?;
    assert_eq!(resampled.len(), 16_000);
    Ok(())
}

#[test]
fn resample_equal_rates_is_identity() -> Result<(), Box<dyn Error>> {
    let samples: Vec<f32> = (0..1_600).map(|i| (i as f32 * 0.1).sin()).collect();
    let resampled = resample(&samples, 16_000, 16_000)?;
    assert_eq!(resampled, samples);
    Ok(())
}

#[test]
fn preprocess_is_idempotent_on_engine_format() -> Result<(), Box<dyn Error>> {
    let buffer = AudioBuffer {
        samples: (0..3_200).map(|i| (i as f32 * 0.05).sin()).collect(),
        sample_rate: TARGET_SAMPLE_RATE,
        channels: 1,
    };

    let once = preprocess(buffer.clone())?;
    assert_eq!(once.samples, buffer.samples);

    let twice = preprocess(once.clone())?;
    assert_eq!(twice.samples, once.samples);
    assert_eq!(twice.sample_rate, TARGET_SAMPLE_RATE);
    assert_eq!(twice.channels, 1);
    Ok(())
}

#[test]
fn preprocess_converts_stereo_44khz_to_engine_format() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let wav_path = temp_dir.path().join("stereo.wav");
    write_silent_wav(&wav_path, 44_100, 2, 44_100)?;

    let buffer = decode_audio(&wav_path)?;
    assert_eq!(buffer.sample_rate, 44_100);
    assert_eq!(buffer.channels, 2);
    assert_eq!(buffer.frames(), 44_100);

    let processed = preprocess(buffer)?;
    assert_eq!(processed.channels, 1);
    assert_eq!(processed.sample_rate, TARGET_SAMPLE_RATE);
    assert_eq!(processed.samples.len(), 16_000);
    assert!(processed.samples.iter().all(|s| s.abs() < 1e-3));
    Ok(())
}

#[test]
fn decode_audio_rejects_non_audio_bytes() -> Result<(), Box<dyn Error>> {
    let temp_dir = tempfile::tempdir()?;
    let path = temp_dir.path().join("noise.mp3");
    std::fs::write(&path, b"definitely not audio")?;

    assert!(decode_audio(&path).is_err());
    Ok(())
}
