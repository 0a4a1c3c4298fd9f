//! The lyrics extraction pipeline.
//!
//! Resolves a storage reference to an object key, downloads the vocal stem
//! into a scoped temporary file, decodes and preprocesses the waveform,
//! runs the transcription engine, and formats the result. Temporary files
//! are removed on every exit path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::audio::{self, AudioError};
use crate::engines::whisper::{WhisperEngine, WhisperInferenceParams};
use crate::format::{self, Transcript};
use crate::storage::{self, StorageError, StorageHandle};
use crate::{TranscriptionEngine, TranscriptionResult};

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("unrecognized storage reference: {0}")]
    BadReference(String),
    #[error("download failed: {0}")]
    Download(#[from] StorageError),
    #[error("audio processing failed: {0}")]
    Audio(#[from] AudioError),
    #[error("transcription failed: {0}")]
    Inference(String),
    #[error("temporary file handling failed: {0}")]
    TempFile(#[from] std::io::Error),
}

/// Narrow engine seam used by the pipeline; lets tests substitute a mock
/// for the Whisper backend.
pub trait LyricsTranscriber {
    fn transcribe(
        &mut self,
        wav_path: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, Box<dyn std::error::Error>>;
}

impl LyricsTranscriber for WhisperEngine {
    fn transcribe(
        &mut self,
        wav_path: &Path,
        language: Option<&str>,
    ) -> Result<TranscriptionResult, Box<dyn std::error::Error>> {
        let params = WhisperInferenceParams {
            language: language.map(|code| code.to_string()),
            ..Default::default()
        };
        self.transcribe_file(wav_path, Some(params))
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Language code forced on the decoder.
    pub language: String,
    /// Directory receiving the best-effort transcript side files.
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            language: "ko".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

/// Orchestrates one lyrics extraction per call.
///
/// The engine is loaded once at startup and shared across requests; the
/// mutex serializes model access since the whisper state is not safe for
/// concurrent invocation.
pub struct Pipeline<T> {
    engine: Mutex<T>,
    storage: StorageHandle,
    config: PipelineConfig,
}

impl<T: LyricsTranscriber> Pipeline<T> {
    pub fn new(engine: T, storage: StorageHandle, config: PipelineConfig) -> Self {
        Self {
            engine: Mutex::new(engine),
            storage,
            config,
        }
    }

    /// Run the full pipeline for one storage reference.
    pub fn extract_lyrics(&self, reference: &str) -> Result<Transcript, PipelineError> {
        let key = storage::extract_object_key(reference)
            .ok_or_else(|| PipelineError::BadReference(reference.to_string()))?;

        log::info!("extracting lyrics for {}", key.bucket_path());

        let suffix = Path::new(&key.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{ext}"))
            .unwrap_or_default();
        let stem_file = tempfile::Builder::new()
            .prefix("vocal-")
            .suffix(&suffix)
            .tempfile()?;

        let store = self.storage.current();
        store.download_to(&key.bucket_path(), stem_file.path())?;

        let result = self.transcribe_stem(stem_file.path())?;
        let transcript = format::render(&result.segments);

        log::info!(
            "transcribed {} into {} line(s)",
            key.file_name,
            transcript.lines.len()
        );

        self.write_side_file(&key.file_name, &transcript);

        // stem_file is dropped here; the download is removed on every
        // path out of this function, including the error returns above.
        Ok(transcript)
    }

    /// Decode, preprocess, and transcribe one local audio file.
    ///
    /// The engine consumes a temporary mono 16 kHz WAV which is deleted
    /// when this function returns, transcription outcome notwithstanding.
    fn transcribe_stem(&self, stem_path: &Path) -> Result<TranscriptionResult, PipelineError> {
        let buffer = audio::decode_audio(stem_path)?;
        log::debug!(
            "loaded stem: {:.2}s, {} Hz, {} channel(s)",
            buffer.duration_seconds(),
            buffer.sample_rate,
            buffer.channels
        );

        let buffer = audio::preprocess(buffer)?;

        let wav_file = tempfile::Builder::new()
            .prefix("vocal-")
            .suffix(".wav")
            .tempfile()?;
        audio::write_wav_samples(wav_file.path(), &buffer.samples)?;

        let mut engine = self.engine.lock().expect("engine mutex poisoned");
        engine
            .transcribe(wav_file.path(), Some(self.config.language.as_str()))
            .map_err(|err| PipelineError::Inference(err.to_string()))
    }

    /// Best-effort transcript side file, one formatted line per segment.
    /// Failures are logged and never affect the returned result.
    fn write_side_file(&self, file_name: &str, transcript: &Transcript) {
        let base = Path::new(file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(file_name);
        let path = self.config.output_dir.join(format!("{base}.txt"));

        let mut body = String::with_capacity(transcript.text.len() + transcript.lines.len());
        for line in &transcript.lines {
            body.push_str(line);
            body.push('\n');
        }

        match fs::write(&path, body) {
            Ok(()) => log::debug!("saved transcript to {}", path.display()),
            Err(err) => log::warn!("failed to save transcript to {}: {}", path.display(), err),
        }
    }
}
