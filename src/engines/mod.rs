//! Speech recognition engines.
//!
//! Each engine implements [`crate::TranscriptionEngine`] over mono 16 kHz
//! f32 samples and reports timestamped segments.
//!
//! # Whisper Engine
//!
//! OpenAI's Whisper via whisper.cpp:
//! - **Model Format**: Single GGML format file (`.bin`)
//! - **Models**: tiny, base, small, medium, large variants
//! - **Features**: Multi-language support, robust performance
//! - **Example**: `whisper-medium-q4_1.bin`

pub mod whisper;
