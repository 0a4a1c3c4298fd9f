//! Transcript line formatting.

use crate::TranscriptionSegment;

/// Final transcript: the joined text plus the individual lines.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub lines: Vec<String>,
}

/// Format one segment as `[start ~ end] text` with two-decimal timestamps.
pub fn format_segment(segment: &TranscriptionSegment) -> String {
    format!(
        "[{:.2} ~ {:.2}] {}",
        segment.start,
        segment.end,
        segment.text.trim()
    )
}

/// Render segments into a [`Transcript`], one line per segment, joined by
/// newlines. Segment order is preserved.
pub fn render(segments: &[TranscriptionSegment]) -> Transcript {
    let lines: Vec<String> = segments.iter().map(format_segment).collect();
    let text = lines.join("\n");
    Transcript { text, lines }
}
