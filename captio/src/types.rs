use serde::{Deserialize, Serialize};

/// A transcript segment: a contiguous, timestamped span of recognized speech.
///
/// Indices are 1-based and sequential; `start`/`end` are seconds rounded to
/// two decimal places; `text` is trimmed of surrounding whitespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub i: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    /// Build a segment from raw whisper output: 1-based index, rounded
    /// boundaries, trimmed text.
    pub fn new(i: u32, start: f64, end: f64, text: &str) -> Self {
        Self {
            i,
            start: round2(start),
            end: round2(end),
            text: text.trim().to_string(),
        }
    }
}

/// Complete transcription result, as emitted on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub language: Option<String>,
    pub duration: Option<f64>,
    pub segments: Vec<Segment>,
    pub srt: String,
}

impl Transcript {
    pub fn new(language: Option<String>, duration: Option<f64>, segments: Vec<Segment>) -> Self {
        let srt = render_srt(&segments);
        Self {
            language,
            duration,
            segments,
            srt,
        }
    }

    /// Full text (all segments concatenated).
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Format as JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Format as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Render segments as SRT subtitles: one block per segment holding the
/// sequence number, the timestamp range, the text, and a blank separator.
pub fn render_srt(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        out.push_str(&format!("{}\n", seg.i));
        out.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(seg.start),
            format_srt_time(seg.end)
        ));
        out.push_str(&seg.text);
        out.push_str("\n\n");
    }
    out
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
pub(crate) fn format_srt_time(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1_000;
    let ms = total_ms % 1_000;
    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}

/// Round to two decimal places.
pub(crate) fn round2(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}
