use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext};

use crate::audio::WHISPER_SAMPLE_RATE;
use crate::config::{Language, TranscribeOptions};
use crate::error::{Error, Result};
use crate::types::{Segment, Transcript};

/// Transcribe audio samples with a loaded whisper context.
/// Samples must be 16kHz mono f32.
pub fn transcribe_samples(
    ctx: &WhisperContext,
    samples: &[f32],
    options: &TranscribeOptions,
) -> Result<Transcript> {
    let mut state = ctx.create_state()?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });

    // "auto" tells whisper to detect the language and keep decoding;
    // detect_language mode would stop after detection with no segments
    params.set_language(Some(language_hint(&options.language)));

    if let Some(n) = options.n_threads {
        params.set_n_threads(n as i32);
    }

    // Disable stderr printing from whisper.cpp
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    info!(samples = samples.len(), "running transcription");
    state.full(params, samples)?;

    let num_segments = state.full_n_segments();
    debug!(num_segments, "transcription complete");

    let mut segments = Vec::with_capacity(num_segments as usize);

    for i in 0..num_segments {
        let segment = state
            .get_segment(i)
            .ok_or_else(|| Error::Transcription(format!("segment {i} not found")))?;

        let text = segment
            .to_str_lossy()
            .map_err(|e| Error::Transcription(format!("segment text error: {e}")))?;

        // whisper timestamps are centiseconds
        segments.push(Segment::new(
            i as u32 + 1,
            segment.start_timestamp() as f64 / 100.0,
            segment.end_timestamp() as f64 / 100.0,
            &text,
        ));
    }

    let duration = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64;

    let language = match &options.language {
        Language::Code { code, .. } => Some(code.clone()),
        Language::Auto => {
            let id = state.full_lang_id_from_state();
            whisper_rs::get_lang_str(id).map(str::to_string)
        }
    };

    Ok(Transcript::new(language, Some(duration), segments))
}

/// Language argument for whisper: a validated code pins the language, while
/// the literal "auto" leaves detection to the model.
fn language_hint(language: &Language) -> &str {
    match language {
        Language::Auto => "auto",
        Language::Code { code, .. } => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_hint_auto() {
        // Whisper's auto-detect sentinel, not detect_language mode —
        // the latter returns before decoding any segments
        assert_eq!(language_hint(&Language::Auto), "auto");
    }

    #[test]
    fn test_language_hint_forwards_code_unchanged() {
        let lang = Language::new("de").unwrap();
        assert_eq!(language_hint(&lang), "de");
    }
}
