//! Audio transcription library — file in, JSON transcript with SRT subtitles out.
//!
//! **captio** handles the full pipeline: input validation, model acquisition
//! (download + in-process caching), audio decoding (via ffmpeg), and
//! transcription (via whisper.cpp). The result carries the detected language,
//! the audio duration, per-segment timings, and a rendered SRT string.
//!
//! # Quick start
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() -> captio::Result<()> {
//! let cache = captio::ModelCache::new();
//! let transcript = captio::transcribe_file("meeting.mp3", &cache).await?;
//! println!("{}", transcript.to_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! The [`ModelCache`] memoizes loaded models by name, so repeated calls with
//! the same model in one process load it only once.

pub(crate) mod audio;
pub mod config;
pub mod error;
pub mod model;
pub(crate) mod transcribe;
pub mod types;

pub use audio::MAX_FILE_SIZE;
pub use config::{Language, Model, TranscribeOptions};
pub use error::{Error, Result};
pub use model::ModelCache;
pub use types::{Segment, Transcript};

use std::path::Path;

/// Transcribe a local audio file with default options.
pub async fn transcribe_file(path: impl AsRef<Path>, cache: &ModelCache) -> Result<Transcript> {
    transcribe_file_with_options(path, cache, &TranscribeOptions::default()).await
}

/// Transcribe a local audio file with custom options.
pub async fn transcribe_file_with_options(
    path: impl AsRef<Path>,
    cache: &ModelCache,
    options: &TranscribeOptions,
) -> Result<Transcript> {
    let path = path.as_ref();

    // Size limit is checked first: an oversized file must never reach the model
    audio::check_file_size(path)?;

    // Obtain the model handle, reusing a previously loaded one if available
    let ctx = cache.get_or_load(options).await?;

    // Load and decode audio
    let samples = audio::load_audio(path)?;

    // Transcribe
    let transcript = transcribe::transcribe_samples(&ctx, &samples, options)?;

    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[tokio::test]
    async fn test_oversized_file_rejected_before_model_load() {
        let tmp = std::env::temp_dir().join("captio_test_oversized_pipeline.wav");
        let file = fs::File::create(&tmp).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();
        drop(file);

        let cache = ModelCache::new();
        let result = transcribe_file(&tmp, &cache).await;

        assert!(matches!(result.unwrap_err(), Error::FileTooLarge { .. }));
        // The size check fails before model acquisition, so nothing was loaded
        assert!(cache.loaded().is_empty());

        fs::remove_file(&tmp).ok();
    }

    #[tokio::test]
    async fn test_missing_file_rejected() {
        let cache = ModelCache::new();
        let result = transcribe_file("/nonexistent/audio.wav", &cache).await;
        assert!(matches!(result.unwrap_err(), Error::AudioNotFound { .. }));
    }
}
