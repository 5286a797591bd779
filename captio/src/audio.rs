use std::path::Path;
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};

/// Target sample rate for whisper.cpp.
pub(crate) const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Maximum accepted input file size: 100 MiB.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Check the input against the size limit. Returns the file size in bytes.
///
/// Runs before any model work, so an oversized file never triggers a model
/// download or load.
pub fn check_file_size(path: &Path) -> Result<u64> {
    let meta = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::AudioNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Error::Io(e)
        }
    })?;

    let size = meta.len();
    if size > MAX_FILE_SIZE {
        return Err(Error::FileTooLarge {
            size,
            limit: MAX_FILE_SIZE,
        });
    }

    Ok(size)
}

/// Load an audio file, decode it, and return 16kHz mono f32 samples ready
/// for whisper.
///
/// Uses ffmpeg to decode any audio format, downmix to mono, and resample to
/// 16kHz. Supports every format ffmpeg does (mp3, wav, ogg, opus, webm,
/// aac, flac, m4a, ...).
pub fn load_audio(path: &Path) -> Result<Vec<f32>> {
    info!(path = %path.display(), "loading audio");

    if !path.exists() {
        return Err(Error::AudioNotFound {
            path: path.to_path_buf(),
        });
    }

    let samples = decode_with_ffmpeg(path)?;

    let duration = samples.len() as f64 / WHISPER_SAMPLE_RATE as f64;
    debug!(
        samples = samples.len(),
        duration_secs = format!("{duration:.1}"),
        "decoded audio"
    );

    Ok(samples)
}

/// Decode any audio file to 16kHz mono f32 via ffmpeg subprocess.
///
/// ffmpeg handles decoding, resampling, and channel mixing in one shot.
/// Output format is raw PCM signed 16-bit little-endian, which we convert to f32.
fn decode_with_ffmpeg(path: &Path) -> Result<Vec<f32>> {
    let output = Command::new("ffmpeg")
        .args(["-nostdin", "-threads", "0", "-i"])
        .arg(path)
        .args([
            "-f",
            "s16le",
            "-ac",
            "1",
            "-acodec",
            "pcm_s16le",
            "-ar",
            &WHISPER_SAMPLE_RATE.to_string(),
            "-",
        ])
        .output()
        .map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::AudioDecode("ffmpeg not found — install with: apt install ffmpeg".into())
            } else {
                Error::AudioDecode(format!("failed to run ffmpeg: {e}"))
            }
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::AudioDecode(format!("ffmpeg failed: {stderr}")));
    }

    if output.stdout.is_empty() {
        return Err(Error::AudioDecode("ffmpeg produced no output".into()));
    }

    // Convert s16le bytes to f32 samples, normalized to [-1.0, 1.0]
    let samples: Vec<f32> = output
        .stdout
        .chunks_exact(2)
        .map(|chunk| {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            sample as f32 / 32768.0
        })
        .collect();

    Ok(samples)
}
