use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use whisper_rs::{WhisperContext, WhisperContextParameters};

use crate::config::{Model, TranscribeOptions};
use crate::error::{Error, Result};

const HUGGINGFACE_BASE: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// In-process cache of loaded whisper contexts, keyed by model name.
///
/// A model is loaded at most once per process; later requests for the same
/// name get the cached handle. There is no eviction — entries live for the
/// lifetime of the cache.
#[derive(Default)]
pub struct ModelCache {
    contexts: Memo<WhisperContext>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the loaded context for the requested model, loading (and
    /// downloading, if necessary) on first use.
    pub async fn get_or_load(&self, options: &TranscribeOptions) -> Result<Arc<WhisperContext>> {
        let key = cache_key(&options.model);

        if let Some(ctx) = self.contexts.get(&key) {
            debug!(model = %key, "model cache hit");
            return Ok(ctx);
        }

        let cache_dir = options.resolve_cache_dir();
        let model_path = ensure_model(&options.model, &cache_dir).await?;

        info!(model = %key, path = %model_path.display(), "loading whisper model");
        let ctx = load_context(&model_path, options)?;

        Ok(self.contexts.insert(key, ctx))
    }

    /// Whether a model is already loaded.
    pub fn is_loaded(&self, model: &Model) -> bool {
        self.contexts.contains(&cache_key(model))
    }

    /// Names of all currently loaded models.
    pub fn loaded(&self) -> Vec<String> {
        self.contexts.keys()
    }
}

/// String-keyed memoization map backing [`ModelCache`]: insert once, hand
/// out shared handles afterwards, no eviction.
struct Memo<T> {
    entries: Mutex<HashMap<String, Arc<T>>>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> Memo<T> {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<T>>> {
        // Recover from poisoning; the map holds no invariant a panicked
        // holder could have broken mid-update
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, key: &str) -> Option<Arc<T>> {
        self.lock().get(key).map(Arc::clone)
    }

    fn insert(&self, key: String, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.lock().insert(key, Arc::clone(&value));
        value
    }

    fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }
}

/// Cache key for a model: the size name, or the full path for custom models
/// so distinct files never collide.
fn cache_key(model: &Model) -> String {
    match model {
        Model::Custom(path) => path.to_string_lossy().into_owned(),
        _ => model.name().to_string(),
    }
}

fn load_context(model_path: &Path, options: &TranscribeOptions) -> Result<WhisperContext> {
    let mut ctx_params = WhisperContextParameters::new();
    ctx_params.use_gpu(options.gpu);
    ctx_params.gpu_device(options.gpu_device as i32);

    let ctx = WhisperContext::new_with_params(
        model_path
            .to_str()
            .ok_or_else(|| Error::Model("model path contains invalid UTF-8".into()))?,
        ctx_params,
    )?;

    Ok(ctx)
}

/// Ensure a model is available locally, downloading if necessary.
/// Returns the path to the model file.
pub async fn ensure_model(model: &Model, cache_dir: &Path) -> Result<PathBuf> {
    match model {
        Model::Custom(path) => {
            if path.exists() {
                Ok(path.clone())
            } else {
                Err(Error::ModelNotFound { path: path.clone() })
            }
        }
        _ => {
            let filename = model.filename();
            let model_path = cache_dir.join(&filename);

            if model_path.exists() {
                info!(path = %model_path.display(), "model already cached");
                return Ok(model_path);
            }

            std::fs::create_dir_all(cache_dir).map_err(|e| {
                Error::Model(format!(
                    "failed to create cache dir {}: {e}",
                    cache_dir.display()
                ))
            })?;

            let url = format!("{HUGGINGFACE_BASE}/{filename}");
            info!(%url, "downloading model");
            download_model(&url, &model_path).await?;

            Ok(model_path)
        }
    }
}

async fn download_model(url: &str, dest: &Path) -> Result<()> {
    let client = reqwest::Client::new();
    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| Error::ModelDownload(format!("HTTP error: {e}")))?;

    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(format!(
        "Downloading {}",
        dest.file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default()
    ));

    // Write to a temp file first, then rename (atomic-ish)
    let tmp_path = dest.with_extension("bin.part");
    let mut file = std::fs::File::create(&tmp_path)?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    use std::io::Write;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)?;
        downloaded += chunk.len() as u64;
        pb.set_position(downloaded);
    }

    file.flush()?;
    drop(file);

    // Verify we got something reasonable
    let file_size = std::fs::metadata(&tmp_path)?.len();
    if file_size < 1_000_000 {
        std::fs::remove_file(&tmp_path).ok();
        return Err(Error::ModelDownload(format!(
            "downloaded file too small ({file_size} bytes) — likely an error page"
        )));
    }

    std::fs::rename(&tmp_path, dest)?;
    pb.finish_with_message("Download complete");

    if total_size > 0 && file_size != total_size {
        warn!(
            expected = total_size,
            actual = file_size,
            "file size mismatch — model may be corrupt"
        );
    }

    info!(path = %dest.display(), size = file_size, "model saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_cache_starts_empty() {
        let cache = ModelCache::new();
        assert!(cache.loaded().is_empty());
        assert!(!cache.is_loaded(&Model::Small));
    }

    #[test]
    fn test_cache_key_named_model() {
        assert_eq!(cache_key(&Model::Small), "small");
        assert_eq!(cache_key(&Model::LargeV3Turbo), "large-v3-turbo");
    }

    #[test]
    fn test_memo_second_request_returns_cached_handle() {
        let memo: Memo<u32> = Memo::default();
        assert!(memo.get("small").is_none());

        let first = memo.insert("small".into(), 42);
        let second = memo.get("small").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_memo_loads_once_per_key() {
        // Mirrors get_or_load's miss/hit flow: the load step runs only
        // when the key is absent
        let memo: Memo<u32> = Memo::default();
        let mut loads = 0;

        for _ in 0..2 {
            match memo.get("small") {
                Some(_) => {}
                None => {
                    loads += 1;
                    memo.insert("small".into(), 7);
                }
            }
        }

        assert_eq!(loads, 1);
        assert!(memo.contains("small"));
        assert_eq!(memo.keys(), vec!["small".to_string()]);
    }

    #[test]
    fn test_memo_keys_are_independent() {
        let memo: Memo<u32> = Memo::default();
        memo.insert("small".into(), 1);
        assert!(!memo.contains("base"));
        assert!(memo.get("base").is_none());
    }

    #[test]
    fn test_cache_key_custom_model_uses_path() {
        let a = cache_key(&Model::Custom(PathBuf::from("/models/a.bin")));
        let b = cache_key(&Model::Custom(PathBuf::from("/models/b.bin")));
        assert_ne!(a, b);
        assert_eq!(a, "/models/a.bin");
    }

    #[tokio::test]
    async fn test_ensure_model_custom_exists() {
        let tmp = std::env::temp_dir().join("captio_test_custom_model.bin");
        fs::write(&tmp, b"fake model data").unwrap();

        let model = Model::Custom(tmp.clone());
        let result = ensure_model(&model, Path::new("/unused")).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), tmp);

        fs::remove_file(&tmp).ok();
    }

    #[tokio::test]
    async fn test_ensure_model_custom_not_found() {
        let model = Model::Custom(PathBuf::from("/nonexistent/model.bin"));
        let result = ensure_model(&model, Path::new("/unused")).await;
        assert!(matches!(
            result.unwrap_err(),
            Error::ModelNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_ensure_model_uses_cached_file() {
        let tmp = std::env::temp_dir().join("captio_test_model_cache");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        // Pre-populate cache dir with a fake model so no download happens
        let model_path = tmp.join("ggml-tiny.bin");
        fs::write(&model_path, b"fake cached model").unwrap();

        let model = Model::Tiny;
        let result = ensure_model(&model, &tmp).await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap(), model_path);

        fs::remove_dir_all(&tmp).ok();
    }
}
