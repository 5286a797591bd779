use std::path::PathBuf;

use captio::{Error, Language, Model, ModelCache, TranscribeOptions};
use clap::Parser;

#[derive(Parser)]
#[command(name = "transcribe", about = "Transcribe an audio file to JSON + SRT")]
struct Cli {
    /// Audio file to transcribe.
    #[arg(required_unless_present = "list_languages")]
    audio_path: Option<PathBuf>,

    /// Whisper model to use (name or path to a .ggml file).
    #[arg(default_value = "small")]
    model: String,

    /// Language code (e.g. "en", "de") or "auto" for detection.
    #[arg(default_value = "auto")]
    language: String,

    /// Pretty-print the JSON output.
    #[arg(long)]
    pretty: bool,

    /// Model cache directory.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Disable GPU acceleration.
    #[arg(long)]
    no_gpu: bool,

    /// Number of threads (default: auto).
    #[arg(long)]
    threads: Option<u32>,

    /// List supported languages.
    #[arg(long)]
    list_languages: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pure JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("captio=info".parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();

    if cli.list_languages {
        println!("{:<6} {}", "CODE", "LANGUAGE");
        println!("{:<6} {}", "----", "--------");
        for (code, name) in Language::supported() {
            println!("{code:<6} {name}");
        }
        return;
    }

    let audio_path = cli.audio_path.expect("clap enforces audio_path");

    let model = match Model::parse_name(&cli.model) {
        Some(m) => m,
        None => {
            // Try as custom model path
            let path = PathBuf::from(&cli.model);
            if path.exists() {
                Model::Custom(path)
            } else {
                eprintln!("Unknown model: {}", cli.model);
                std::process::exit(1);
            }
        }
    };

    let mut opts = match TranscribeOptions::new().model(model).language(&cli.language) {
        Ok(o) => o.gpu(!cli.no_gpu),
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Use --list-languages to see supported languages");
            std::process::exit(1);
        }
    };

    if let Some(n) = cli.threads {
        opts = opts.n_threads(n);
    }
    if let Some(dir) = cli.cache_dir {
        opts = opts.cache_dir(dir);
    }

    let cache = ModelCache::new();

    let transcript = match captio::transcribe_file_with_options(&audio_path, &cache, &opts).await {
        Ok(t) => t,
        Err(e @ Error::FileTooLarge { .. }) => {
            // The one structured error path: JSON on stdout, exit 1
            println!("{}", serde_json::json!({ "error": e.to_string() }));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let json = if cli.pretty {
        transcript.to_json_pretty()
    } else {
        transcript.to_json()
    };

    match json {
        Ok(j) => println!("{j}"),
        Err(e) => {
            eprintln!("JSON error: {e}");
            std::process::exit(1);
        }
    }
}
