use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use vocalscribe::engines::whisper::WhisperEngine;
use vocalscribe::pipeline::{Pipeline, PipelineConfig};
use vocalscribe::server::{AppState, Server};
use vocalscribe::storage::{FirebaseBucket, StorageHandle};
use vocalscribe::TranscriptionEngine;

#[derive(Parser, Debug)]
#[command(about = "Lyrics extraction server for stored vocal stems", version)]
struct Args {
    /// Path to the Whisper GGML model file
    #[arg(long)]
    model_path: PathBuf,

    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8000")]
    addr: SocketAddr,

    /// Storage bucket holding the vocal stems
    #[arg(long)]
    bucket: String,

    /// Where the uploaded service account key is persisted
    #[arg(long, default_value = "repository/key.json")]
    key_path: PathBuf,

    /// Language code forced on the decoder (e.g. "ko")
    #[arg(long, default_value = "ko")]
    language: String,

    /// Directory receiving transcript side files
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let mut engine = WhisperEngine::new();
    engine.load_model(&args.model_path)?;

    // A missing key at startup is not fatal; uploading one through the
    // credential page rebinds the client without a restart.
    let store = match FirebaseBucket::from_key_file(&args.bucket, &args.key_path) {
        Ok(store) => store,
        Err(err) => {
            log::warn!("storage client started without credentials: {err}");
            FirebaseBucket::new(&args.bucket)
        }
    };
    let storage = StorageHandle::new(Arc::new(store));

    let pipeline = Pipeline::new(
        engine,
        storage.clone(),
        PipelineConfig {
            language: args.language,
            output_dir: args.output_dir,
        },
    );

    let state = Arc::new(AppState::new(
        pipeline,
        storage,
        args.bucket,
        args.key_path,
    ));

    Server::new(state, args.addr).start().await?;

    Ok(())
}
