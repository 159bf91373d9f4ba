use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use noisefs::cache::standard::{StandardCache, StandardCacheConfig};
use noisefs::cache::Cache;
use noisefs::context::CancellationToken;
use noisefs::engine::Engine;
use noisefs::metrics::Metrics;
use noisefs::randomizer::RandomizerSelector;
use noisefs::storage::filesystem::{read_descriptor_handle, write_descriptor_handle, FilesystemBackend};
use noisefs::storage::{BlockAddress, StorageBackend};

#[derive(Parser)]
#[command(name = "noisefs", version = "0.1.0", about = "OFFSystem-style anonymized block storage CLI")]
struct Cli {
    /// Directory the demo filesystem storage backend reads and writes blocks in.
    #[arg(long, global = true, default_value = "./noisefs-store")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Anonymize and upload a file, writing a descriptor handle alongside it
    Upload {
        input: PathBuf,
        /// Where to write the descriptor handle (a hex CID)
        #[arg(short, long)]
        descriptor: PathBuf,
        #[arg(short, long, default_value = "65536")]
        block_size: u32,
        /// Encrypt the descriptor with this password
        #[arg(short, long)]
        password: Option<String>,
        /// Use the streaming path instead of buffering the whole file
        #[arg(long)]
        streaming: bool,
    },
    /// Reconstruct a file from a descriptor handle
    Download {
        descriptor: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(short, long)]
        password: Option<String>,
        #[arg(long)]
        streaming: bool,
    },
    /// Print a descriptor's manifest fields without reconstructing the file
    Info {
        descriptor: PathBuf,
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Print a metrics snapshot for this process's in-memory engine state
    CacheStats,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let ctx = CancellationToken::none();

    match cli.command {
        Commands::Upload { input, descriptor, block_size, password, streaming } => {
            let engine = build_engine(&cli.store)?;
            let file = std::fs::File::open(&input)?;

            let filename = input.file_name().unwrap_or_default().to_string_lossy().to_string();
            let result = if streaming {
                engine.upload_streaming(&ctx, file, &filename, block_size, password.as_deref(), None)?
            } else {
                engine.upload_buffered(&ctx, file, &filename, block_size, password.as_deref(), None)?
            };

            write_descriptor_handle(&descriptor, &result.descriptor_address.cid)?;
            println!("Uploaded: {}", input.display());
            println!("  file_size    {} B", result.file_size);
            println!("  blocks       {}", result.block_count);
            println!("  bytes_stored {} B", result.bytes_stored);
            println!("  descriptor   {}", descriptor.display());
        }

        Commands::Download { descriptor, output, password, streaming } => {
            let engine = build_engine(&cli.store)?;
            let addr = descriptor_address(&descriptor)?;

            if streaming {
                let out_file = std::fs::File::create(&output)?;
                engine.download_streaming(&ctx, &addr, password.as_deref(), out_file, None)?;
            } else {
                let bytes = engine.download_buffered(&ctx, &addr, password.as_deref(), None)?;
                std::fs::write(&output, bytes)?;
            }
            println!("Downloaded to: {}", output.display());
        }

        Commands::Info { descriptor, password } => {
            let engine = build_engine(&cli.store)?;
            let addr = descriptor_address(&descriptor)?;
            let loaded = match &password {
                Some(pw) => engine.encrypted_descriptor_store().load(&ctx, &addr, pw)?,
                None => engine.plaintext_descriptor_store().load(&ctx, &addr)?,
            };

            println!("── descriptor ───────────────────────────────────────────");
            println!("  filename     {}", loaded.filename);
            println!("  file_size    {} B", loaded.file_size);
            println!("  block_size   {} B", loaded.block_size);
            println!("  triples      {}", loaded.triples().len());
        }

        Commands::CacheStats => {
            let metrics = Metrics::new();
            let snapshot = metrics.snapshot();
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

fn build_engine(store_dir: &PathBuf) -> Result<Engine, Box<dyn std::error::Error>> {
    let storage: Arc<dyn StorageBackend> = Arc::new(FilesystemBackend::new(store_dir)?);
    let cache: Arc<dyn Cache> = Arc::new(StandardCache::new(StandardCacheConfig::default()));
    let randomizer = Arc::new(RandomizerSelector::new(cache.clone(), storage.clone()));
    Ok(Engine::new(storage, cache, randomizer, Arc::new(Metrics::new())))
}

fn descriptor_address(handle_path: &PathBuf) -> Result<BlockAddress, Box<dyn std::error::Error>> {
    let cid = read_descriptor_handle(handle_path)?;
    Ok(BlockAddress::new(cid))
}
