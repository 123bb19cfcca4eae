//! Herbaria CLI: operate the photo storage router from the command line.
//!
//! Configuration is read from the environment (and `.env`); see
//! `herbaria check-config`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use herbaria_cli::{config_summary, content_type_for_path, init_tracing, parse_key_list, run_migration};
use herbaria_core::constants::DEFAULT_SIGNED_URL_TTL_SECS;
use herbaria_core::{Config, EntityType};
use herbaria_processing::{
    AssumeEntitiesExist, ImageVariantProcessor, InMemoryPhotoStore, PhotoUploader, UploadFile,
};
use herbaria_storage::{create_router, ObjectInfo, StorageRouter};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "herbaria", about = "Herbaria photo storage CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process and upload photos for an entity
    ///
    /// Objects are written to storage. Photo records live only for this run
    /// and are printed; entity existence is not checked.
    Upload {
        /// Entity type: species, sector, specimen, site-content
        entity: EntityType,
        /// Entity id (ignored for site-content)
        entity_id: i64,
        /// Photo files
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Existing photo id to make the entity's cover
        #[arg(long)]
        cover_photo_id: Option<i64>,
    },
    /// Print the URL clients should use for an object
    Url {
        /// Object key or public URL
        key: String,
        /// Return a signed URL valid for this many seconds when the primary is private
        #[arg(long)]
        expires_in: Option<u64>,
    },
    /// Delete an object
    Delete {
        /// Object key or public URL
        key: String,
    },
    /// Copy objects from the secondary backend to the primary
    Migrate {
        /// Object keys or public URLs
        keys: Vec<String>,
        /// File with one key or URL per line
        #[arg(long)]
        from_file: Option<PathBuf>,
        /// Migrate every secondary object under this folder ("" for all)
        #[arg(long)]
        prefix: Option<String>,
        /// List what would be copied without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate configuration and print it without secrets
    CheckConfig,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

fn build_router(config: &Config) -> anyhow::Result<Arc<StorageRouter>> {
    let router = create_router(&config.storage).context("Failed to initialize storage backends")?;
    Ok(Arc::new(router))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;

    match cli.command {
        Commands::Upload {
            entity,
            entity_id,
            files,
            cover_photo_id,
        } => {
            let router = build_router(&config)?;
            let uploader = PhotoUploader::new(
                router,
                ImageVariantProcessor::new(config.image.clone()),
                Arc::new(InMemoryPhotoStore::new()),
                Arc::new(AssumeEntitiesExist),
            );

            let mut batch = Vec::with_capacity(files.len());
            for path in files {
                let data = tokio::fs::read(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                batch.push(UploadFile::new(
                    filename,
                    content_type_for_path(&path),
                    data,
                ));
            }

            let outcome = uploader
                .upload_photos_with_cover(entity, entity_id, batch, cover_photo_id)
                .await?;
            print_json(&outcome)?;
        }
        Commands::Url { key, expires_in } => {
            let router = build_router(&config)?;
            let key = router.resolve_key(&key);
            let ttl = Duration::from_secs(expires_in.unwrap_or(DEFAULT_SIGNED_URL_TTL_SECS));
            let url = router.get_access_url(&key, ttl).await?;
            println!("{}", url);
        }
        Commands::Delete { key } => {
            let router = build_router(&config)?;
            let key = router.resolve_key(&key);
            router.delete_object(&key).await?;
            println!("Deleted {}", key);
        }
        Commands::Migrate {
            keys,
            from_file,
            prefix,
            dry_run,
        } => {
            let router = build_router(&config)?;

            let mut inputs = keys;
            if let Some(path) = from_file {
                let contents = tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                inputs.extend(parse_key_list(&contents));
            }

            let mut sources: Vec<ObjectInfo> = inputs
                .iter()
                .map(|input| ObjectInfo::from_key(router.resolve_key(input)))
                .collect();
            if let Some(prefix) = prefix {
                let listed = router
                    .list_secondary_objects(&prefix)
                    .await
                    .with_context(|| format!("Failed to list secondary objects under {:?}", prefix))?;
                sources.extend(listed);
            }
            anyhow::ensure!(!sources.is_empty(), "No keys to migrate");

            let report = run_migration(&router, sources, dry_run).await;
            print_json(&report)?;
            anyhow::ensure!(
                report.failed.is_empty(),
                "{} object(s) failed to migrate",
                report.failed.len()
            );
        }
        Commands::CheckConfig => {
            build_router(&config)?;
            print_json(&config_summary(&config))?;
        }
    }

    Ok(())
}
