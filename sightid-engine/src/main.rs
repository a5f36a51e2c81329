//! sightid - sighting identification CLI
//!
//! Submits sightings to the local catalog and lists what it holds.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use axum::response::IntoResponse;
use sightid_common::config::{self, ROOT_FOLDER_ENV};
use sightid_engine::db::{individuals, sightings};
use sightid_engine::{EngineConfig, SightingSubmission, SubmissionService};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sightid
#[derive(Parser, Debug)]
#[command(name = "sightid")]
#[command(about = "Identify animal sightings against a photo catalog")]
#[command(version)]
struct Args {
    /// Root folder holding the catalog database
    #[arg(short, long, global = true, env = ROOT_FOLDER_ENV)]
    root_folder: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a sighting and print the response
    Submit {
        /// Body photo file
        #[arg(long)]
        body: PathBuf,
        /// Head photo file
        #[arg(long)]
        head: PathBuf,
        /// Observation date (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Latitude, used when neither photo carries EXIF GPS tags
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,
        /// Name for the individual if it turns out to be new
        #[arg(long)]
        name: Option<String>,
    },
    /// List catalog individuals
    Individuals,
    /// List sightings of one individual
    Sightings { individual_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = config::load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let root_folder = config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let db_path = config::database_path(&root_folder);
    info!("Database: {}", db_path.display());

    let engine_config = EngineConfig::resolve(&toml_config).context("Invalid engine configuration")?;
    let pool = sightid_common::db::init_database(&db_path)
        .await
        .context("Failed to open catalog database")?;

    match args.command {
        Command::Submit {
            body,
            head,
            date,
            lat,
            lon,
            name,
        } => {
            let submission = SightingSubmission {
                photo_body: std::fs::read(&body)
                    .with_context(|| format!("Failed to read {}", body.display()))?,
                photo_head: std::fs::read(&head)
                    .with_context(|| format!("Failed to read {}", head.display()))?,
                date,
                latitude: lat,
                longitude: lon,
                name_hint: name,
            };

            let service = SubmissionService::from_config(pool, &engine_config)?;
            let response = match service.submit(submission).await {
                Ok(outcome) => outcome.into_response(),
                Err(e) => e.into_response(),
            };
            let status = response.status();
            let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
            let body: serde_json::Value = serde_json::from_slice(&body)?;

            println!("{}", serde_json::to_string_pretty(&body)?);
            if status.is_server_error() {
                anyhow::bail!("Submission failed with status {}", status.as_u16());
            }
        }
        Command::Individuals => {
            let mut conn = pool.acquire().await?;
            for individual in individuals::list_individuals(&mut conn).await? {
                println!(
                    "{}\t{}\tfirst seen {}\t{} sighting(s)",
                    individual.id, individual.name, individual.first_seen, individual.sighting_count
                );
            }
        }
        Command::Sightings { individual_id } => {
            let mut conn = pool.acquire().await?;
            if individuals::load_individual(&mut conn, individual_id).await?.is_none() {
                anyhow::bail!("Individual {} not found", individual_id);
            }
            for sighting in sightings::list_sightings_for(&mut conn, individual_id).await? {
                println!(
                    "{}\t{}\t{:.5},{:.5}\t{} / {}\t{}",
                    sighting.id,
                    sighting.observed_on,
                    sighting.latitude,
                    sighting.longitude,
                    sighting.state,
                    sighting.city,
                    if sighting.matched_existing { "matched" } else { "new" },
                );
            }
        }
    }

    Ok(())
}
