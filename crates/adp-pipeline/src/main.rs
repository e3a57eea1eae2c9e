//! ADP Pipeline - staged AIS archive ingestion tool

use adp_common::logging::{init_logging, LogConfig, LogLevel};
use adp_common::TableRef;
use adp_pipeline::{
    acquire, decompress, drip, load, provision, remote, sink, sql, LocalVolume, PipelineConfig,
};
use anyhow::Result;
use clap::{ArgAction, Parser};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "adp-pipeline")]
#[command(author, version, about = "Staged AIS archive ingestion pipeline")]
struct Cli {
    /// Pipeline stage to run
    #[command(subcommand)]
    stage: Stage,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Stage {
    /// Download missing archive files for a year into the holding volume
    Download {
        /// Catalog name
        #[arg(long)]
        catalog: String,

        /// Schema name
        #[arg(long)]
        schema: String,

        /// Holding volume name
        #[arg(long)]
        volume: String,

        /// Calendar year to download
        #[arg(long)]
        year: u16,

        /// Maximum number of files to download (0 = all files)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Archive base URL
        #[arg(long, default_value = remote::DEFAULT_BASE_URL)]
        base_url: String,
    },

    /// Release a rate-limited batch of held files into the landing area
    Drip {
        /// Catalog name
        #[arg(long)]
        catalog: String,

        /// Schema name
        #[arg(long)]
        schema: String,

        /// Source (holding) volume name
        #[arg(long)]
        source_volume: String,

        /// Landing volume name
        #[arg(long)]
        landing_volume: String,

        /// Number of files to release per run
        #[arg(long)]
        n_per_run: usize,

        /// Whether to delete source files after release (true/false)
        #[arg(long, action = ArgAction::Set, default_value_t = true)]
        delete_source: bool,
    },

    /// Decompress landed archive files into the landing root
    Decompress {
        /// Catalog name
        #[arg(long)]
        catalog: String,

        /// Schema name
        #[arg(long)]
        schema: String,

        /// Volume containing compressed files
        #[arg(long)]
        source_volume: String,

        /// Destination volume for decompressed files
        #[arg(long)]
        landing_volume: String,

        /// Maximum number of files to decompress (0 = all files)
        #[arg(long, default_value_t = 0)]
        limit: usize,

        /// Whether to delete compressed files after decompressing (true/false)
        #[arg(long, action = ArgAction::Set, default_value_t = false)]
        delete_compressed: bool,

        /// Decoded-block size in MiB for frame streaming
        #[arg(long, default_value_t = 50)]
        block_size_mb: usize,
    },

    /// Load new landed files into the target table, then enrich
    Load {
        /// Catalog name
        #[arg(long)]
        catalog: String,

        /// Schema name
        #[arg(long)]
        schema: String,

        /// Landing volume name
        #[arg(long)]
        landing_volume: String,

        /// Relative path within the landing volume for schema inference
        #[arg(long, default_value = "_schema")]
        schema_location: String,

        /// Relative path within the landing volume for checkpoints
        #[arg(long, default_value = "_checkpoint")]
        checkpoint_location: String,

        /// Target table as schema.table
        #[arg(long)]
        target_table: String,

        /// Postgres connection string
        #[arg(long, env = "DATABASE_URL")]
        database_url: String,

        /// Run the load phase only, skipping enrichment
        #[arg(long)]
        skip_enrich: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbose flag; environment variables
    // override only the fields they actually set.
    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::new(log_level, "adp-pipeline").with_env_overrides()?;
    init_logging(&log_config)?;

    let local = LocalVolume::new();

    match cli.stage {
        Stage::Download {
            catalog,
            schema,
            volume,
            year,
            limit,
            base_url,
        } => {
            let cfg = PipelineConfig::new(catalog, schema)?;
            let holding = cfg.locator(volume);
            provision::ensure_volume(&local, &holding)?;

            let opts = acquire::AcquireOptions {
                base_url,
                year,
                limit: (limit > 0).then_some(limit),
            };
            let summary = acquire::run(&local, &holding, &opts).await?;
            println!("Download complete: {summary}");
        }

        Stage::Drip {
            catalog,
            schema,
            source_volume,
            landing_volume,
            n_per_run,
            delete_source,
        } => {
            let cfg = PipelineConfig::new(catalog, schema)?;
            let source = cfg.locator(source_volume);
            let landing = cfg.locator(landing_volume);
            provision::ensure_volume(&local, &source)?;
            provision::ensure_volume(&local, &landing)?;

            let opts = drip::DripOptions {
                n_per_run,
                delete_source,
            };
            let summary = drip::run(&local, &source, &landing, &opts, drip::hourly_partition)?;
            println!("Released {} file(s) -> {}", summary.succeeded, landing.path().display());
            println!("Drip complete: {summary}");
        }

        Stage::Decompress {
            catalog,
            schema,
            source_volume,
            landing_volume,
            limit,
            delete_compressed,
            block_size_mb,
        } => {
            let cfg = PipelineConfig::new(catalog, schema)?;
            let source = cfg.locator(source_volume);
            let landing = cfg.locator(landing_volume);
            provision::ensure_volume(&local, &source)?;
            provision::ensure_volume(&local, &landing)?;

            let opts = decompress::DecompressOptions {
                limit: (limit > 0).then_some(limit),
                delete_compressed,
                block_size: block_size_mb * 1024 * 1024,
            };
            let summary = decompress::run(&local, &source, &landing, &opts)?;
            println!("Decompression complete: {summary}");
        }

        Stage::Load {
            catalog,
            schema,
            landing_volume,
            schema_location,
            checkpoint_location,
            target_table,
            database_url,
            skip_enrich,
        } => {
            let cfg = PipelineConfig::new(catalog, schema)?;
            let landing = cfg.locator(landing_volume);
            provision::ensure_volume(&local, &landing)?;

            let table = TableRef::parse(&target_table)?;
            let surface = sql::PgSqlSurface::connect(&database_url).await?;
            provision::ensure_schema(&surface, &table.schema).await?;

            let record_sink = sink::PgRecordSink::new(surface.pool().clone());
            let connector = load::CsvLoadConnector::new(&local, record_sink);
            let loader_cfg = load::LoaderConfig {
                landing,
                schema_location: schema_location.into(),
                checkpoint_location: checkpoint_location.into(),
                table,
            };
            let summary = load::run(&connector, &surface, &loader_cfg, skip_enrich).await?;
            println!("Load complete: {summary}");
        }
    }

    info!("Stage finished");
    Ok(())
}
