//! dwh-maint - warehouse maintenance CLI
//!
//! # Usage
//!
//! ```bash
//! dwh-maint --config warehouse.yaml init
//! dwh-maint --config warehouse.yaml rebuild-indexes --layer cleansed
//! dwh-maint --config warehouse.yaml load
//! dwh-maint --config warehouse.yaml reset --cleansed --reporting --force
//! dwh-maint --config warehouse.yaml cycle
//! dwh-maint --config warehouse.yaml plan --layer cleansed --dialect tsql
//! dwh-maint --config warehouse.yaml audit --limit 50
//! ```
//!
//! Reports go to stdout as JSON, logs go to stderr.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use dwh_orchestration::environment::{current_host, current_identity};
use dwh_orchestration::{
    EnvironmentContext, EnvironmentDetector, MaintenanceService, ResetRequest, WarehouseConfig,
};
use dwh_storage::{dialect_by_name, Layer, SqliteWarehouse};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dwh-maint")]
#[command(about = "Layered warehouse maintenance: index rebuilds, dimensional loads, guarded resets", long_about = None)]
struct Cli {
    /// Configuration file (YAML, version 1)
    #[arg(short, long, default_value = "warehouse.yaml")]
    config: PathBuf,

    /// Host identity used for environment detection (default: the OS host name)
    #[arg(long)]
    host: Option<String>,

    /// Acting identity recorded in the audit log (default: $USER)
    #[arg(long)]
    identity: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the layer databases and the audit table
    Init,

    /// Drop and rebuild every constraint and index of a layer
    RebuildIndexes {
        #[arg(short, long)]
        layer: Layer,

        /// Override the production guard (when structural rebuilds are protected)
        #[arg(long)]
        force: bool,
    },

    /// Reload dimensions, then facts
    Load,

    /// Empty whole layers
    Reset {
        #[arg(long)]
        raw: bool,

        #[arg(long)]
        cleansed: bool,

        #[arg(long)]
        reporting: bool,

        /// Required for cleansed/reporting in production
        #[arg(long)]
        force: bool,
    },

    /// Cleanup, load and rebuild the load layer
    Cycle {
        #[arg(long)]
        force: bool,
    },

    /// Print the statements a cycle would run, without running them
    Plan {
        /// Layer to plan (default: the load layer)
        #[arg(short, long)]
        layer: Option<Layer>,

        /// sqlite or tsql
        #[arg(short, long, default_value = "sqlite")]
        dialect: String,
    },

    /// Show the most recent audit entries
    Audit {
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_warehouse(config: &WarehouseConfig) -> anyhow::Result<SqliteWarehouse> {
    let layers: Vec<(Layer, PathBuf)> = Layer::ALL
        .into_iter()
        .map(|layer| (layer, config.database.layer_path(layer)))
        .collect();
    SqliteWarehouse::open(config.database.path.clone(), &layers)
        .with_context(|| format!("opening warehouse {}", config.database.path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let config = WarehouseConfig::from_yaml(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let detector = EnvironmentDetector::new(&config.environment)?;
    let ctx = EnvironmentContext::detect(
        &detector,
        cli.host.unwrap_or_else(current_host),
        cli.identity.unwrap_or_else(current_identity),
    );
    info!(
        environment = %ctx.environment,
        host = %ctx.host,
        identity = %ctx.identity,
        run_id = %ctx.run_id,
        "environment detected"
    );

    let warehouse = open_warehouse(&config)?;
    let audit = warehouse.audit_log()?;

    if let Commands::Init = cli.command {
        for layer in Layer::ALL {
            let path = config.database.layer_path(layer);
            info!(layer = %layer, path = %path.display(), "layer ready");
        }
        println!("initialized {}", config.database.path.display());
        return Ok(());
    }

    let load_layer = config.load.layer;
    let service = MaintenanceService::new(Arc::new(config), Arc::new(warehouse), Arc::new(audit))?;

    match cli.command {
        Commands::Init => {}
        Commands::RebuildIndexes { layer, force } => {
            print_json(&service.rebuild_indexes(&ctx, layer, force).await?)?;
        }
        Commands::Load => {
            print_json(&service.load_layer(&ctx).await?)?;
        }
        Commands::Reset {
            raw,
            cleansed,
            reporting,
            force,
        } => {
            let request = ResetRequest {
                raw,
                cleansed,
                reporting,
                force,
            };
            if request.is_empty() {
                bail!("select at least one of --raw, --cleansed, --reporting");
            }
            print_json(&service.reset_layers(&ctx, request).await?)?;
        }
        Commands::Cycle { force } => {
            print_json(&service.maintenance_cycle(&ctx, force).await?)?;
        }
        Commands::Plan { layer, dialect } => {
            let Some(dialect) = dialect_by_name(&dialect) else {
                bail!("unknown dialect '{}' (expected sqlite or tsql)", dialect);
            };
            for sql in service.plan(layer.unwrap_or(load_layer), dialect.as_ref()).await? {
                println!("{};", sql);
            }
        }
        Commands::Audit { limit } => {
            print_json(&service.recent_audit(limit).await?)?;
        }
    }

    Ok(())
}
