use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use cpv_extract::config::{load_config, EtlConfig};
use cpv_extract::export::{export_table, read_leaf_category_ids};
use cpv_extract::object_store::{build_store, upload_file};
use cpv_extract::reconcile::ReconcileSettings;
use cpv_extract::{HttpCatalogApi, Reconciler, ValueGlossary};

#[derive(Parser)]
#[command(name = "cpv-extract", version, about = "Export catalog categories, properties and values across languages")]
struct Cli {
    /// TOML config file (defaults to ./cpv_extract.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Also write logs to a daily rolling file in this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone)]
enum Command {
    /// Categories, then properties of every leaf
    All,
    /// Category table only
    Categories,
    /// Properties of the leaves listed in an existing category export
    Properties {
        #[arg(long)]
        categories: PathBuf,
    },
}

#[derive(Clone, Copy)]
enum ExportKind {
    Category,
    Property,
}

struct Exported {
    path: PathBuf,
    kind: ExportKind,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = cpv_extract::log::init(cli.log_dir.as_deref());

    let config = load_config(cli.config.as_deref())?;
    let command = cli.command.unwrap_or(Command::All);
    let start = Instant::now();
    info!(languages = ?config.languages, "starting extraction");

    // The pipeline is blocking I/O on a rayon pool; keep it off the async workers.
    let run_config = config.clone();
    let exported = tokio::task::spawn_blocking(move || run(&run_config, command))
        .await
        .context("pipeline task panicked")??;

    if let Some(store_config) = &config.object_store {
        let store = build_store(store_config)?;
        for file in &exported {
            let prefix = match file.kind {
                ExportKind::Category => &store_config.category_prefix,
                ExportKind::Property => &store_config.property_prefix,
            };
            upload_file(store.as_ref(), &store_config.bucket, prefix, &file.path)
                .await
                .with_context(|| format!("failed to upload {}", file.path.display()))?;
        }
    }

    info!(elapsed_secs = start.elapsed().as_secs_f64(), "extraction finished");
    Ok(())
}

fn run(config: &EtlConfig, command: Command) -> anyhow::Result<Vec<Exported>> {
    let api = HttpCatalogApi::new(config).context("failed to build HTTP client")?;
    let reconciler = Reconciler::new(&api, ReconcileSettings::from(config), config.worker_threads)?;
    let delimiter = config.delimiter_byte();
    let categories_only = matches!(command, Command::Categories);
    let mut exported = Vec::new();

    let leaf_ids = match command {
        Command::Properties { categories } => read_leaf_category_ids(&categories, delimiter)
            .with_context(|| format!("failed to read leaf ids from {}", categories.display()))?,
        Command::All | Command::Categories => {
            let tables = reconciler.language_tables()?;
            if config.write_language_tables {
                for table in &tables {
                    let file_name = format!("categories_{}_data_output.csv", table.language());
                    let path = export_table(table, &config.output_dir, &file_name, config.format, delimiter)?;
                    exported.push(Exported {
                        path,
                        kind: ExportKind::Category,
                    });
                }
            }

            let unified = reconciler.join_categories(tables);
            let path = export_table(&unified, &config.output_dir, &config.category_file, config.format, delimiter)?;
            exported.push(Exported {
                path,
                kind: ExportKind::Category,
            });
            if categories_only {
                return Ok(exported);
            }
            unified.leaf_ids()
        }
    };

    info!(leaf_categories = leaf_ids.len(), "fetching property schemas");
    let properties = reconciler.properties(&leaf_ids);
    let path = export_table(&properties, &config.output_dir, &config.property_file, config.format, delimiter)?;
    exported.push(Exported {
        path,
        kind: ExportKind::Property,
    });

    let glossary = ValueGlossary::from_properties(&properties);
    let path = export_table(&glossary, &config.output_dir, &config.value_file, config.format, delimiter)?;
    exported.push(Exported {
        path,
        kind: ExportKind::Property,
    });

    Ok(exported)
}
