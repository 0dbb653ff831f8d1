use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod align;
mod catalog;
mod loader;
mod models;
mod report;

#[derive(Parser)]
#[command(name = "proficiency-trends")]
#[command(about = "Chart district percent-proficient trends across school years", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a files.json manifest from a directory of district CSV files
    Index {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
        /// Manifest path (defaults to <data-dir>/files.json)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the years, districts and subjects available in a catalog
    Options {
        #[arg(long, env = "PROFICIENCY_CATALOG", default_value = "data/files.json")]
        catalog: PathBuf,
    },
    /// Render a percent-proficient chart for one year, subject and set of districts
    Chart {
        #[arg(long, env = "PROFICIENCY_CATALOG", default_value = "data/files.json")]
        catalog: PathBuf,
        #[arg(long)]
        year: String,
        #[arg(long)]
        subject: String,
        /// District to include; repeat or comma-separate for several
        #[arg(long = "district", value_delimiter = ',')]
        districts: Vec<String>,
        #[arg(long)]
        svg: Option<PathBuf>,
        #[arg(long)]
        json: Option<PathBuf>,
        #[arg(long)]
        markdown: Option<PathBuf>,
        #[arg(long, default_value = loader::DEFAULT_PERIOD_COLUMN)]
        period_column: String,
        #[arg(long, default_value = loader::DEFAULT_VALUE_COLUMN)]
        value_column: String,
        #[arg(long, default_value_t = 960)]
        width: u32,
        #[arg(long, default_value_t = 540)]
        height: u32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Index { data_dir, out } => {
            let descriptors = catalog::scan_dir(&data_dir)?;
            let out = out.unwrap_or_else(|| data_dir.join("files.json"));
            catalog::write_catalog(&out, &descriptors)?;
            println!("Indexed {} files into {}.", descriptors.len(), out.display());
        }
        Commands::Options {
            catalog: catalog_path,
        } => {
            let (descriptors, _) = catalog::load_catalog(&catalog_path)?;
            if descriptors.is_empty() {
                println!("No data files found in {}.", catalog_path.display());
                return Ok(());
            }

            let options = catalog::options(&descriptors);

            println!("Years: {}", options.years.join(", "));
            println!("Subjects: {}", options.subjects.join(", "));
            println!("Districts:");
            for district in &options.districts {
                println!("- {district}");
            }
        }
        Commands::Chart {
            catalog: catalog_path,
            year,
            subject,
            districts,
            svg,
            json,
            markdown,
            period_column,
            value_column,
            width,
            height,
        } => {
            let (descriptors, data_dir) = catalog::load_catalog(&catalog_path)?;
            let districts: Vec<String> = districts
                .into_iter()
                .map(|district| district.trim().to_string())
                .filter(|district| !district.is_empty())
                .collect();

            let selected = catalog::resolve(&descriptors, &year, &subject, &districts);
            for district in &districts {
                if !selected.iter().any(|entry| &entry.district == district) {
                    warn!(%district, %year, %subject, "no data file for district");
                }
            }
            info!(files = selected.len(), "resolved selection");

            let columns = loader::Columns {
                period: period_column,
                value: value_column,
            };
            let sources = loader::load_sources(&data_dir, &selected, &columns).await;
            let spec = report::chart_spec(&subject, align::align(&sources));

            let svg = match (&svg, &json, &markdown) {
                (None, None, None) => Some(PathBuf::from("chart.svg")),
                _ => svg,
            };

            if let Some(path) = &svg {
                let rendered = report::render_svg(&spec, &report::SvgOptions { width, height });
                std::fs::write(path, rendered)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Chart written to {}.", path.display());
            }
            if let Some(path) = &json {
                let rendered = serde_json::to_string_pretty(&report::render_json(&spec))?;
                std::fs::write(path, rendered)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Chart data written to {}.", path.display());
            }
            if let Some(path) = &markdown {
                std::fs::write(path, report::render_markdown(&spec))
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Table written to {}.", path.display());
            }

            println!(
                "{} series across {} school years.",
                spec.chart.series.len(),
                spec.chart.axis.len()
            );
        }
    }

    Ok(())
}
