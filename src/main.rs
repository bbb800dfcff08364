//! fteload CLI - transform resource-loading schedule exports into FTE tables.
//!
//! # Main Commands
//!
//! ```bash
//! fteload transform export.csv                     # FTE table to stdout
//! fteload transform a.csv b.xlsx --level3 1.03     # scoped two-file batch
//! fteload transform export.csv --bucket quarter    # quarterly FTE columns
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! fteload inspect export.csv        # decoded columns and fiscal labels
//! fteload periods "FY24, FM1"      # fiscal label -> calendar mapping
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fteload::{
    decode_table, fiscal_columns, fiscal_quarter, fiscal_year, process_batch, to_csv, to_text,
    BucketKind, Capacity, CategoryLookup, FiscalPeriod, PipelineOptions, RenderOptions,
    ReportVariant, UploadedFile, DEFAULT_HOURS_PER_MONTH,
};

#[derive(Parser)]
#[command(name = "fteload")]
#[command(about = "Transform WBS resource-loading exports into FTE staffing tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on one or more export files
    Transform {
        /// Input files (csv or xls/xlsx); each file is one batch entry
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Resource category lookup file (csv or xls/xlsx)
        #[arg(long)]
        categories: Option<PathBuf>,

        /// Keep only rows under this level-3 WBS code (e.g. 1.03)
        #[arg(long)]
        level3: Option<String>,

        /// Per-person capacity in hours per month
        #[arg(long, default_value_t = DEFAULT_HOURS_PER_MONTH)]
        capacity: f64,

        /// Aggregate whose FTE columns the projection carries
        #[arg(long, value_enum, default_value = "fiscal-year")]
        bucket: BucketKind,

        /// Emit the wide report (all columns plus every aggregate)
        #[arg(long)]
        wide: bool,

        /// Also derive the L6 hierarchy key
        #[arg(long)]
        deep: bool,

        /// Decimal places for numeric cells
        #[arg(long, default_value_t = 2)]
        precision: usize,

        /// Cap on rendered rows per file (preview)
        #[arg(long)]
        limit: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a file and show its columns and fiscal-period labels
    Inspect {
        /// Input file (csv or xls/xlsx)
        file: PathBuf,
    },

    /// Show the fiscal -> calendar mapping for period labels
    Periods {
        /// Labels like "FY24, FM1"
        #[arg(required = true)]
        labels: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Table,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Transform {
            files,
            categories,
            level3,
            capacity,
            bucket,
            wide,
            deep,
            precision,
            limit,
            format,
            output,
        } => {
            let lookup = match categories {
                Some(path) => {
                    let upload = UploadedFile::from_path(&path)?;
                    let table = decode_table(&upload.contents, &upload.filename)?;
                    let lookup = CategoryLookup::from_table(&table)?;
                    info!(entries = lookup.len(), file = %upload.filename, "category lookup loaded");
                    Some(lookup)
                }
                None => None,
            };

            let uploads: Vec<UploadedFile> = files
                .iter()
                .map(|path| UploadedFile::from_path(path))
                .collect::<Result<_, _>>()?;

            let options = PipelineOptions {
                level3_filter: level3,
                capacity: Capacity::new(capacity),
                deep_hierarchy: deep,
                variant: if wide {
                    ReportVariant::Wide
                } else {
                    ReportVariant::Filtered
                },
                bucket,
            };
            let render_options = RenderOptions {
                float_precision: precision,
                max_rows: limit,
            };

            let outcomes = process_batch(&uploads, &options, lookup.as_ref());

            let mut out = String::new();
            let with_headings = outcomes.len() > 1 || format == OutputFormat::Table;
            for outcome in &outcomes {
                if with_headings {
                    out.push_str(&format!("== {}", outcome.filename));
                    if let Some(ts) = outcome.uploaded_at {
                        out.push_str(&format!(" ({})", ts.format("%Y-%m-%d %H:%M:%S")));
                    }
                    out.push('\n');
                }
                match &outcome.result {
                    Ok(table) => out.push_str(&match format {
                        OutputFormat::Csv => to_csv(table, &render_options),
                        OutputFormat::Table => to_text(table, &render_options),
                    }),
                    Err(_) => {
                        out.push_str(outcome.error_message().unwrap_or_default());
                        out.push('\n');
                    }
                }
                out.push('\n');
            }

            match output {
                Some(path) => std::fs::write(path, out)?,
                None => print!("{out}"),
            }

            let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
            if failed > 0 {
                eprintln!("{failed} of {} file(s) failed", outcomes.len());
                std::process::exit(1);
            }
            Ok(())
        }

        Commands::Inspect { file } => {
            let upload = UploadedFile::from_path(&file)?;
            let table = decode_table(&upload.contents, &upload.filename)?;
            println!(
                "{}: {} rows, {} columns",
                upload.filename,
                table.len(),
                table.columns.len()
            );
            for (i, column) in table.columns.iter().enumerate() {
                println!("[{:2}] {}", i + 1, column);
            }

            let fiscal = fiscal_columns(&table);
            println!("{} fiscal-period column(s)", fiscal.len());
            for label in fiscal {
                print_period(&label);
            }
            Ok(())
        }

        Commands::Periods { labels } => {
            for label in labels {
                print_period(&label);
            }
            Ok(())
        }
    }
}

fn print_period(label: &str) {
    let resolved = FiscalPeriod::parse(label).and_then(|p| p.calendar_start());
    match resolved {
        Some(date) => println!(
            "{label} -> {date} (FY{} Q{})",
            fiscal_year(date),
            fiscal_quarter(date)
        ),
        None => println!("{label} -> not a fiscal period label"),
    }
}
