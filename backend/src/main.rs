//! tabclean CLI - Clean and convert CSV / Excel files
//!
//! # Commands
//!
//! ```bash
//! tabclean serve                                  # Start HTTP server (port 3000)
//! tabclean preview data.csv --dedup --fill        # Show stage previews
//! tabclean convert a.csv b.xlsx --to xlsx         # Convert files
//! tabclean chart data.csv --columns price,qty     # Print chart series as JSON
//! ```

use clap::{Args, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tabclean::{
    convert, run_pipeline, Cell, ColumnSelection, ConversionRequest, Delimiter, OutputFormat,
    ParseOptions, PipelineOptions, Settings, StagePreview,
};

#[derive(Parser)]
#[command(name = "tabclean")]
#[command(about = "Clean CSV / Excel files and convert between formats", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every pipeline command
#[derive(Args, Clone)]
struct CleanArgs {
    /// Remove duplicate rows
    #[arg(long)]
    dedup: bool,

    /// Fill missing numeric values with the column mean
    #[arg(long)]
    fill: bool,

    /// Columns to keep, in order (default: all)
    #[arg(short, long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// CSV separator: a single character, "tab" or "auto" (default: ",")
    #[arg(short, long)]
    delimiter: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the first rows after each pipeline stage
    Preview {
        /// Input CSV or XLSX file
        input: PathBuf,

        /// Rows per preview
        #[arg(short, long)]
        rows: Option<usize>,

        #[command(flatten)]
        clean: CleanArgs,
    },

    /// Convert one or more files
    Convert {
        /// Input CSV or XLSX files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output format: csv or xlsx
        #[arg(short, long, default_value = "csv")]
        to: OutputFormat,

        /// Output directory (default: current directory)
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Also write the chart series as <name>.chart.json
        #[arg(long)]
        chart: bool,

        #[command(flatten)]
        clean: CleanArgs,
    },

    /// Print the chart series (first two numeric columns) as JSON
    Chart {
        /// Input CSV or XLSX file
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        clean: CleanArgs,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: TABCLEAN_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match Settings::from_env() {
        Ok(settings) => match cli.command {
            Commands::Preview { input, rows, clean } => {
                cmd_preview(&input, rows.unwrap_or(settings.preview_rows), &clean)
            }
            Commands::Convert { inputs, to, out_dir, chart, clean } => {
                cmd_convert(&inputs, to, out_dir.as_deref(), chart, &clean, &settings)
            }
            Commands::Chart { input, output, clean } => {
                cmd_chart(&input, output.as_deref(), &clean, &settings)
            }
            Commands::Serve { port } => cmd_serve(port, settings).await,
        },
        Err(e) => Err(e.into()),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

impl CleanArgs {
    fn request(&self, output_format: OutputFormat, chart: bool) -> ConversionRequest {
        ConversionRequest {
            input_format: None,
            remove_duplicates: self.dedup,
            fill_missing: self.fill,
            columns: ColumnSelection::from(self.columns.clone()),
            chart,
            output_format,
        }
    }

    fn options(&self, preview_rows: usize) -> Result<PipelineOptions, Box<dyn std::error::Error>> {
        Ok(PipelineOptions {
            preview_rows,
            parse: ParseOptions {
                delimiter: parse_delimiter(self.delimiter.as_deref())?,
            },
        })
    }
}

fn parse_delimiter(value: Option<&str>) -> Result<Delimiter, Box<dyn std::error::Error>> {
    match value {
        None => Ok(Delimiter::Comma),
        Some("auto") => Ok(Delimiter::Auto),
        Some("tab") | Some("\\t") => Ok(Delimiter::Char(b'\t')),
        Some(s) if s.len() == 1 => Ok(Delimiter::Char(s.as_bytes()[0])),
        Some(s) => Err(format!("Invalid delimiter '{}': expected one ASCII character, \"tab\" or \"auto\"", s).into()),
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn cmd_preview(
    input: &Path,
    rows: usize,
    clean: &CleanArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let request = clean.request(OutputFormat::default(), false);
    let run = run_pipeline(&file_name_of(input), &bytes, &request, &clean.options(rows)?)?;

    for preview in &run.previews {
        print_preview(preview);
    }
    Ok(())
}

fn cmd_convert(
    inputs: &[PathBuf],
    to: OutputFormat,
    out_dir: Option<&Path>,
    chart: bool,
    clean: &CleanArgs,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let out_dir = out_dir.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(out_dir)?;

    let request = clean.request(to, chart);
    let options = clean.options(settings.preview_rows)?;
    let mut failed = 0;

    for input in inputs {
        eprintln!("📄 Processing: {}", input.display());
        match convert_file(input, out_dir, &request, &options) {
            Ok(paths) => {
                for path in paths {
                    eprintln!("   💾 Written: {}", path.display());
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("   ❌ {}", e);
            }
        }
    }

    if failed > 0 {
        return Err(format!("{} of {} file(s) failed", failed, inputs.len()).into());
    }
    eprintln!("\n✨ Done!");
    Ok(())
}

/// Convert one file and write its outputs into `out_dir`.
fn convert_file(
    input: &Path,
    out_dir: &Path,
    request: &ConversionRequest,
    options: &PipelineOptions,
) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let conversion = convert(&file_name_of(input), &bytes, request, options)?;
    let mut written = vec![conversion.export.write_to_dir(out_dir)?];

    if let Some(chart) = conversion.run.chart {
        let stem = Path::new(&conversion.export.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let path = out_dir.join(format!("{}.chart.json", stem));
        fs::write(&path, serde_json::to_string_pretty(&chart)?)?;
        written.push(path);
    }
    Ok(written)
}

fn cmd_chart(
    input: &Path,
    output: Option<&Path>,
    clean: &CleanArgs,
    settings: &Settings,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(input)?;
    let request = clean.request(OutputFormat::default(), true);
    let run = run_pipeline(
        &file_name_of(input),
        &bytes,
        &request,
        &clean.options(settings.preview_rows)?,
    )?;

    let chart = run
        .chart
        .ok_or("No numeric columns to chart")?;
    let json = serde_json::to_string_pretty(&chart)?;
    write_output(&json, output)
}

async fn cmd_serve(port: Option<u16>, mut settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(port) = port {
        settings.port = port;
    }
    tabclean::server::start_server(settings).await
}

fn print_preview(preview: &StagePreview) {
    let stage = serde_json::to_value(preview.stage)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    println!("\n== {} ({} rows) ==", stage, preview.row_count);

    let headers: Vec<String> = preview.columns.iter().map(|c| c.name.clone()).collect();
    let cells: Vec<Vec<String>> = preview
        .rows
        .iter()
        .map(|row| row.iter().map(display_cell).collect())
        .collect();

    let widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |values: &[String]| {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:<width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    println!("{}", line(&headers[..]));
    println!(
        "{}",
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-")
    );
    for row in &cells {
        println!("{}", line(&row[..]));
    }
}

fn display_cell(cell: &Cell) -> String {
    match cell {
        Cell::Missing => "<missing>".to_string(),
        other => other.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
