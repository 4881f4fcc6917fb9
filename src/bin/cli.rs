//! seisarchive CLI
//!
//! Command-line interface for archive operations:
//! - Retrieve waveforms (single and bulk requests)
//! - List segment availability
//! - Query the event catalog and phase picks
//! - Write a default config file

use anyhow::{anyhow, bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use seisarchive::client::{
    BulkItem, Cell, PickClient, QuakeClient, Table, WaveformClient, WaveformRequest,
};
use seisarchive::config::{generate_default_config, Config, LoggingConfig};
use seisarchive::index::IndexRecord;
use seisarchive::query::Filters;
use seisarchive::storage::types::format_index_time;
use seisarchive::storage::{parse_time, Stream};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "seisarchive")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Read waveforms, events and picks from an indexed seismic archive")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table", global = true)]
    pub format: Format,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Table,
    Json,
    Csv,
}

#[derive(Args)]
pub struct ChannelArgs {
    /// Network code(s); `*`/`?` wildcards and comma lists allowed
    #[arg(short, long)]
    network: String,
    /// Station code(s)
    #[arg(short, long)]
    station: String,
    /// Location code(s)
    #[arg(short, long, default_value = "*")]
    location: String,
    /// Channel code(s)
    #[arg(short, long)]
    channel: String,
    /// Window start (ISO 8601, epoch seconds, now, now-1d, ...)
    #[arg(long)]
    start: String,
    /// Window end
    #[arg(long)]
    end: String,
    /// Data quality indicator
    #[arg(short, long)]
    quality: Option<String>,
}

impl ChannelArgs {
    fn request(&self) -> anyhow::Result<WaveformRequest> {
        let mut request = WaveformRequest::new(
            &self.network,
            &self.station,
            &self.location,
            &self.channel,
            parse_arg_time("start", &self.start)?,
            parse_arg_time("end", &self.end)?,
        );
        if let Some(quality) = &self.quality {
            request = request.quality(quality);
        }
        Ok(request)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Retrieve waveforms for one request
    Waveforms {
        #[command(flatten)]
        channels: ChannelArgs,
        /// Write the stream to this file (.json or miniSEED)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// StationXML file; attaches responses to the traces
        #[arg(long)]
        inventory: Option<PathBuf>,
    },

    /// Retrieve waveforms for every line of a bulk request file
    ///
    /// Lines are `NET STA LOC CHA START END`; `--` means an empty location
    /// and lines starting with `#` are ignored.
    Bulk {
        /// Bulk request file
        file: PathBuf,
        /// Write the merged stream to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List index records without reading segment files
    Availability {
        #[command(flatten)]
        channels: ChannelArgs,
    },

    /// Query the event catalog
    Events {
        /// Filters in key=value format (e.g. minmagnitude=2.5)
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Columns to return (default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },

    /// Query phase picks of one contributor
    Picks {
        /// Contributor (default from config)
        #[arg(long)]
        contributor: Option<String>,
        /// Filters in key=value format (e.g. phase=P)
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Columns to return (default: all)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        /// List the contributors with pick tables and exit
        #[arg(long)]
        list_contributors: bool,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging)?;

    match cli.command {
        Commands::Waveforms {
            channels,
            output,
            inventory,
        } => {
            let mut request = channels.request()?;
            if let Some(path) = output {
                request = request.filename(path);
            }
            if let Some(path) = inventory {
                request = request.attach_response(path);
            }

            let client = waveform_client(&config)?;
            let response = client.get_waveforms(&request)?;

            print_table(&stream_table(&response.stream), cli.format)?;
            for failure in &response.failed_records {
                eprintln!("failed record {}: {}", failure.locator, failure.error);
            }
            for outcome in response.post_process.iter().filter(|o| !o.is_ok()) {
                eprintln!("{}", outcome);
            }
        }

        Commands::Bulk { file, output } => {
            let items = read_bulk_file(&file)?;
            let client = waveform_client(&config)?;
            let response = client.get_waveforms_bulk(&items, output.as_deref());

            print_table(&stream_table(&response.stream), cli.format)?;
            for failure in &response.failures {
                eprintln!(
                    "request {} ({}) failed: {}",
                    failure.index + 1,
                    failure.request,
                    failure.error
                );
            }
            for failure in &response.failed_records {
                eprintln!("failed record {}: {}", failure.locator, failure.error);
            }
            for outcome in response.post_process.iter().filter(|o| !o.is_ok()) {
                eprintln!("{}", outcome);
            }
        }

        Commands::Availability { channels } => {
            let client = waveform_client(&config)?;
            let records = client.availability(&channels.request()?)?;
            print_table(&availability_table(&records), cli.format)?;
        }

        Commands::Events { filters, columns } => {
            let mut client = QuakeClient::open(&config.catalog.database, &config.catalog.table)
                .with_context(|| {
                    format!("opening catalog {}", config.catalog.database.display())
                })?;
            let table = client.query(&columns, &parse_filters(&filters)?)?;
            print_table(&table, cli.format)?;
        }

        Commands::Picks {
            contributor,
            filters,
            columns,
            list_contributors,
        } => {
            let contributor = contributor.unwrap_or_else(|| config.catalog.contributor.clone());
            let mut client = PickClient::open(&config.catalog.database, &contributor)?;

            if list_contributors {
                for name in client.available_contributors()? {
                    println!("{}", name);
                }
            } else {
                let table = client.query(&columns, &parse_filters(&filters)?)?;
                print_table(&table, cli.format)?;
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}

/// Logs go to stderr (or the configured file) so stdout carries only results
fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);
    let json = config.format.eq_ignore_ascii_case("json");

    match &config.file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path))?;
            let writer = Mutex::new(file);
            if json {
                registry.with(fmt::layer().json().with_writer(writer)).init();
            } else {
                registry
                    .with(fmt::layer().with_ansi(false).with_writer(writer))
                    .init();
            }
        }
        None => {
            if json {
                registry
                    .with(fmt::layer().json().with_writer(std::io::stderr))
                    .init();
            } else {
                registry.with(fmt::layer().with_writer(std::io::stderr)).init();
            }
        }
    }
    Ok(())
}

fn waveform_client(config: &Config) -> anyhow::Result<WaveformClient> {
    let client = WaveformClient::open(&config.archive.index_db, &config.archive.index_table)
        .with_context(|| format!("opening index {}", config.archive.index_db.display()))?;
    Ok(client.with_failure_policy(config.archive.decode_failure))
}

fn parse_arg_time(name: &str, value: &str) -> anyhow::Result<chrono::DateTime<chrono::Utc>> {
    parse_time(value).ok_or_else(|| anyhow!("invalid --{} time: {}", name, value))
}

fn parse_filters(raw: &[String]) -> anyhow::Result<Filters> {
    let mut filters = Filters::new();
    for entry in raw {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("filter {:?} is not in key=value format", entry))?;
        filters.insert(key.trim(), value.trim());
    }
    Ok(filters)
}

fn read_bulk_file(path: &Path) -> anyhow::Result<Vec<BulkItem>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading bulk file {}", path.display()))?;
    parse_bulk(&text)
}

fn parse_bulk(text: &str) -> anyhow::Result<Vec<BulkItem>> {
    let mut items = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 6 {
            bail!("line {}: expected 6 fields, found {}", n + 1, fields.len());
        }
        let location = if fields[2] == "--" { "" } else { fields[2] };
        let time = |s: &str| {
            parse_time(s).ok_or_else(|| anyhow!("line {}: invalid time {}", n + 1, s))
        };

        items.push(BulkItem::new(
            fields[0],
            fields[1],
            location,
            fields[3],
            time(fields[4])?,
            time(fields[5])?,
        ));
    }
    Ok(items)
}

fn stream_table(stream: &Stream) -> Table {
    Table {
        columns: ["id", "start", "end", "sample_rate", "samples", "quality"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        rows: stream
            .iter()
            .map(|t| {
                vec![
                    Cell::Text(t.id.to_string()),
                    Cell::Text(format_index_time(t.start)),
                    Cell::Text(format_index_time(t.end())),
                    Cell::Real(t.sample_rate),
                    Cell::Integer(t.len() as i64),
                    t.quality.map_or(Cell::Null, |q| Cell::Text(q.to_string())),
                ]
            })
            .collect(),
    }
}

fn availability_table(records: &[IndexRecord]) -> Table {
    let text = |s: &Option<String>| s.clone().map_or(Cell::Null, Cell::Text);
    Table {
        columns: [
            "nslc",
            "quality",
            "starttime",
            "endtime",
            "samplerate",
            "filename",
            "byteoffset",
            "bytes",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect(),
        rows: records
            .iter()
            .map(|r| {
                vec![
                    Cell::Text(r.nslc()),
                    text(&r.quality),
                    Cell::Text(format_index_time(r.starttime)),
                    Cell::Text(format_index_time(r.endtime)),
                    r.samplerate.map_or(Cell::Null, Cell::Real),
                    Cell::Text(r.locator.path.display().to_string()),
                    Cell::Integer(r.locator.byte_offset as i64),
                    Cell::Integer(r.locator.byte_length as i64),
                ]
            })
            .collect(),
    }
}

fn print_table(table: &Table, format: Format) -> anyhow::Result<()> {
    let stdout = std::io::stdout();
    match format {
        Format::Json => {
            table.write_json(stdout.lock())?;
            println!();
        }
        Format::Csv => table.write_csv(stdout.lock())?,
        Format::Table => {
            if table.is_empty() {
                println!("No data");
                return Ok(());
            }
            let cells: Vec<Vec<String>> = table
                .rows
                .iter()
                .map(|row| row.iter().map(ToString::to_string).collect())
                .collect();
            let widths: Vec<usize> = table
                .columns
                .iter()
                .enumerate()
                .map(|(i, c)| {
                    cells
                        .iter()
                        .map(|row| row.get(i).map_or(0, String::len))
                        .chain(std::iter::once(c.len()))
                        .max()
                        .unwrap_or(0)
                })
                .collect();

            println!("{}", format_row(&table.columns, &widths));
            println!(
                "{}",
                "-".repeat(widths.iter().sum::<usize>() + 3 * widths.len().saturating_sub(1))
            );
            for row in &cells {
                println!("{}", format_row(row, &widths));
            }
        }
    }
    Ok(())
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(v, w)| format!("{:<width$}", v, width = w))
        .collect::<Vec<_>>()
        .join(" | ")
}
