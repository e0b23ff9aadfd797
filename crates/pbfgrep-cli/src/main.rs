//! pbfgrep - search OpenStreetMap PBF files for nodes
//!
//! This tool streams the nodes of a `.osm.pbf` file and prints those whose
//! id and tags satisfy every `key=value` glob given on the command line.

mod query;

use anyhow::{Context, Result};
use clap::Parser;
use pbfgrep_core::{PointRecord, Records};
use query::Query;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Search OpenStreetMap PBF files for nodes by tag
#[derive(Parser, Debug)]
#[command(name = "pbfgrep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// .osm.pbf file to read
    file: PathBuf,

    /// Node filter: key=value globs (`*` matches anything, a bare key means key=*)
    #[arg(required = true)]
    query: Vec<String>,

    /// Print the whole matching node
    #[arg(short = 'i', long)]
    full_node: bool,

    /// Print only the matching values
    #[arg(short = 'q', long)]
    value_only: bool,

    /// Stop after the first N matching nodes
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Warn about corrupt node groups and keep searching
    #[arg(short = 'k', long)]
    keep_going: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// What to print for a matching node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    /// Matched pairs as 'key'='value'
    Pairs,
    /// Matched values only
    Values,
    /// The id and every tag
    Node,
}

impl Cli {
    fn output(&self) -> Output {
        if self.value_only {
            Output::Values
        } else if self.full_node {
            Output::Node
        } else {
            Output::Pairs
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let count = run(&cli, &mut out)?;
    out.flush().context("Failed to flush output")?;

    info!("{} matching node(s)", count);
    Ok(())
}

/// Opens the input file and searches it
fn run(cli: &Cli, out: &mut impl Write) -> Result<usize> {
    let query = Query::compile(&cli.query)?;
    let records = pbfgrep_core::open(&cli.file)
        .with_context(|| format!("Failed to open input file: {}", cli.file.display()))?;

    debug!("Searching {} for {:?}", cli.file.display(), cli.query);
    search(records, &query, cli, out)
}

/// Prints every matching node, returning how many matched
fn search<R: Read>(
    mut records: Records<R>,
    query: &Query,
    cli: &Cli,
    out: &mut impl Write,
) -> Result<usize> {
    let mut count = 0;
    if cli.limit == Some(0) {
        return Ok(count);
    }

    while let Some(record) = records.next() {
        let record = match record {
            Ok(record) => record,
            Err(e) if e.is_recoverable() && cli.keep_going => {
                warn!("Skipping corrupt group: {}", e);
                continue;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Failed to decode {} near offset {}",
                        cli.file.display(),
                        records.offset()
                    )
                })
            }
        };

        let Some(matched) = query.matches(&record) else {
            continue;
        };

        count += 1;
        print_match(out, cli.output(), &record, &matched).context("Failed to write output")?;

        if cli.limit.is_some_and(|limit| count >= limit) {
            debug!("Reached limit of {} match(es)", count);
            break;
        }
    }

    Ok(count)
}

fn print_match(
    out: &mut impl Write,
    output: Output,
    record: &PointRecord,
    matched: &[(String, String)],
) -> io::Result<()> {
    match output {
        Output::Pairs => {
            for (key, value) in matched {
                writeln!(out, "{}={}", quote(key), quote(value))?;
            }
        }
        Output::Values => {
            for (_, value) in matched {
                writeln!(out, "{}", value)?;
            }
        }
        Output::Node => {
            writeln!(out)?;
            writeln!(out, "'id'={}", record.id)?;
            for (key, value) in &record.tags {
                writeln!(out, "{}={}", quote(key), quote(value))?;
            }
        }
    }
    Ok(())
}

/// Single-quotes a string, escaping backslashes and quotes
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}
