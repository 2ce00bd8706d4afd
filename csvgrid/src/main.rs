//! csvgrid CLI - Import messy delimited text as typed tables
//!
//! # Commands
//!
//! ```bash
//! csvgrid parse input.csv                  # Import and print tables as JSON
//! csvgrid parse input.csv --header false   # Treat the first row as data
//! csvgrid parse input.csv --options saved.json
//! csvgrid sniff input.csv                  # Only print the detected dialect
//! ```
//!
//! Set `RUST_LOG=csvgrid=debug` to see sniffing and header decisions.

use clap::{Parser, Subcommand};
use csvgrid::{HeaderMode, Importer, ParseOptions, ParsedFile};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "csvgrid")]
#[command(about = "Import messy delimited text files as rectangular typed tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Dialect and layout overrides shared by every command.
#[derive(clap::Args, Debug, Default)]
struct OverrideArgs {
    /// JSON file with saved options (e.g. the `options` of a previous run)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Field delimiter (sniffed if not specified)
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Quote character
    #[arg(long)]
    quote: Option<char>,

    /// Whether doubled quotes inside quoted fields are literal quotes
    #[arg(long)]
    double_quote: Option<bool>,

    /// Line terminator, with escapes: "\n", "\r\n", "\r"
    #[arg(long)]
    line_terminator: Option<String>,

    /// Strip spaces right after a delimiter
    #[arg(long)]
    skip_initial_space: Option<bool>,

    /// Whether the first non-blank row is a header (guessed if not specified)
    #[arg(long)]
    header: Option<bool>,

    /// 1-based row to start reading from
    #[arg(long)]
    start_with_row: Option<usize>,

    /// Keep at most this many data rows
    #[arg(long)]
    rows: Option<usize>,

    /// Fixed number of columns
    #[arg(long)]
    columns: Option<usize>,

    /// Force the file encoding (detected if not specified)
    #[arg(short, long)]
    encoding: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a file and output the tables and effective options as JSON
    Parse {
        /// Input file
        input: PathBuf,

        #[command(flatten)]
        overrides: OverrideArgs,

        /// Rows buffered to resolve header and column count
        #[arg(long, default_value_t = csvgrid::DEFAULT_LOOKAHEAD_ROWS)]
        lookahead: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the detected dialect without importing
    Sniff {
        /// Input file
        input: PathBuf,

        #[command(flatten)]
        overrides: OverrideArgs,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Parse {
            input,
            overrides,
            lookahead,
            output,
        } => cmd_parse(&input, &overrides, lookahead, output.as_deref()),

        Commands::Sniff { input, overrides } => cmd_sniff(&input, &overrides),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_parse(
    input: &Path,
    overrides: &OverrideArgs,
    lookahead: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Importing: {}", input.display());

    let options = build_options(overrides)?;
    let importer = build_importer(overrides).lookahead_rows(lookahead);
    let parsed = importer.detect_and_parse(input, &options)?;

    report(&parsed, &options);

    let json = serde_json::to_string_pretty(&parsed)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_sniff(input: &Path, overrides: &OverrideArgs) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("🔍 Sniffing: {}", input.display());

    let options = build_options(overrides)?;
    match build_importer(overrides).sniff_path(input, &options)? {
        Some(dialect) => {
            eprintln!("   Delimiter: '{}'", printable(&dialect.delimiter.to_string()));
            eprintln!("   Line terminator: '{}'", printable(&dialect.line_terminator));
            println!("{}", serde_json::to_string_pretty(&dialect)?);
        }
        None => eprintln!("⚠️  No line structure found; the file imports as empty"),
    }
    Ok(())
}

/// Saved options first, then command-line flags on top.
fn build_options(args: &OverrideArgs) -> Result<ParseOptions, Box<dyn std::error::Error>> {
    let mut options = match &args.options {
        Some(path) => ParseOptions::from_json(&fs::read_to_string(path)?)?,
        None => ParseOptions::default(),
    };

    if args.delimiter.is_some() {
        options.delimiter = args.delimiter;
    }
    if args.quote.is_some() {
        options.quote_character = args.quote;
    }
    if args.double_quote.is_some() {
        options.double_quote = args.double_quote;
    }
    if let Some(term) = &args.line_terminator {
        options.line_terminator = Some(unescape(term));
    }
    if args.skip_initial_space.is_some() {
        options.skip_initial_space = args.skip_initial_space;
    }
    if args.header.is_some() {
        options.header_mode = HeaderMode::from(args.header);
    }
    if args.start_with_row.is_some() {
        options.start_with_row = args.start_with_row;
    }
    if args.rows.is_some() {
        options.row_count_cap = args.rows;
    }
    if args.columns.is_some() {
        options.explicit_column_count = args.columns;
    }
    Ok(options)
}

fn build_importer(args: &OverrideArgs) -> Importer {
    match &args.encoding {
        Some(label) => Importer::new().encoding(label.clone()),
        None => Importer::new(),
    }
}

fn report(parsed: &ParsedFile, requested: &ParseOptions) {
    let Some(table) = parsed.tables.first() else {
        eprintln!("⚠️  No usable rows found");
        return;
    };

    if let Some(delimiter) = parsed.options.get("delimiter").and_then(|v| v.as_str()) {
        eprintln!(
            "   Delimiter: '{}'{}",
            printable(delimiter),
            if requested.delimiter.is_none() { " (auto-detected)" } else { "" }
        );
    }
    let header = parsed
        .options
        .get("include_column_names_as_headers")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    eprintln!(
        "   Header: {}{}",
        if header { "yes" } else { "no" },
        if requested.header_mode == HeaderMode::Auto { " (guessed)" } else { "" }
    );
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("{} [{}]", if c.name.is_empty() { "-" } else { c.name.as_str() }, c.guessed_type))
        .collect();
    eprintln!("   Columns: {}", columns.join(", "));

    if let Some(n) = parsed.options.get("truncated_rows").and_then(|v| v.as_u64()) {
        if n > 0 {
            eprintln!("⚠️  {} rows were wider than the sampled width and lost fields", n);
        }
    }
    eprintln!("✅ Imported {} rows", table.row_count());
}

/// Show control characters as escapes.
fn printable(s: &str) -> String {
    s.replace('\t', "\\t").replace('\r', "\\r").replace('\n', "\\n")
}

/// Undo [`printable`] for terminators typed on the command line.
fn unescape(s: &str) -> String {
    s.replace("\\r", "\r").replace("\\n", "\n").replace("\\t", "\t")
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
