//! JSON:API Encoder CLI
//!
//! Command-line interface for encoding dataset files as JSON:API documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use jsonapi_encoder::{Dataset, Encoder, EncoderOptions, EncodingParameters, PrimaryData};
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jsonapi-encode")]
#[command(about = "Encode resource graphs as JSON:API documents")]
#[command(version)]
struct Cli {
    /// Log to stderr (repeat for more detail)
    #[arg(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode resources of a dataset file
    Encode {
        /// Dataset file with schemas and resources
        #[arg(long)]
        dataset: PathBuf,

        /// Wire type of the primary data (all resources if omitted)
        #[arg(long = "type", value_name = "TYPE")]
        resource_type: Option<String>,

        /// Encode the single resource with this id
        #[arg(long, requires = "resource_type")]
        id: Option<String>,

        /// Include paths, comma-separated (e.g. comments.author)
        #[arg(long, value_delimiter = ',')]
        include: Vec<String>,

        /// Sparse field set as TYPE=FIELD,FIELD (repeatable)
        #[arg(long, value_parser = parse_field_set)]
        fields: Vec<(String, Vec<String>)>,

        /// Prefix for relative links
        #[arg(long, default_value = "")]
        url_prefix: String,

        /// Add a jsonapi object with this version
        #[arg(long)]
        jsonapi_version: Option<String>,

        /// Render primary data as resource identifiers only
        #[arg(long)]
        identifiers: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Load a dataset and check that every schema can be built
    Check {
        /// Dataset file with schemas and resources
        #[arg(long)]
        dataset: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Encode {
            dataset,
            resource_type,
            id,
            include,
            fields,
            url_prefix,
            jsonapi_version,
            identifiers,
            output,
            pretty,
        } => run_encode(EncodeArgs {
            dataset,
            resource_type,
            id,
            include,
            fields,
            url_prefix,
            jsonapi_version,
            identifiers,
            output,
            pretty,
        }),

        Commands::Check { dataset } => run_check(&dataset),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// `-v` flags set the level; without them `RUST_LOG` applies, else warnings.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => None,
        1 => Some(Level::INFO),
        2 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    };
    let filter = match level {
        Some(level) => EnvFilter::from_default_env().add_directive(level.into()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse `people=firstName,lastName` into a wire type and its fields.
fn parse_field_set(s: &str) -> Result<(String, Vec<String>), String> {
    let (wire_type, fields) = s
        .split_once('=')
        .ok_or_else(|| format!("expected TYPE=FIELD,FIELD, got '{}'", s))?;
    if wire_type.is_empty() {
        return Err(format!("missing type in '{}'", s));
    }
    let fields = fields
        .split(',')
        .filter(|field| !field.is_empty())
        .map(str::to_string)
        .collect();
    Ok((wire_type.to_string(), fields))
}

struct EncodeArgs {
    dataset: PathBuf,
    resource_type: Option<String>,
    id: Option<String>,
    include: Vec<String>,
    fields: Vec<(String, Vec<String>)>,
    url_prefix: String,
    jsonapi_version: Option<String>,
    identifiers: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_encode(args: EncodeArgs) -> Result<(), u8> {
    let dataset = load_dataset(&args.dataset)?;

    let data = match (&args.resource_type, &args.id) {
        (None, _) => PrimaryData::Many(dataset.records()),
        (Some(wire_type), id) => {
            if !dataset.types().any(|t| t == wire_type.as_str()) {
                eprintln!("Error: unknown type '{}'", wire_type);
                return Err(2);
            }
            match id {
                None => PrimaryData::Many(dataset.records_of(wire_type)),
                Some(id) => match dataset.find(wire_type, id) {
                    Some(resource) => PrimaryData::One(resource),
                    None => {
                        eprintln!("Error: resource '{}' of type '{}' not found", id, wire_type);
                        return Err(1);
                    }
                },
            }
        }
    };

    let mut parameters = EncodingParameters::new();
    for path in &args.include {
        parameters = parameters.include(path);
    }
    for (wire_type, fields) in args.fields {
        parameters = parameters.fields(wire_type, fields);
    }

    let mut options = EncoderOptions::new().url_prefix(args.url_prefix);
    if let Some(version) = args.jsonapi_version {
        options = options.jsonapi_version(version);
    }

    let encoder = Encoder::new(dataset.registry())
        .with_options(options)
        .with_parameters(parameters);
    let encoded = if args.identifiers {
        encoder.encode_identifiers(data)
    } else {
        encoder.encode_data(data)
    };
    let document = encoded.map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let json_output = if args.pretty {
        serde_json::to_string_pretty(&document)
    } else {
        serde_json::to_string(&document)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match args.output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}

fn run_check(path: &Path) -> Result<(), u8> {
    let dataset = load_dataset(path)?;

    dataset.registry().warm().map_err(|e| {
        eprintln!("Error: {}", e);
        2u8
    })?;

    println!("{}: OK", path.display());
    for wire_type in dataset.types() {
        println!("  {}: {} resources", wire_type, dataset.records_of(wire_type).len());
    }
    println!(
        "{} schemas, {} resources",
        dataset.registry().len(),
        dataset.len()
    );
    Ok(())
}

fn load_dataset(path: &Path) -> Result<Dataset, u8> {
    Dataset::load(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}
