//! OData URI command-line interface

mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use odata_uri::{CsdlModel, EdmModel, ODataUriParser, ParserSettings, UrlConventions};
use odata_uri_diagnostics::{ODU0023, ODU0024};
use std::path::{Path, PathBuf};

/// OData URI command-line tool
#[derive(Parser)]
#[command(name = "odata")]
#[command(author, version, about = "Parse and bind OData request URIs against a CSDL model", long_about = None)]
struct Cli {
    /// Log parser and binder decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the bound tree as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a full request URI
    Uri {
        /// CSDL model file (.json or .xml)
        #[arg(short, long)]
        model: PathBuf,
        /// Service root the request is relative to
        #[arg(short, long)]
        root: String,
        /// Accept and write keys as path segments (`Customers/1`)
        #[arg(long)]
        key_as_segment: bool,
        /// Request URI, absolute or relative to the root
        uri: String,
    },
    /// Parse a `$filter` expression over an entity set
    Filter {
        /// CSDL model file (.json or .xml)
        #[arg(short, long)]
        model: PathBuf,
        /// Entity set whose elements the filter tests
        #[arg(short, long)]
        set: String,
        /// Filter expression
        text: String,
    },
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    if let Err(error) = run(cli) {
        eprintln!("{}", output::format_error(&error));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Uri {
            model,
            root,
            key_as_segment,
            uri,
        } => {
            let model = load_model(&model)?;
            let conventions = if key_as_segment {
                UrlConventions::KeyAsSegment
            } else {
                UrlConventions::Parentheses
            };
            let parser = ODataUriParser::new(&model, &root)
                .with_context(|| format!("Invalid service root '{root}'"))?
                .with_settings(ParserSettings::default().with_url_conventions(conventions));
            match parser.parse_uri(&uri) {
                Ok(parsed) => output::print_uri(&parsed, cli.json),
                Err(error) => {
                    // spans of query option errors are relative to the option value
                    let mut diagnostic = error.to_diagnostic();
                    if ![ODU0023, ODU0024].contains(&error.code()) {
                        diagnostic.span = None;
                    }
                    bail!("{}", diagnostic.render(&uri).trim_end());
                }
            }
        }
        Commands::Filter { model, set, text } => {
            let model = load_model(&model)?;
            let entity_set = model
                .find_entity_set(&set)
                .with_context(|| format!("Entity set '{set}' is not in the model"))?;
            let parser = ODataUriParser::new(&model, "http://localhost/")?;
            match parser.parse_filter(&text, &entity_set.entity_type, Some(&set)) {
                Ok(filter) => output::print_filter(&filter, cli.json),
                Err(error) => bail!("{}", error.to_diagnostic().render(&text).trim_end()),
            }
        }
    }
}

fn load_model(path: &Path) -> Result<CsdlModel> {
    let model = CsdlModel::from_file(path).with_context(|| format!("Failed to load model from {}", path.display()))?;
    log::debug!("loaded model namespace {} from {}", model.namespace(), path.display());
    Ok(model)
}
