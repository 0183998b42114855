// fhirlens CLI
//
// Command-line interface for evaluating path expressions against FHIR resources.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use fhirlens_core::loader::{Loader, LoaderOptions};
use fhirlens_core::parser::parse_str;
use fhirlens_core::{Collection, Schema};
use log::{debug, LevelFilter};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fhirlens")]
#[command(about = "Evaluate path expressions against FHIR JSON resources", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression against a FHIR resource
    Eval {
        /// Path expression to evaluate
        expression: String,

        /// Path to FHIR resource JSON file
        #[arg(short, long)]
        resource: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,

        /// Extra type definitions (JSON array) merged into the bundled schema
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Fail on JSON properties the schema does not declare
        #[arg(long)]
        strict: bool,
    },

    /// Validate an expression's syntax without evaluating it
    Validate {
        /// Path expression to validate
        expression: String,

        /// Extra type definitions (JSON array) merged into the bundled schema
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Rendered collection, e.g. `[IntegerType[3]]`
    Pretty,
    /// JSON array
    Json,
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(error) = run(cli.command) {
        eprintln!("{} {:#}", "Error:".red().bold(), error);
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Eval {
            expression,
            resource,
            format,
            schema,
            strict,
        } => {
            let schema = load_schema(schema.as_deref())?;

            // Parse first so a bad expression never reads the resource
            let parsed = parse_str(&expression, &schema)?;
            debug!("Parsed '{}' into {} step(s)", expression, parsed.len());

            let resource_content = fs::read_to_string(&resource).with_context(|| {
                format!("Failed to read resource file: {}", resource.display())
            })?;

            let tree = Loader::new(&schema)
                .with_options(LoaderOptions { strict })
                .load_str(&resource_content)
                .with_context(|| format!("Failed to load resource: {}", resource.display()))?;

            let result = parsed.evaluate(&tree)?;
            print_result(&expression, &resource, &result, format)
        }
        Commands::Validate { expression, schema } => {
            let schema = load_schema(schema.as_deref())?;
            println!("{} {}", "Validating:".green().bold(), expression);

            let parsed = parse_str(&expression, &schema)?;
            println!(
                "{} Valid expression ({} step(s))",
                "Result:".green().bold(),
                parsed.len()
            );
            Ok(())
        }
    }
}

/// Bundled schema, extended with definitions from `path` if given
fn load_schema(path: Option<&Path>) -> Result<Schema> {
    let mut schema = Schema::r4();
    if let Some(path) = path {
        let definitions = fs::read_to_string(path)
            .with_context(|| format!("Failed to read schema file: {}", path.display()))?;
        schema
            .extend_from_json(&definitions)
            .with_context(|| format!("Invalid schema file: {}", path.display()))?;
        debug!("Schema extended from {}", path.display());
    }
    Ok(schema)
}

fn print_result(
    expression: &str,
    resource: &Path,
    result: &Collection<'_>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result.to_json())
                .context("Failed to format result as JSON")?;
            println!("{}", json);
        }
        OutputFormat::Pretty => {
            println!("{} {}", "Expression:".green().bold(), expression);
            println!("{} {}", "Resource:".green().bold(), resource.display());
            println!("{} {}", "Result:".green().bold(), result);
        }
    }
    Ok(())
}
