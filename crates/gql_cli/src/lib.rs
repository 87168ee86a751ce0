//! Command-line interface for gql.
//!
//! # Usage
//!
//! ```bash
//! # Validate a query against a schema (SDL or introspection JSON)
//! gql validate schema.graphql query.graphql
//!
//! # Execute a query against an endpoint
//! gql execute --url http://localhost:4000/graphql --variables '{"id": "1"}' query.graphql
//!
//! # Print the introspection result of an endpoint
//! gql introspect --url http://localhost:4000/graphql
//! ```

use clap::{Parser, Subcommand};
use colored::Colorize;
use gql_client::{Client, HttpTransport, HttpTransportConfig, Request};
use gql_core::{Diagnostic, LineIndex};
use gql_runtime::{build_ast_schema, build_client_schema, Schema, SchemaError};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "gql")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log requests and schema loading
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print results and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a document against a schema
    Validate {
        /// Schema file: SDL, or introspection JSON when it ends in `.json`
        schema: PathBuf,

        /// Document to validate
        query: PathBuf,
    },

    /// Execute a document against a GraphQL endpoint
    Execute {
        /// Endpoint URL
        #[arg(long)]
        url: String,

        /// Validate against this schema instead of the endpoint's
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Variables as a JSON object
        #[arg(long)]
        variables: Option<String>,

        /// Operation to run when the document has several
        #[arg(long)]
        operation: Option<String>,

        /// Extra header, as `name:value`
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Attempts before giving up
        #[arg(long, default_value = "0")]
        retries: u32,

        /// Timeout per request phase, in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Document to execute
        query: PathBuf,
    },

    /// Print the introspection result of a GraphQL endpoint
    Introspect {
        /// Endpoint URL
        #[arg(long)]
        url: String,

        /// Extra header, as `name:value`
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },

    /// Print version information
    Version,
}

impl Cli {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "gql=debug"
        } else if self.quiet {
            "gql=warn"
        } else {
            "gql=info"
        }
    }
}

pub async fn run(cli: Cli) -> Result<i32, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Validate { schema, query } => validate_file(&schema, &query, cli.quiet),
        Commands::Execute {
            url,
            schema,
            variables,
            operation,
            headers,
            retries,
            timeout,
            query,
        } => {
            let transport = transport(&url, headers, Duration::from_secs(timeout))?;
            let mut builder = Client::builder().transport(transport).retries(retries);
            builder = match schema {
                Some(path) => builder.schema(load_schema(&path)?),
                None => builder.fetch_schema_from_transport(true),
            };
            let client = builder.build().await?;

            let mut request = Request::new(std::fs::read_to_string(&query)?);
            if let Some(variables) = variables {
                request = request.variables(parse_variables(&variables)?);
            }
            if let Some(operation) = operation {
                request = request.operation_name(operation);
            }
            debug!(query = %query.display(), "executing document");

            let data = client.execute_request(request).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(0)
        }
        Commands::Introspect { url, headers } => {
            let transport = transport(&url, headers, Duration::from_secs(30))?;
            let client = Client::builder()
                .transport(transport)
                .fetch_schema_from_transport(true)
                .build()
                .await?;
            let introspection = client.introspection().unwrap_or(Value::Null);
            println!("{}", serde_json::to_string_pretty(&introspection)?);
            Ok(0)
        }
        Commands::Version => {
            println!("gql {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

fn transport(
    url: &str,
    headers: Vec<(String, String)>,
    timeout: Duration,
) -> Result<HttpTransport, Box<dyn std::error::Error>> {
    let config = headers.into_iter().fold(
        HttpTransportConfig::new(url).timeout(timeout),
        |config, (name, value)| config.header(name, value),
    );
    Ok(HttpTransport::with_config(config)?)
}

fn validate_file(schema: &Path, query: &Path, quiet: bool) -> Result<i32, Box<dyn std::error::Error>> {
    let schema = load_schema(schema)?;
    let source = std::fs::read_to_string(query)?;

    let reports = check_document(&schema, &source);
    if reports.is_empty() {
        if !quiet {
            println!("{} {} is valid", "Success:".green().bold(), query.display());
        }
        return Ok(0);
    }

    eprintln!("{} {}", "Error".red().bold(), query.display());
    for report in &reports {
        eprintln!("{report}");
    }
    Ok(1)
}

/// Parses and validates `source`, returning one rendered report per problem.
pub fn check_document(schema: &Schema, source: &str) -> Vec<String> {
    let document = match gql_syntax::parse(source).into_result() {
        Ok(document) => document,
        Err(diagnostics) => return diagnostics.iter().map(|d| d.render(source)).collect(),
    };

    let line_index = LineIndex::new(source);
    gql_runtime::validate(schema, &document)
        .into_iter()
        .map(|error| {
            let location = line_index.location(error.span.start);
            Diagnostic::error("validation", error.message)
                .with_span(error.span, format!("line {}, column {}", location.line, location.column))
                .render(source)
        })
        .collect()
}

/// Loads a schema from SDL, or from introspection JSON for `.json` files.
pub fn load_schema(path: &Path) -> Result<Schema, Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let is_json = path.extension().is_some_and(|ext| ext == "json");

    let schema = if is_json {
        build_client_schema(&serde_json::from_str(&source)?)
    } else {
        build_ast_schema(&source)
    };
    match schema {
        Ok(schema) => {
            debug!(path = %path.display(), types = schema.types.len(), "loaded schema");
            Ok(schema)
        }
        Err(SchemaError::Parse(diagnostics)) => {
            for diagnostic in &diagnostics {
                eprintln!("{}", diagnostic.render(&source));
            }
            Err(format!("{} has syntax errors", path.display()).into())
        }
        Err(err) => Err(err.into()),
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected `name:value`, got `{raw}`")),
    }
}

fn parse_variables(raw: &str) -> Result<Map<String, Value>, Box<dyn std::error::Error>> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(variables) => Ok(variables),
        other => Err(format!("variables must be a JSON object, got {other}").into()),
    }
}
