//! Contract Compliance CLI
//!
//! Command-line host for checking a captured response against a JSON Schema
//! or a Swagger contract.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use contract_compliance::{
    endpoint_path, navigate_fragment, resolve, ComplianceError, ContractAssertion, ContractCache,
    Exchange, HttpMethod, JsonSchemaAssertion, PropertyExpander, ResolvedSchema,
};

#[derive(Parser)]
#[command(name = "contract-compliance")]
#[command(about = "Check HTTP responses against JSON Schemas and Swagger contracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a response body against a JSON Schema
    Schema {
        /// Schema source: file path, URL (http:// or https://), inline JSON, or - for none
        schema: String,

        /// File holding the response body
        body: PathBuf,

        /// Response status code (0 means no response was received)
        #[arg(long, default_value_t = 200)]
        status: u16,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Validate a response body against the schema a Swagger contract declares
    Contract {
        /// Contract source: file path, URL (http:// or https://), inline JSON, or - for none
        contract: String,

        /// File holding the response body
        body: PathBuf,

        #[command(flatten)]
        request: RequestArgs,

        /// Response status code (0 means no response was received)
        #[arg(long, default_value_t = 200)]
        status: u16,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Show which route and schema a contract assigns to an exchange
    Resolve {
        /// Contract source: file path, URL (http:// or https://), or inline JSON
        contract: String,

        #[command(flatten)]
        request: RequestArgs,

        /// Response status code
        #[arg(long, default_value_t = 200)]
        status: u16,

        /// Property for ${name} expansion in the source (name=value)
        #[arg(long = "set", value_parser = parse_property)]
        properties: Vec<(String, String)>,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Request path (e.g. /v1/pets/42)
    #[arg(long, required_unless_present = "endpoint", conflicts_with = "endpoint")]
    path: Option<String>,

    /// Full request URL; its path is used
    #[arg(long)]
    endpoint: Option<String>,

    /// Request method, upper case (GET, POST, ...)
    #[arg(long, short, default_value = "GET")]
    method: HttpMethod,
}

impl RequestArgs {
    fn request_path(&self) -> String {
        match (&self.path, &self.endpoint) {
            (Some(path), _) => path.clone(),
            (None, Some(endpoint)) => endpoint_path(endpoint).to_string(),
            (None, None) => String::new(),
        }
    }
}

#[derive(Args)]
struct CommonArgs {
    /// Property for ${name} expansion in the source (name=value)
    #[arg(long = "set", value_parser = parse_property)]
    properties: Vec<(String, String)>,

    /// Output results as JSON (for automation)
    #[arg(long)]
    json: bool,
}

fn parse_property(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got \"{}\"", s))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Schema {
            schema,
            body,
            status,
            common,
        } => run_schema(&schema, &body, status, common),

        Commands::Contract {
            contract,
            body,
            request,
            status,
            common,
        } => run_contract(&contract, &body, &request, status, common),

        Commands::Resolve {
            contract,
            request,
            status,
            properties,
        } => run_resolve(&contract, &request, status, properties),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// `-` stands for "no source configured".
fn configured(source: &str) -> Option<String> {
    (source != "-").then(|| source.to_string())
}

fn read_body(path: &Path, json_output: bool) -> Result<String, u8> {
    std::fs::read_to_string(path).map_err(|e| {
        report_error(json_output, &format!("reading {}: {}", path.display(), e));
        3u8
    })
}

fn run_schema(schema: &str, body: &Path, status: u16, common: CommonArgs) -> Result<(), u8> {
    let body = read_body(body, common.json)?;
    let exchange = Exchange {
        method: HttpMethod::Get,
        path: None,
        status_code: Some(status),
        body: Some(body),
    };
    let expander: HashMap<String, String> = common.properties.into_iter().collect();

    let assertion = JsonSchemaAssertion::new(configured(schema));
    report(assertion.assert_response(&exchange, &expander), common.json)
}

fn run_contract(
    contract: &str,
    body: &Path,
    request: &RequestArgs,
    status: u16,
    common: CommonArgs,
) -> Result<(), u8> {
    let body = read_body(body, common.json)?;
    let exchange = Exchange::new(request.method, request.request_path()).with_response(status, body);
    let expander: HashMap<String, String> = common.properties.into_iter().collect();

    let assertion = ContractAssertion::new(configured(contract));
    report(assertion.assert_response(&exchange, &expander), common.json)
}

fn run_resolve(
    contract: &str,
    request: &RequestArgs,
    status: u16,
    properties: Vec<(String, String)>,
) -> Result<(), u8> {
    let expander: HashMap<String, String> = properties.into_iter().collect();
    let cache = ContractCache::new();

    let entry = cache.get(&expander.expand(contract)).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let resolution = resolve(
        entry.contract(),
        &request.request_path(),
        request.method,
        status,
    )
    .map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    println!("Route: {}", resolution.template);
    match resolution.schema {
        ResolvedSchema::None => println!("Schema: none"),
        ResolvedSchema::Inline(text) => println!("Schema: inline\n{}", text),
        ResolvedSchema::WholeDocument { model } => {
            println!("Schema: whole contract document (model {})", model);
            let pointer = format!("#/definitions/{}", model);
            if let Some(fragment) = navigate_fragment(entry.contract().document(), &pointer) {
                let text = serde_json::to_string_pretty(fragment).map_err(|e| {
                    eprintln!("Error serializing output: {}", e);
                    2u8
                })?;
                println!("{}", text);
            }
        }
        ResolvedSchema::UnknownModel(model) => {
            println!("Schema: unknown model {} (not validated)", model)
        }
    }
    Ok(())
}

fn report(result: Result<String, ComplianceError>, json_output: bool) -> Result<(), u8> {
    match result {
        Ok(message) => {
            if json_output {
                println!("{}", serde_json::json!({ "valid": true, "message": message }));
            } else {
                println!("{}", message);
            }
            Ok(())
        }
        Err(ComplianceError::Conformance { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
