//! CLI entry point for annograph.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use annograph_core::AnnographConfig;
use annograph_neo4j::GraphClient;
use annograph_query::{execute, QueryGuard};

use annograph_cli::commands::{self, BuildOutputs};

#[derive(Parser)]
#[command(name = "annograph")]
#[command(about = "Build, export, and query annotation property graphs")]
struct Cli {
    /// Config file prefix (default: annograph).
    #[arg(short, long, default_value = "annograph", global = true)]
    config: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest JSONL records, optionally merge synonyms, and export.
    Build {
        /// Input records, one JSON object per line.
        #[arg(short, long)]
        input: PathBuf,

        /// Run the synonym merge pass before exporting.
        #[arg(long)]
        merge: bool,

        /// Write the graph as JSONL here.
        #[arg(long)]
        jsonl: Option<PathBuf>,

        /// Write nodes.csv / edges.csv into this directory.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Split CSV output by property key set.
        #[arg(long, requires = "csv_dir")]
        partitioned: bool,
    },

    /// Compile a query graph (JSON on stdin) into Cypher.
    Compile,

    /// Check a query against the keyword guard and print the verdict.
    Guard {
        #[arg(short, long)]
        query: String,

        /// Override the configured result ceiling.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Guard and run a query against Neo4j.
    Query {
        #[arg(short, long)]
        query: String,
    },

    /// Render query templates from a JSON file.
    Template {
        #[arg(short, long)]
        file: PathBuf,

        #[arg(long, default_value = "{")]
        prefix: String,

        #[arg(long, default_value = "}")]
        suffix: String,

        /// Annotate text placeholders with their input type.
        #[arg(long)]
        annotated: bool,
    },

    /// Bulk-load a CSV export into Neo4j with APOC.
    Import {
        /// Node CSV, as the server resolves it (e.g. file:///nodes.csv).
        #[arg(long)]
        nodes: String,

        #[arg(long)]
        edges: String,

        /// Delete everything before importing.
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if cli.log_json {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let config = AnnographConfig::load(&cli.config)?;

    match cli.command {
        Command::Build {
            input,
            merge,
            jsonl,
            csv_dir,
            partitioned,
        } => {
            if jsonl.is_none() && csv_dir.is_none() {
                anyhow::bail!("Nothing to write: pass --jsonl and/or --csv-dir");
            }
            let outputs = BuildOutputs {
                merge,
                jsonl,
                csv_dir,
                partitioned,
            };
            let report = commands::build(&config, &input, &outputs)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Compile => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            println!("{}", commands::compile_query(&config, &input)?);
        }
        Command::Guard { query, limit } => {
            let verdict = commands::guard_query(&config, limit, &query);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        Command::Query { query } => {
            let client = GraphClient::connect(&config.neo4j).await?;
            let response = execute(&client, &QueryGuard::from_config(&config.query), &query).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !response.success {
                std::process::exit(1);
            }
        }
        Command::Template {
            file,
            prefix,
            suffix,
            annotated,
        } => {
            let rendered = commands::render_templates(&file, &prefix, &suffix, annotated)?;
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
        Command::Import { nodes, edges, clear } => {
            let client = GraphClient::connect(&config.neo4j).await?;
            if clear {
                client.clear_graph().await?;
            }
            client.import_csv(&nodes, &edges).await?;
        }
    }

    Ok(())
}
