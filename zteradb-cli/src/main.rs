//! zteradb-cli - Command-line interface for ZTeraDB
//!
//! One-shot commands for checking liveness and running SELECT queries.

use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use zteradb_client::{ClientConfig, Pool};
use zteradb_query::Query;

#[derive(Parser)]
#[command(name = "zteradb-cli")]
#[command(about = "Command-line interface for ZTeraDB")]
#[command(version)]
struct Cli {
    /// Server host
    #[arg(long, default_value = "127.0.0.1", env = "ZTERADB_HOST")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = 7600, env = "ZTERADB_PORT")]
    port: u16,

    /// Path to YAML configuration file (falls back to ZTERADB_* variables)
    #[arg(short, long, env = "ZTERADB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server liveness
    Ping,

    /// Run a SELECT against a schema and print rows as JSON lines
    Query {
        /// Schema name
        schema: String,

        /// Equality filters as key=value pairs (repeatable)
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Row range as `start end` (half-open)
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        limit: Option<Vec<i64>>,

        /// Ask for a row count instead of rows
        #[arg(long)]
        count: bool,

        /// Environment override (dev, staging, qa, prod)
        #[arg(long)]
        env: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::load()?,
    };

    let pool = Pool::connect(cli.host, cli.port, config).await?;

    let result = match cli.command {
        Commands::Ping => ping(&pool).await,
        Commands::Query {
            schema,
            filters,
            limit,
            count,
            env,
        } => query(&pool, schema, filters, limit, count, env).await,
    };

    pool.close().await;
    result
}

async fn ping(pool: &Pool) -> Result<(), Box<dyn std::error::Error>> {
    pool.ping().await?;
    println!("{}", "PONG".green());
    Ok(())
}

async fn query(
    pool: &Pool,
    schema: String,
    filters: Vec<String>,
    limit: Option<Vec<i64>>,
    count: bool,
    env: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut query = Query::new(schema).select();

    if !filters.is_empty() {
        let mut map = Map::new();
        for pair in &filters {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("filter {pair:?} is not of the form key=value"))?;
            // Bare numbers and booleans filter as themselves, anything else
            // as a string.
            let value = value
                .parse::<Value>()
                .unwrap_or_else(|_| Value::String(value.to_string()));
            map.insert(key.to_string(), value);
        }
        query = query.filter(map)?;
    }

    if let Some(range) = limit {
        query = query.limit(range[0], range[1])?;
    }
    if count {
        query = query.count();
    }
    if let Some(env) = env {
        query = query.set_env(env.parse()?);
    }

    let mut rows = pool.run(&query).await?;
    let mut total = 0usize;
    while let Some(row) = rows.next().await {
        println!("{}", serde_json::to_string(&row?)?);
        total += 1;
    }
    eprintln!("{}", format!("{total} row(s)").dimmed());

    Ok(())
}
