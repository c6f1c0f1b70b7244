use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use datawise::config::Settings;
use datawise::models::{QueryRequest, QueryResponse};
use datawise::DataWisePipeline;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "datawise")]
#[command(about = "Ask questions about your data, get safe read-only SQL and answers")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Answer one or more questions with a shared cache and history
    Ask {
        /// Questions in natural language; repeated questions hit the cache
        #[arg(required = true)]
        questions: Vec<String>,

        /// Equality filter applied to every question (key=value, repeatable)
        #[arg(short, long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, Value)>,

        /// Row limit (capped by MAX_QUERY_LIMIT)
        #[arg(short, long)]
        limit: Option<u64>,

        /// Print full responses as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the schema the compiler works against
    Schema {
        /// Reload from the database instead of using the memoized snapshot
        #[arg(long)]
        refresh: bool,
    },
}

/// `key=value`; the value is read as JSON when it parses, else as a string.
fn parse_filter(raw: &str) -> std::result::Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty filter name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();
    let settings = Settings::from_env().context("failed to load settings")?;
    let pipeline = DataWisePipeline::from_settings(&settings)?;

    match args.command {
        Command::Ask {
            questions,
            filters,
            limit,
            json,
        } => {
            let mut failed = 0;
            for question in questions {
                let mut request = QueryRequest::new(question.clone());
                request.filters.extend(filters.iter().cloned());
                request.limit = limit;

                match pipeline.run(&request).await {
                    Ok(response) if json => println!("{}", serde_json::to_string_pretty(&response)?),
                    Ok(response) => print_response(&question, &response),
                    Err(e) => {
                        failed += 1;
                        eprintln!("error: {}: {}", question, e);
                    }
                }
            }

            if !json {
                println!("\n=== History ===");
                for item in pipeline.history().list() {
                    println!(
                        "{}  {} rows  {}  [{}]",
                        item.executed_at.format("%H:%M:%S"),
                        item.rowcount,
                        item.question,
                        item.warnings.join(", ")
                    );
                }
            }
            info!(stats = ?pipeline.stats(), "Done");

            if failed > 0 {
                bail!("{} question(s) failed", failed);
            }
        }
        Command::Schema { refresh } => {
            let snapshot = if refresh {
                pipeline.schema().refresh().await?
            } else {
                pipeline.schema().load().await?
            };
            println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        }
    }

    Ok(())
}

fn print_response(question: &str, response: &QueryResponse) {
    println!("\n=== {} ===", question);
    println!("SQL: {}", response.sql);
    if !response.parameters.is_empty() {
        println!("Parameters: {}", serde_json::to_string(&response.parameters).unwrap_or_default());
    }
    println!("Explanation: {}", response.explanation);
    println!(
        "Confidence: {:.2}{}{}",
        response.confidence,
        if response.cached { "  (cached)" } else { "" },
        if response.simulated { "  (simulated)" } else { "" }
    );

    println!("{}", response.result.columns.join(" | "));
    for row in &response.result.rows {
        let cells: Vec<String> = row
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        println!("{}", cells.join(" | "));
    }

    for finding in &response.data_quality {
        println!("! {}", finding.message);
    }
    for insight in &response.insights {
        println!("* {}: {}", insight.title, insight.detail);
    }
}
