//! Prints the statement a split reader would execute for one split.
//!
//! No cluster connection is made; the table layout comes from a JSON file.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use split_reader::{
    partitioner_from_class, CqlValue, JobConfig, KeyColumns, QueryComposer,
    StandardFilterGenerator, TableMetadata, TokenRange,
};

#[derive(Parser)]
#[command(name = "split_plan")]
#[command(about = "Show the query plan of a split reader", long_about = None)]
struct Args {
    /// Job configuration JSON file.
    #[arg(long)]
    config: PathBuf,
    /// Table metadata JSON file.
    #[arg(long)]
    metadata: PathBuf,
    /// Exclusive start token of the split.
    #[arg(long, allow_hyphen_values = true)]
    start: String,
    /// Inclusive end token of the split.
    #[arg(long, allow_hyphen_values = true)]
    end: String,
    /// Replica endpoint of the split; may be repeated.
    #[arg(long = "replica")]
    replicas: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "split_reader=info,warn".into()),
        )
        .init();

    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.config)
        .with_context(|| format!("read job config {}", args.config.display()))?;
    let config = JobConfig::from_json(&raw)?.apply_env_overrides();

    let raw = std::fs::read_to_string(&args.metadata)
        .with_context(|| format!("read table metadata {}", args.metadata.display()))?;
    let metadata: TableMetadata =
        serde_json::from_str(&raw).context("parse table metadata json")?;

    let partitioner = partitioner_from_class(&config.partitioner)?;
    let split = TokenRange::new(
        partitioner.parse_token(&args.start)?,
        partitioner.parse_token(&args.end)?,
        args.replicas,
    );
    let keys = KeyColumns::resolve(&metadata)?;
    let composer = QueryComposer::new(&config, &keys, &metadata, &StandardFilterGenerator);

    println!("partitioner: {}", partitioner.name());
    println!("split:       {split}");
    if !split.replicas.is_empty() {
        println!("replicas:    {}", split.replicas.join(", "));
    }

    let Some(statement) =
        composer.prepare_statement(&config, &keys, &split, partitioner.as_ref())?
    else {
        println!("no query: no in-values fall inside the split");
        return Ok(());
    };

    println!("query:       {}", statement.query);
    println!("fetch size:  {}", statement.fetch_size);
    for (idx, value) in statement.values.iter().enumerate() {
        println!("bind[{idx}]:     {value}");
    }
    if config.equals_in.is_some() {
        if let Some(CqlValue::List(retained)) = statement.values.get(1) {
            println!("in-values:   {} kept", retained.len());
        }
    }
    Ok(())
}
