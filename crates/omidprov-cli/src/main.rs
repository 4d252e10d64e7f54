//! omidprov CLI
//!
//! Command-line interface for:
//! - Locating an entity's provenance container in a sharded dump
//! - Fetching provenance records (optionally with digests)
//! - Querying and exporting the assembled provenance graphs
//! - Showing an entity's snapshot history

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;
use omidprov_graph::{build_graph, GraphStore, Namespaces, QueryResults, RdfFormat, Term};
use omidprov_locator::{BucketBoundary, Locator, LocatorConfig, ProvenanceRecord};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "omidprov")]
#[command(
    author,
    version,
    about = "Locate and query OMID provenance records in sharded RDF dumps"
)]
struct Cli {
    /// Dataset root (the extracted dump directory)
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Locator configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Treat bucket bounds as exclusive (`n < bound`)
    #[arg(long, global = true)]
    exclusive: bool,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the provenance container path for an entity IRI.
    Locate { iri: String },

    /// Print the provenance record of one or more entities.
    Fetch {
        #[arg(required = true)]
        iris: Vec<String>,
        /// Print `sha256:` digests instead of the records
        #[arg(long)]
        digest: bool,
    },

    /// Run a pattern query over provenance graphs.
    ///
    /// The graphs come from the entities given with `--iri`, or from a TriG /
    /// N-Quads file given with `--input`.
    Query {
        query: String,
        #[arg(long = "iri")]
        iris: Vec<String>,
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Export the provenance graphs of entities as TriG or N-Quads.
    Export {
        #[arg(required = true)]
        iris: Vec<String>,
        #[arg(long, default_value = "trig")]
        format: RdfFormat,
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show the snapshot history of an entity.
    History { iri: String },
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let locator = open_locator(&cli)?;
    match &cli.command {
        Commands::Locate { iri } => cmd_locate(&locator, iri, cli.json),
        Commands::Fetch { iris, digest } => cmd_fetch(&locator, iris, *digest, cli.json),
        Commands::Query { query, iris, input } => {
            cmd_query(&locator, query, iris, input.as_deref(), cli.json)
        }
        Commands::Export { iris, format, out } => {
            cmd_export(&locator, iris, *format, out.as_deref())
        }
        Commands::History { iri } => cmd_history(&locator, iri, cli.json),
    }
}

fn open_locator(cli: &Cli) -> Result<Locator> {
    let mut config = match &cli.config {
        Some(path) => LocatorConfig::from_json_file(path)
            .with_context(|| format!("loading locator config {}", path.display()))?,
        None => LocatorConfig::default(),
    };
    if cli.exclusive {
        config.boundary = BucketBoundary::Exclusive;
    }
    Ok(Locator::with_config(&cli.root, config))
}

fn fetch_all(locator: &Locator, iris: &[String]) -> Result<Vec<ProvenanceRecord>> {
    tracing::info!(entities = iris.len(), root = %locator.root().display(), "fetching provenance");
    iris.iter()
        .zip(locator.fetch_many(iris))
        .map(|(iri, result)| result.with_context(|| format!("fetching provenance of {iri}")))
        .collect()
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_locate(locator: &Locator, iri: &str, json: bool) -> Result<()> {
    let omid = locator.decompose(iri)?;
    let leaf = locator
        .locate(iri)
        .with_context(|| format!("locating {iri}"))?;
    let container = omidprov_locator::container::container_path(&leaf, locator.config());

    if json {
        let out = serde_json::json!({
            "iri": iri,
            "prefix": omid.prefix,
            "sequential": omid.sequential,
            "leaf": leaf,
            "container": container,
            "container_exists": container.is_file(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} {}", "omid".green().bold(), omid);
    println!("{} {}", "leaf".green().bold(), leaf.display());
    if container.is_file() {
        println!("{} {}", "container".green().bold(), container.display());
    } else {
        println!(
            "{} {} {}",
            "container".yellow().bold(),
            container.display(),
            "(missing)".yellow()
        );
    }
    Ok(())
}

fn cmd_fetch(locator: &Locator, iris: &[String], digest: bool, json: bool) -> Result<()> {
    let records = fetch_all(locator, iris)?;

    if digest {
        if json {
            let out: Vec<_> = iris
                .iter()
                .zip(&records)
                .map(|(iri, r)| serde_json::json!({ "iri": iri, "digest": r.digest() }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else {
            for (iri, record) in iris.iter().zip(&records) {
                println!("{}  {}", record.digest(), iri);
            }
        }
        return Ok(());
    }

    match records.as_slice() {
        [single] => println!("{}", serde_json::to_string_pretty(single)?),
        many => println!("{}", serde_json::to_string_pretty(many)?),
    }
    Ok(())
}

fn load_store(locator: &Locator, iris: &[String], input: Option<&Path>) -> Result<GraphStore> {
    if input.is_none() && iris.is_empty() {
        bail!("nothing to query: pass --iri <IRI> and/or --input <FILE>");
    }
    let mut store = GraphStore::new(Namespaces::opencitations());
    if let Some(path) = input {
        let loaded = GraphStore::load_rdf_file(path, Namespaces::opencitations())
            .with_context(|| format!("loading {}", path.display()))?;
        store.extend_from(&loaded);
    }
    if !iris.is_empty() {
        let records = fetch_all(locator, iris)?;
        store.extend_from(&build_graph(&records).context("assembling provenance graph")?);
    }
    Ok(store)
}

fn render_cell(term: Option<&Term>) -> String {
    term.map(Term::to_string).unwrap_or_default()
}

fn print_results(results: &QueryResults, json: bool) -> Result<()> {
    if json {
        let rows: Vec<serde_json::Map<String, serde_json::Value>> = results
            .rows
            .iter()
            .map(|row| {
                results
                    .variables
                    .iter()
                    .zip(row)
                    .filter_map(|(var, term)| {
                        term.as_ref()
                            .map(|t| (var.clone(), serde_json::Value::String(t.to_string())))
                    })
                    .collect()
            })
            .collect();
        let out = serde_json::json!({ "variables": results.variables, "rows": rows });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let header: Vec<String> = results.variables.iter().map(|v| format!("?{v}")).collect();
    println!("{}", header.join("\t").bold());
    for row in &results.rows {
        let cells: Vec<String> = row.iter().map(|t| render_cell(t.as_ref())).collect();
        println!("{}", cells.join("\t"));
    }
    eprintln!("{} {} row(s)", "ok".green().bold(), results.len());
    Ok(())
}

fn cmd_query(
    locator: &Locator,
    query: &str,
    iris: &[String],
    input: Option<&Path>,
    json: bool,
) -> Result<()> {
    let store = load_store(locator, iris, input)?;
    tracing::info!(graphs = store.graph_count(), triples = store.len(), "running query");
    let results = store.query(query).context("running query")?;
    print_results(&results, json)
}

fn cmd_export(
    locator: &Locator,
    iris: &[String],
    format: RdfFormat,
    out: Option<&Path>,
) -> Result<()> {
    let records = fetch_all(locator, iris)?;
    let store = build_graph(&records).context("assembling provenance graph")?;
    let text = store.serialize(format);
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            eprintln!(
                "{} {} ({}, {} quads)",
                "wrote".green().bold(),
                path.display().to_string().bold(),
                format.name(),
                store.quad_count()
            );
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn cmd_history(locator: &Locator, iri: &str, json: bool) -> Result<()> {
    let record = locator
        .fetch_provenance(iri)
        .with_context(|| format!("fetching provenance of {iri}"))?;
    let store = build_graph([&record]).context("assembling provenance graph")?;
    let history = omidprov_graph::snapshots(&store, iri);

    if json {
        println!("{}", serde_json::to_string_pretty(&history)?);
        return Ok(());
    }
    if history.is_empty() {
        println!("{} no snapshots for {iri}", "note:".yellow().bold());
        return Ok(());
    }
    for snap in &history {
        let label = snap
            .number()
            .map_or_else(|| snap.iri.clone(), |n| format!("se/{n}"));
        let generated = snap
            .generated_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "?".to_string());
        let status = if snap.is_current() {
            "current".green().bold()
        } else {
            "superseded".dimmed()
        };
        println!("{} {} [{}]", label.bold(), generated, status);
        if let Some(description) = &snap.description {
            println!("    {description}");
        }
        for source in &snap.primary_sources {
            println!("    source: {source}");
        }
        for agent in &snap.attributed_to {
            println!("    agent:  {agent}");
        }
    }
    Ok(())
}
