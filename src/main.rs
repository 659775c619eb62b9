use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use wildgram::analysis::{collapse, expand, Tokenizer};
use wildgram::config::{get_config_path, PresearchConfig};
use wildgram::presearch::{Document, Monitor, Presearcher, QueryId};
use wildgram::query::parse_query;

#[derive(Parser)]
#[command(name = "wildgram")]
#[command(about = "Wildcard-aware presearcher for stored queries")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to config.json in the app data directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the terms a query is indexed under
    Extract {
        /// Query string
        query: String,

        /// Field for clauses without a `field:` prefix
        #[arg(short, long, default_value = "body")]
        field: String,

        /// Print JSON instead of one term per line
        #[arg(long)]
        json: bool,
    },
    /// Show the n-gram tokens generated for some text
    Expand {
        /// Text to expand (read from stdin when omitted)
        text: Option<String>,

        /// Field name attached to the tokens
        #[arg(short, long, default_value = "body")]
        field: String,

        /// Keep duplicate tokens
        #[arg(long)]
        no_dedup: bool,
    },
    /// Match documents against a file of queries
    Match {
        /// Query file, one query per line; the line number is the query ID
        #[arg(short, long)]
        queries: PathBuf,

        /// Documents as JSON lines: {"id": .., "fields": {..}}
        #[arg(short, long)]
        documents: PathBuf,

        /// Field for clauses without a `field:` prefix
        #[arg(short, long, default_value = "body")]
        field: String,

        /// Only index exact terms; pattern queries become always-candidates
        #[arg(long)]
        exact: bool,

        /// Print JSON reports
        #[arg(long)]
        json: bool,
    },
    /// Inspect or initialise the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config
    Show,
    /// Print the config file location
    Path,
    /// Write the default config to the app data directory
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")).init();

    let cli = Cli::parse();

    // `config init` must work before any config file exists
    if let Commands::Config { action } = cli.command {
        return handle_config_command(action, cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { query, field, json } => {
            run_extract(config, &query, &field, json)?;
        }
        Commands::Expand { text, field, no_dedup } => {
            let text = match text {
                Some(text) => text,
                None => {
                    let mut buf = String::new();
                    io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read stdin")?;
                    buf
                }
            };
            run_expand(&config, &text, &field, no_dedup);
        }
        Commands::Match {
            queries,
            documents,
            field,
            exact,
            json,
        } => {
            run_match(config, &queries, &documents, &field, exact, json)?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<PresearchConfig> {
    match path {
        Some(path) => PresearchConfig::load_from(path),
        None => PresearchConfig::load(),
    }
}

fn run_extract(config: PresearchConfig, query: &str, field: &str, json: bool) -> Result<()> {
    let presearcher = Presearcher::wildcard_ngram(config)?;
    let clause = parse_query(query, field)?;
    let signature = presearcher.index_query(&clause)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&signature)?);
        return Ok(());
    }

    if signature.is_empty() {
        println!("(query can never match)");
    }
    for term in &signature {
        println!("{}\t{:?}\t{}", term.field, term.kind, term.text);
    }
    Ok(())
}

fn run_expand(config: &PresearchConfig, text: &str, field: &str, no_dedup: bool) {
    let tokenizer = Tokenizer::new(config.fold_case).with_offset_unit(config.offset_unit);
    let tokens = tokenizer.tokenize(field, text);
    let grams = expand(tokens, config);

    let grams: Vec<_> = if no_dedup {
        grams.collect()
    } else {
        collapse(grams, config.dedup_window).collect()
    };

    for gram in grams {
        println!("{}\t{}\t{}", gram.text, gram.start_offset, gram.end_offset);
    }
}

fn run_match(
    config: PresearchConfig,
    queries: &Path,
    documents: &Path,
    field: &str,
    exact: bool,
    json: bool,
) -> Result<()> {
    let presearcher = if exact {
        Presearcher::exact(config)?
    } else {
        Presearcher::wildcard_ngram(config)?
    };
    let mut monitor = Monitor::new(presearcher);

    let file = File::open(queries)
        .with_context(|| format!("Failed to open query file {}", queries.display()))?;
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("Failed to read query file")?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = QueryId::try_from(line_no + 1).context("Too many queries")?;
        monitor
            .register_str(id, line, field)
            .with_context(|| format!("Invalid query on line {}: {}", line_no + 1, line))?;
    }

    if monitor.is_empty() {
        bail!("No queries in {}", queries.display());
    }

    let file = File::open(documents)
        .with_context(|| format!("Failed to open document file {}", documents.display()))?;
    let mut batch = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("Failed to read document file")?;
        if line.trim().is_empty() {
            continue;
        }
        let document: Document = serde_json::from_str(&line)
            .with_context(|| format!("Invalid document on line {}", line_no + 1))?;
        batch.push(document);
    }

    let reports = monitor.match_batch(&batch)?;

    if json {
        for report in &reports {
            println!("{}", serde_json::to_string(report)?);
        }
        return Ok(());
    }

    for report in &reports {
        println!(
            "{}: {} candidates, matches {:?}",
            report.document,
            report.candidates.len(),
            report.matches
        );
    }

    let candidates: usize = reports.iter().map(|r| r.candidates.len()).sum();
    let considered = reports.len() * monitor.len();
    if considered > 0 {
        eprintln!(
            "Filtered {} of {} query evaluations ({:.1}%)",
            considered - candidates,
            considered,
            (considered - candidates) as f64 * 100.0 / considered as f64
        );
    }

    Ok(())
}

fn handle_config_command(action: ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(explicit)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Path => match explicit {
            Some(path) => println!("{}", path.display()),
            None => println!("{}", get_config_path()?.display()),
        },
        ConfigAction::Init { force } => {
            let path = match explicit {
                Some(path) => path.to_path_buf(),
                None => get_config_path()?,
            };
            if path.exists() && !force {
                println!("Config already exists: {}", path.display());
                return Ok(());
            }
            PresearchConfig::default().save_to(&path)?;
            println!("Wrote default config to {}", path.display());
        }
    }

    Ok(())
}
