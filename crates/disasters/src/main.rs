use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use disasters::cli::commands::{self, Overrides};
use disasters::facets::ResultFilter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "disasters")]
#[command(about = "Disasters - semantic search and summaries over disaster event records")]
#[command(version)]
struct Cli {
  /// Embedding store file (one JSON record per line)
  #[arg(long, global = true, env = "DISASTERS_STORE")]
  store: Option<PathBuf>,
  /// Show debug logging
  #[arg(short, long, global = true)]
  verbose: bool,
  #[command(subcommand)]
  command: Command,
}

/// Options shared by every command that runs a query
#[derive(Args)]
struct RetrievalArgs {
  /// Number of records to retrieve
  #[arg(short = 'k', long)]
  top_k: Option<usize>,
  /// Rank with the external vector index instead of in-memory cosine similarity
  #[arg(long)]
  index: bool,
  /// Search with the original text when the query rewrite fails
  #[arg(long)]
  raw_fallback: bool,
}

/// Result filters; omitted or "All" means no restriction
#[derive(Args)]
struct FilterArgs {
  /// Only this disaster type
  #[arg(long = "type")]
  disaster_type: Option<String>,
  /// Only this status (ongoing, alert, past)
  #[arg(long)]
  status: Option<String>,
  /// Only this country
  #[arg(long)]
  country: Option<String>,
}

#[derive(Subcommand)]
enum Command {
  /// Find the disasters most similar to a query
  Search {
    /// Query text
    #[arg(required = true)]
    query: Vec<String>,
    #[command(flatten)]
    retrieval: RetrievalArgs,
    #[command(flatten)]
    filters: FilterArgs,
    /// Also summarize this record id
    #[arg(long)]
    summarize: Option<String>,
  },
  /// Show filter options and aggregate counts for a query's results
  Facets {
    /// Query text
    #[arg(required = true)]
    query: Vec<String>,
    #[command(flatten)]
    retrieval: RetrievalArgs,
  },
  /// Summarize one stored record
  Summarize {
    /// Record id
    id: String,
  },
  /// Describe the embedding store
  Inspect,
}

async fn handle(command: Command, store: Option<PathBuf>) -> Result<()> {
  let mut overrides = Overrides { store, ..Overrides::default() };

  match command {
    Command::Search { query, retrieval, filters, summarize } => {
      overrides.top_k = retrieval.top_k;
      overrides.raw_fallback = retrieval.raw_fallback;
      let config = commands::resolve_config(&overrides)?;
      let filter = ResultFilter::from_choices(
        filters.disaster_type.as_deref(),
        filters.status.as_deref(),
        filters.country.as_deref(),
      );
      commands::search(&config, &query.join(" "), retrieval.index, &filter, summarize.as_deref()).await
    }
    Command::Facets { query, retrieval } => {
      overrides.top_k = retrieval.top_k;
      overrides.raw_fallback = retrieval.raw_fallback;
      let config = commands::resolve_config(&overrides)?;
      commands::facets(&config, &query.join(" "), retrieval.index).await
    }
    Command::Summarize { id } => {
      let config = commands::resolve_config(&overrides)?;
      commands::summarize(&config, &id).await
    }
    Command::Inspect => {
      let config = commands::resolve_config(&overrides)?;
      commands::inspect(&config)
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  herald::init_tracing(cli.verbose);

  handle(cli.command, cli.store).await?;
  Ok(())
}
