//! huginn - gateway configuration and routing inspector.
//!
//! Offline tools for operators: validate a config file, dry-run the router
//! against it, and compare texts with the cache's similarity scorers.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use huginn::config::Config;
use huginn::providers::{ActiveRequests, HealthTable, ProviderRegistry, Router};
use huginn::similarity::{self, SimilarityAlgorithm};
use huginn::{GenerationRequest, Priority, RequestType};

/// Huginn gateway inspector
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION, long_version = huginn::version_string())]
#[command(about = "Inspect huginn gateway configuration and routing")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the configuration and list providers
    Check,

    /// Show how the router would score each provider for a prompt
    Route {
        /// Prompt text
        prompt: String,
        /// Request type: creation, logic, narrative or analysis
        #[arg(short = 't', long = "type", default_value = "analysis")]
        request_type: RequestType,
        /// Priority: low, medium, high or critical
        #[arg(short, long, default_value = "medium")]
        priority: Priority,
    },

    /// Compare two texts
    Similarity {
        a: String,
        b: String,
        /// Algorithm (omit to show all three)
        #[arg(short, long)]
        algorithm: Option<SimilarityAlgorithm>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Check => {
            let config = Config::load(args.config.as_deref())?;
            cmd_check(&config);
        }
        Command::Route {
            prompt,
            request_type,
            priority,
        } => {
            let config = Config::load(args.config.as_deref())?;
            cmd_route(&config, prompt, request_type, priority)?;
        }
        Command::Similarity { a, b, algorithm } => cmd_similarity(&a, &b, algorithm),
    }

    Ok(())
}

fn cmd_check(config: &Config) {
    let cache = config.cache_config();
    println!("configuration ok");
    println!(
        "cache: max_size={} ttl={}s semantic={} adaptive_ttl={} backend={:?}",
        cache.max_size,
        cache.default_ttl.as_secs(),
        cache.semantic_similarity,
        cache.adaptive_ttl,
        config.cache.storage_backend,
    );
    println!(
        "similarity: {:?} >= {}",
        config.similarity.algorithm, config.similarity.threshold
    );
    println!();

    if config.providers.is_empty() {
        println!("no providers configured");
        return;
    }
    println!(
        "{:<24} {:<28} {:>10} {:>9}  {:<4} {:<4} {:<4} {:<4}",
        "PROVIDER", "MODEL", "$/1K", "TIMEOUT", "CRE", "LOG", "NAR", "ANA"
    );
    for p in &config.providers {
        let caps: Vec<String> = RequestType::ALL
            .iter()
            .map(|t| p.capability(*t).to_string())
            .collect();
        println!(
            "{:<24} {:<28} {:>10.4} {:>8}s  {:<4} {:<4} {:<4} {:<4}",
            p.id,
            p.model,
            p.cost_per_1k_tokens,
            p.timeout_ms / 1000,
            caps[0],
            caps[1],
            caps[2],
            caps[3],
        );
    }
}

/// Dry run: every provider's health is unknown and nothing is in flight.
fn cmd_route(
    config: &Config,
    prompt: String,
    request_type: RequestType,
    priority: Priority,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = Arc::new(ProviderRegistry::from_configs(
        config.providers.iter().cloned(),
    )?);
    let router = Router::new(
        registry,
        Arc::new(HealthTable::new()),
        Arc::new(ActiveRequests::new()),
    );
    let request = GenerationRequest::new(request_type, prompt).priority(priority);
    let scores = router.score_candidates(&request);
    let selected = router.select_provider(&request);

    println!(
        "request: type={request_type} priority={priority:?} est_tokens={}",
        request.estimated_tokens()
    );
    println!(
        "{:<2}{:<24} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>10}",
        "", "PROVIDER", "HEALTH", "LATENCY", "COST", "CAPAB", "LOAD", "TOTAL", "EST $"
    );
    for s in &scores {
        let mark = match &selected {
            Some(p) if p.id == s.provider_id => "*",
            _ => "",
        };
        println!(
            "{:<2}{:<24} {:>7.1} {:>7.1} {:>7.2} {:>7.1} {:>7.1} {:>7.2} {:>10.6}",
            mark,
            s.provider_id,
            s.health,
            s.latency,
            s.cost,
            s.capability,
            s.congestion,
            s.total,
            s.estimated_cost,
        );
    }
    if selected.is_none() {
        println!("no provider would be selected");
    }
    Ok(())
}

fn cmd_similarity(a: &str, b: &str, algorithm: Option<SimilarityAlgorithm>) {
    let algorithms = match algorithm {
        Some(alg) => vec![alg],
        None => vec![
            SimilarityAlgorithm::Cosine,
            SimilarityAlgorithm::Jaccard,
            SimilarityAlgorithm::Levenshtein,
        ],
    };
    for alg in algorithms {
        println!("{:<12} {:.4}", format!("{alg:?}").to_lowercase(), similarity::similarity(a, b, alg));
    }
}
