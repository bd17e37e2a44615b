//! Command-line entry point.
//!
//! # Startup sequence
//!
//! 1. Parse arguments and initialise logging.
//! 2. Load [`AppConfig`] from disk (default on first run), apply overrides.
//! 3. Build the provider registry, audio cache and analysis service.
//! 4. Run the requested command on a tokio runtime.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use hanzi_cards::{
    analysis::{ProviderConfiguration, WordAnalysisService},
    audio::{AudioCache, AudioFetcher, AudioNormalizer, FfmpegNormalizer},
    config::{AppConfig, ProviderSelection},
    provider::{Facet, Word},
    registry::ProviderRegistry,
    select::TerminalSelector,
};

/// Provider name that switches a facet off for one run.
const NONE: &str = "none";

#[derive(Parser, Debug)]
#[command(name = "hanzi-cards", version)]
#[command(about = "Analyse Chinese words for flashcards using pluggable providers")]
struct Cli {
    /// Settings file (defaults to the platform config directory)
    #[arg(long, value_name = "FILE", global = true, env = "HANZI_CARDS_CONFIG")]
    config: Option<PathBuf>,

    /// Application home; the audio cache lives in <HOME>/cache
    #[arg(long, value_name = "DIR", global = true, env = "HANZI_CARDS_HOME")]
    home: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one word and print the record as JSON
    Analyze(AnalyzeArgs),
    /// List providers, optionally for one facet
    Providers {
        /// pinyin, definition, decomposition, examples, explanation, audio or images
        facet: Option<Facet>,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// The word, e.g. 学习
    word: String,

    /// Provider for each facet ("none" to skip the facet)
    #[arg(long, value_name = "NAME")]
    pinyin: Option<String>,
    #[arg(long, value_name = "NAME")]
    definition: Option<String>,
    #[arg(long, value_name = "NAME")]
    decomposition: Option<String>,
    #[arg(long, value_name = "NAME")]
    examples: Option<String>,
    #[arg(long, value_name = "NAME")]
    explanation: Option<String>,
    #[arg(long, value_name = "NAME")]
    audio: Option<String>,
    #[arg(long, value_name = "NAME")]
    images: Option<String>,

    /// Do not pass the definition to the examples provider
    #[arg(long)]
    no_examples_definition: bool,

    /// Wait for the pinyin and pass it to the audio provider
    #[arg(long)]
    audio_use_pinyin: bool,

    /// Never prompt; keep every audio take and no images
    #[arg(long)]
    no_interactive: bool,
}

impl AnalyzeArgs {
    fn apply(&self, selection: &mut ProviderSelection) {
        let overrides = [
            (Facet::Pinyin, &self.pinyin),
            (Facet::Definition, &self.definition),
            (Facet::Decomposition, &self.decomposition),
            (Facet::Examples, &self.examples),
            (Facet::Explanation, &self.explanation),
            (Facet::Audio, &self.audio),
            (Facet::Images, &self.images),
        ];
        for (facet, name) in overrides {
            match name.as_deref() {
                Some(NONE) => selection.set(facet, None),
                Some(name) => selection.set(facet, Some(name.to_string())),
                None => {}
            }
        }
        if self.no_examples_definition {
            selection.examples_use_definition = false;
        }
        if self.audio_use_pinyin {
            selection.audio_use_pinyin = true;
        }
    }
}

fn load_config(cli: &Cli) -> AppConfig {
    let loaded = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if let Some(home) = &cli.home {
        config.home_dir = Some(home.clone());
    }
    config
}

fn list_providers(registry: &ProviderRegistry, facet: Option<Facet>) {
    let facets = match facet {
        Some(f) => vec![f],
        None => Facet::ALL.to_vec(),
    };
    for facet in facets {
        println!("{facet}:");
        let infos = registry.list(facet);
        if infos.is_empty() {
            println!("  (none)");
        }
        for info in infos {
            println!("  {:<14} {:<10} {}", info.name, info.kind, info.description);
        }
    }
}

async fn analyze(config: &AppConfig, registry: ProviderRegistry, args: &AnalyzeArgs) -> Result<bool> {
    let word = Word::new(&args.word).with_context(|| format!("invalid word {:?}", args.word))?;

    let normalizer = FfmpegNormalizer::from_config(&config.normalize)
        .map(|n| Arc::new(n) as Arc<dyn AudioNormalizer>);
    let cache = Arc::new(AudioCache::new(config.cache_root(), normalizer));
    log::debug!("audio cache at {}", cache.root().display());

    let mut service = WordAnalysisService::new(Arc::new(registry), Arc::clone(&cache))
        .with_fetcher(AudioFetcher::new(std::time::Duration::from_secs(
            config.tts.timeout_secs,
        )));
    if config.selection.interactive && !args.no_interactive {
        service = service.with_selector(Arc::new(TerminalSelector::new()));
    }

    let mut selection = config.providers.clone();
    args.apply(&mut selection);
    let run_config = ProviderConfiguration::from(&selection);
    if run_config.is_empty() {
        anyhow::bail!("no facet has a provider configured");
    }

    let report = service.complete_analysis(&word, &run_config).await?;

    println!("{}", serde_json::to_string_pretty(&report.analysis)?);
    for failure in &report.failures {
        eprintln!("error: {failure}");
    }
    log::debug!("cache stats: {:?}", cache.stats());
    Ok(report.is_success())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<bool> {
    // 2. Configuration
    let config = load_config(&cli);

    // 3. Providers
    let registry = ProviderRegistry::with_defaults(&config)?;

    match &cli.command {
        Command::Providers { facet } => {
            list_providers(&registry, *facet);
            Ok(true)
        }
        Command::Analyze(args) => {
            // 4. Runtime
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to create tokio runtime")?;
            rt.block_on(analyze(&config, registry, args))
        }
    }
}
