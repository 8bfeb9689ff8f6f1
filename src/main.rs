//! PROPSTACK: multi-signal prop scoring and parlay construction.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! restores the rule and availability tables from disk (or starts
//! fresh), then runs one slate through
//! analyze→build→validate→rebuild→export and saves state.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

use propstack::config::AppConfig;
use propstack::engine::{merge_accepted, PropEngine, ValidationBatch};
use propstack::export;
use propstack::llm::openrouter::OpenRouterOracle;
use propstack::llm::CorrelationOracle;
use propstack::storage::{self, EngineState};
use propstack::types::{present_confidence, Parlay};
use propstack::validation::{builtin_rules, AvailabilityStore, InMemoryAvailabilityStore};

const BANNER: &str = r#"
 ___  ___  ___  ___  ___  _____  _    ___ _  __
| _ \| _ \/ _ \| _ \/ __||_   _|/_\  / __| |/ /
|  _/|   / (_) |  _/\__ \  | | / _ \| (__| ' <
|_|  |_|_\\___/|_|  |___/  |_|/_/ \_\\___|_|\_\

  Multi-signal prop scoring and parlay construction
  v0.1.0
"#;

const USAGE: &str = "usage: propstack <slate.json>";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path =
        std::env::var("PROPSTACK_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let cfg = AppConfig::load_or_default(&config_path)?;

    init_logging();

    println!("{BANNER}");

    let Some(slate_path) = std::env::args().nth(1) else {
        bail!(USAGE);
    };

    info!(
        min_confidence = cfg.engine.min_confidence,
        style = ?cfg.engine.style,
        targets = ?cfg.engine.target_map(),
        "PROPSTACK starting up"
    );

    // -- Restore or create state -----------------------------------------

    let state_path = cfg.storage.state_path.as_str();
    let (store, mut rules) = match storage::load_state(Some(state_path))? {
        Some(state) => state.into_store(),
        None => (InMemoryAvailabilityStore::new(), builtin_rules()),
    };
    if let Some(rules_file) = &cfg.validation.rules_file {
        rules = storage::merge_rules(rules, storage::load_rules(rules_file)?);
    }
    let store: Arc<InMemoryAvailabilityStore> = Arc::new(store);

    // -- Initialise components -------------------------------------------

    let oracle = build_oracle(&cfg)?;
    let engine = PropEngine::from_config(&cfg, store.clone(), &rules, oracle);
    if !engine.validator().rules().skipped().is_empty() {
        warn!(skipped = ?engine.validator().rules().skipped(), "Some rules were not loaded");
    }

    // -- Pipeline --------------------------------------------------------

    let slate = storage::load_slate(&slate_path)?;
    let analyses = engine
        .analyze_props(&slate.candidates, Arc::new(slate.context))
        .await;

    let report = engine.build_parlays(&analyses);
    if report.total_deficit() > 0 {
        warn!(deficits = ?report.deficits, "Pool too small for every requested parlay");
    }
    let built = engine.enrich_parlays(&report.parlays).await;
    let first = engine.validate_all(&built);

    let mut accepted = first.accepted.clone();
    if !first.rejected.is_empty() {
        let rebuilt = engine.rebuild_parlays(&first.rejected, &analyses);
        let rebuilt = engine.enrich_parlays(&rebuilt.parlays).await;
        let second = engine.validate_all(&rebuilt);
        log_batch("rebuild", &second);

        accepted = merge_accepted(&first.accepted, second.accepted, engine.targets());
    }
    log_batch("initial", &first);

    print_summary(&accepted);

    // -- Persist ---------------------------------------------------------

    let written = export::write_jsonl(&cfg.storage.export_path, &accepted)?;
    storage::save_state(&EngineState::snapshot(store.as_ref(), &rules), Some(state_path))?;

    info!(
        props = analyses.len(),
        parlays = accepted.len(),
        exported = written,
        availability = store.records().len(),
        "PROPSTACK run complete"
    );

    Ok(())
}

/// OpenRouter oracle when configured and keyed; heuristics only otherwise.
fn build_oracle(cfg: &AppConfig) -> Result<Option<Arc<dyn CorrelationOracle>>> {
    let section = &cfg.correlation;
    match section.provider.as_deref() {
        None => Ok(None),
        Some("openrouter") => match section.api_key() {
            Some(key) => {
                let oracle = OpenRouterOracle::new(key, section.model.clone(), section.max_tokens)?;
                info!(model = oracle.model_name(), "Using OpenRouter correlation oracle");
                Ok(Some(Arc::new(oracle)))
            }
            None => {
                warn!(
                    env = %section.api_key_env,
                    "No oracle API key configured, using heuristic correlation only"
                );
                Ok(None)
            }
        },
        Some(other) => {
            warn!(provider = other, "Unknown correlation provider, using heuristics only");
            Ok(None)
        }
    }
}

fn log_batch(pass: &str, batch: &ValidationBatch) {
    for outcome in batch.outcomes.iter().filter(|o| !o.valid) {
        for violation in &outcome.violations {
            info!(pass, parlay = %outcome.parlay_id, %violation, "Parlay rejected");
        }
    }
    info!(
        pass,
        accepted = batch.accepted.len(),
        rejected = batch.rejected.len(),
        "Validation summary"
    );
}

fn print_summary(parlays: &[Parlay]) {
    if parlays.is_empty() {
        println!("No parlays cleared validation.");
        return;
    }
    for parlay in parlays {
        println!("{parlay}");
        for leg in &parlay.legs {
            println!(
                "    {} {} {} {}  ({})",
                leg.candidate.player,
                leg.candidate.direction,
                leg.candidate.line,
                leg.candidate.stat,
                present_confidence(leg.confidence),
            );
        }
        for note in &parlay.correlation_notes {
            println!("    note: {note}");
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("propstack=info"));

    let json_logging = std::env::var("PROPSTACK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
