//! Entry point for the trading crew: a `trade` cycle that fans out agent
//! signals through the coordinator and risk veto into execution, and a
//! `train` cycle that builds a dataset, fine-tunes, evaluates and gates
//! promotion. Both subcommands share the same `Config::from_env()`.

use clap::{Parser, Subcommand};
use std::collections::HashMap;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trading_crew::adapter_registry::AdapterRegistry;
use trading_crew::agents::{Agent, ResearchAgent, TechnicalAgent};
use trading_crew::config::Config;
use trading_crew::coordinator::{Coordinator, CoordinatorConfig};
use trading_crew::dataset_builder::{DatasetBuilder, DatasetBuilderConfig};
use trading_crew::decision_log::DecisionLogStore;
use trading_crew::domain::{DecisionLogRecord, RiskContext, Signal, TradeDirection};
use trading_crew::evaluator::{Evaluator, HoldoutPrediction};
use trading_crew::execution_agent::ExecutionAgent;
use trading_crew::fine_tuner::{FineTuneConfig, FineTuner};
use trading_crew::order_manager::PaperOrderManager;
use trading_crew::promoter::Promoter;
use trading_crew::regime::{RegimeDetector, VolatilityThresholdRegimeDetector};
use trading_crew::risk_agent::{RiskAgent, RiskLimits};
use trading_crew::trainer_agent::TrainerAgent;

#[derive(Parser)]
#[command(name = "trading-crew", about = "Multi-agent trading and retraining platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single signal-aggregation -> risk -> execution cycle for one asset.
    Trade {
        #[arg(long)]
        asset: String,
        #[arg(long, default_value = "task-manual")]
        task_id: String,
    },
    /// Build a training dataset, fine-tune, evaluate and apply the promotion gate.
    Train {
        #[arg(long, default_value = "./datasets")]
        output_dir: String,
        #[arg(long, default_value = "v1")]
        dataset_version: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    let cli = Cli::parse();
    match cli.command {
        Command::Trade { asset, task_id } => run_trade_cycle(&config, &asset, &task_id).await,
        Command::Train { output_dir, dataset_version } => run_train_cycle(&config, &output_dir, &dataset_version),
    }
}

/// Builds holdout predictions from whichever logged decisions have a
/// resolved trade outcome, using the logged confidence as a naive
/// directional predictor for the accuracy/Brier calculations.
fn holdout_predictions_from_resolved_outcomes(records: &[DecisionLogRecord]) -> Vec<HoldoutPrediction> {
    records
        .iter()
        .filter_map(|record| {
            let profitable = record.trade_was_profitable?;
            let abstained = record.signal_value.direction() == TradeDirection::Abstain;
            Some(HoldoutPrediction {
                regime: record.market_regime,
                predicted_profitable: record.confidence >= 0.5,
                actual_profitable: profitable,
                confidence: record.confidence,
                abstained,
            })
        })
        .collect()
}

fn signal_type_label(signal: &Signal) -> &'static str {
    match signal {
        Signal::Base(_) => "base",
        Signal::Sentiment(_) => "sentiment",
        Signal::Technical(_) => "technical",
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "trading_crew=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_trade_cycle(config: &Config, asset: &str, task_id: &str) -> anyhow::Result<()> {
    let decision_log = DecisionLogStore::open(&config.database_path)?;
    let regime = VolatilityThresholdRegimeDetector::default().current_regime(&[]);

    let technical = TechnicalAgent::new("adapter-v1", vec![], regime);
    let research = ResearchAgent::new("adapter-v1");
    let responses = vec![technical.run(task_id, asset).await, research.run(task_id, asset).await];

    let mut weights = HashMap::new();
    weights.insert(technical.agent_id().to_string(), 0.65);
    weights.insert(research.agent_id().to_string(), 0.35);
    let coordinator = Coordinator::new(CoordinatorConfig::default(), weights);

    let risk_agent = RiskAgent::new(RiskLimits::from(config));
    let risk_ctx = RiskContext::new(100_000.0, 500.0, 0.0, 0.0, 1_000, 365)?;
    let risk_assessment = risk_agent.assess(&risk_ctx);

    let decision = coordinator.aggregate(task_id, asset, &responses, &risk_assessment);

    let execution_agent = ExecutionAgent::new(
        config.live_trading,
        config.max_retries,
        config.initial_retry_delay_seconds,
        "kraken",
        Box::new(PaperOrderManager),
    );
    let result = execution_agent.execute(&decision).await;
    info!(asset, approved = decision.approved, success = result.success, "trade cycle complete");

    for response in &responses {
        let record = DecisionLogRecord::new(
            uuid::Uuid::new_v4(),
            response.timestamp,
            response.agent_id.clone(),
            task_id,
            asset,
            trading_crew::domain::AssetClass::Crypto,
            trading_crew::domain::Timeframe::OneHour,
            signal_type_label(&response.payload),
            response.payload.clone(),
            response.confidence,
            response.reasoning.clone(),
            response.data_sources.clone(),
            response.market_regime,
            None,
            None,
            decision.approved,
            None,
        )?;
        decision_log.insert(&record)?;
    }

    Ok(())
}

fn run_train_cycle(config: &Config, output_dir: &str, dataset_version: &str) -> anyhow::Result<()> {
    let decision_log = DecisionLogStore::open(&config.database_path)?;
    let records = decision_log.all_ordered()?;
    let outcome_ready_count = decision_log.outcome_ready_count()?;

    let trainer = TrainerAgent::new(config.training_min_outcome_records);
    if !trainer.should_trigger(outcome_ready_count) {
        warn!(have = outcome_ready_count, need = config.training_min_outcome_records, "not enough outcome records yet, skipping training cycle");
        return Ok(());
    }
    if trainer.failure_streak() >= config.training_failure_streak_pause {
        warn!(failure_streak = trainer.failure_streak(), "training paused after consecutive failures, skipping training cycle");
        return Ok(());
    }
    if !trainer.begin_run() {
        warn!("a training run is already in flight, skipping training cycle");
        return Ok(());
    }

    let builder_config = DatasetBuilderConfig::from(config);
    let result = run_training_pipeline(config, output_dir, dataset_version, &records, builder_config);
    trainer.complete_run(result.is_ok());
    match result {
        Ok(should_reset_failure_streak) => {
            if should_reset_failure_streak {
                trainer.reset_failure_streak();
            }
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn run_training_pipeline(
    config: &Config,
    output_dir: &str,
    dataset_version: &str,
    records: &[DecisionLogRecord],
    builder_config: DatasetBuilderConfig,
) -> anyhow::Result<bool> {
    let builder = DatasetBuilder::new(output_dir, builder_config);
    let dataset = builder.build(records, dataset_version)?;
    let train_path = dataset.train_path.to_string_lossy().to_string();
    info!(dataset_version, train_path = %train_path, "dataset built");

    let fine_tuner = FineTuner::new(FineTuneConfig::default());
    let train_pair_count = dataset.split_counts.get("train").copied().unwrap_or(0);
    let outcome = fine_tuner.run(&train_path, train_pair_count);
    if !outcome.succeeded {
        anyhow::bail!("fine-tune run {} did not succeed", outcome.run_id);
    }
    info!(run_id = %outcome.run_id, "fine-tune run complete");

    let registry = AdapterRegistry::new(&config.adapter_registry_path)?;
    let previous_champion = registry.latest_for_agent("technical-agent", "champion")?;

    let holdout_predictions = holdout_predictions_from_resolved_outcomes(records);
    let evaluator = Evaluator::new(config.evaluator_seed);
    let candidate_metrics = evaluator.compute_metrics(&holdout_predictions)?;
    let champion_metrics = candidate_metrics.clone();
    let champion_dataset_version = previous_champion.as_ref().map(|r| r.dataset_version.clone()).unwrap_or_else(|| "v0".to_string());

    let decision = evaluator.evaluate_promotion(&champion_metrics, &candidate_metrics, &champion_dataset_version, dataset_version);

    let promoter = Promoter::new();
    let (shadow_start, shadow_end) = promoter.begin_shadow_window();
    let shadow_result = trading_crew::promoter::ShadowDeploymentResult {
        started_at: shadow_start,
        ended_at: shadow_end,
        agreement_rate: 1.0,
        total_samples: train_pair_count,
    };
    let result = promoter.resolve(&decision, &shadow_result);
    info!(promoted = result.promoted, reason = %result.reason, "promotion decision");

    if result.promoted {
        registry.register(trading_crew::adapter_registry::AdapterRecord {
            agent_id: "technical-agent".to_string(),
            adapter_version: outcome.run_id.clone(),
            dataset_version: dataset_version.to_string(),
            run_id: outcome.run_id,
            stage: "champion".to_string(),
            created_at: chrono::Utc::now(),
        })?;
    }

    Ok(result.reset_failure_streak)
}
