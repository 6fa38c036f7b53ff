//! LoRA fine-tuning is a collaborator boundary, not something this crate
//! implements: production wiring calls out to an external trainer (e.g.
//! Unsloth + TRL's `SFTTrainer`). This module is a typed, logged stub that
//! records the configuration a real run would use.

use tracing::info;

#[derive(Debug, Clone)]
pub struct FineTuneConfig {
    pub lora_r: u32,
    pub lora_alpha: u32,
    pub lora_dropout: f64,
    pub learning_rate: f64,
    pub epochs: u32,
    pub batch_size: u32,
    pub gradient_accumulation_steps: u32,
    pub max_seq_length: u32,
    pub seed: u64,
}

impl Default for FineTuneConfig {
    fn default() -> Self {
        Self {
            lora_r: 16,
            lora_alpha: 32,
            lora_dropout: 0.05,
            learning_rate: 2e-4,
            epochs: 3,
            batch_size: 4,
            gradient_accumulation_steps: 4,
            max_seq_length: 2048,
            seed: 42,
        }
    }
}

pub struct FineTuneOutcome {
    pub succeeded: bool,
    pub run_id: String,
}

pub struct FineTuner {
    config: FineTuneConfig,
}

impl FineTuner {
    pub fn new(config: FineTuneConfig) -> Self {
        Self { config }
    }

    /// Stub entry point: logs the configuration and the dataset size it
    /// would train against. Returns a deterministic run id derived from
    /// the dataset path rather than performing any real training.
    pub fn run(&self, dataset_path: &str, pair_count: usize) -> FineTuneOutcome {
        info!(
            dataset_path,
            pair_count,
            lora_r = self.config.lora_r,
            epochs = self.config.epochs,
            seed = self.config.seed,
            "fine-tune run requested (typed stub, no training performed)"
        );
        FineTuneOutcome { succeeded: true, run_id: format!("stub-run-{}", self.config.seed) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_run_always_succeeds_and_logs() {
        let tuner = FineTuner::new(FineTuneConfig::default());
        let outcome = tuner.run("./dataset.jsonl", 500);
        assert!(outcome.succeeded);
        assert_eq!(outcome.run_id, "stub-run-42");
    }
}
