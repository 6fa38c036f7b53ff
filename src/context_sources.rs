//! Supplemental prompt-enrichment sources for the dataset builder. These
//! append additional context lines after the base prompt fields — purely
//! additive, so none of the base format invariants change.

use crate::domain::DecisionLogRecord;

pub trait TrainingContextSource: Send + Sync {
    /// Render a single stable context line for this record, or `None` if
    /// this source has nothing to add.
    fn render(&self, record: &DecisionLogRecord, pool: &[DecisionLogRecord]) -> Option<String>;
}

/// Notes how many distinct data sources backed this signal, a rough proxy
/// for corroboration strength.
pub struct SourceDiversitySource;

impl TrainingContextSource for SourceDiversitySource {
    fn render(&self, record: &DecisionLogRecord, _pool: &[DecisionLogRecord]) -> Option<String> {
        if record.data_sources.is_empty() {
            return None;
        }
        Some(format!("- source_diversity: {} distinct source(s)", record.data_sources.len()))
    }
}

/// Reports the realized outcome quality for records that have one, so the
/// model can learn to associate reasoning style with eventual profitability.
pub struct OutcomeQualitySource;

impl TrainingContextSource for OutcomeQualitySource {
    fn render(&self, record: &DecisionLogRecord, _pool: &[DecisionLogRecord]) -> Option<String> {
        let pnl = record.outcome_pnl?;
        let profitable = record.trade_was_profitable.unwrap_or(false);
        Some(format!("- outcome_quality: pnl={pnl:.4} profitable={profitable}"))
    }
}

/// Reports how common this record's market regime is within the full pool,
/// giving the model a sense of how typical the conditions were.
pub struct TemporalRegimeSource;

impl TrainingContextSource for TemporalRegimeSource {
    fn render(&self, record: &DecisionLogRecord, pool: &[DecisionLogRecord]) -> Option<String> {
        if pool.is_empty() {
            return None;
        }
        let count = pool.iter().filter(|r| r.market_regime == record.market_regime).count();
        let fraction = count as f64 / pool.len() as f64;
        Some(format!("- regime_prevalence: {:.4}", fraction))
    }
}

/// Placeholder for macro-economic context (rates, CPI surprises, etc.).
/// No macro data feed is wired in this crate; this reports that absence
/// explicitly rather than fabricating a value.
pub struct MacroSnapshotSource;

impl TrainingContextSource for MacroSnapshotSource {
    fn render(&self, _record: &DecisionLogRecord, _pool: &[DecisionLogRecord]) -> Option<String> {
        Some("- macro_snapshot: unavailable".to_string())
    }
}

pub fn default_sources() -> Vec<Box<dyn TrainingContextSource>> {
    vec![Box::new(SourceDiversitySource), Box::new(OutcomeQualitySource), Box::new(TemporalRegimeSource), Box::new(MacroSnapshotSource)]
}
