/// Process-wide configuration loaded from the environment.
///
/// Follows the `Config::from_env()` idiom used throughout this codebase:
/// read `.env` if present, then fall back to hardcoded defaults for any
/// variable that isn't set or doesn't parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,

    pub live_trading: bool,
    pub max_position_pct: f64,
    pub max_daily_drawdown_pct: f64,
    pub max_correlated_exposure_pct: f64,
    pub no_trade_event_window_minutes: i64,
    pub min_history_days: i64,

    pub intraday_max_age_minutes: i64,
    pub swing_max_age_days: i64,
    pub max_provider_failures: u32,
    pub circuit_cooldown_seconds: u64,
    pub provider_timeout_seconds: u64,

    pub max_retries: u32,
    pub initial_retry_delay_seconds: f64,

    pub training_min_outcome_records: usize,
    pub training_failure_streak_pause: u32,
    pub dataset_seed: u64,
    pub evaluator_seed: u64,
    pub replay_ratio: f64,
    pub min_regime_ratio: f64,
    pub holdout_lock_filename: String,

    pub adapter_registry_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let database_path = std::env::var("DATABASE_PATH")
            .unwrap_or_else(|_| "./trading_crew.db".to_string());

        let live_trading = std::env::var("LIVE_TRADING")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let max_position_pct = env_parse("MAX_POSITION_PCT", 0.02);
        let max_daily_drawdown_pct = env_parse("MAX_DAILY_DRAWDOWN_PCT", 0.05);
        let max_correlated_exposure_pct = env_parse("MAX_CORRELATED_EXPOSURE_PCT", 0.10);
        let no_trade_event_window_minutes = env_parse("NO_TRADE_EVENT_WINDOW_MINUTES", 5);
        let min_history_days = env_parse("MIN_HISTORY_DAYS", 30);

        let intraday_max_age_minutes = env_parse("INTRADAY_MAX_AGE_MINUTES", 15);
        let swing_max_age_days = env_parse("SWING_MAX_AGE_DAYS", 1);
        let max_provider_failures = env_parse("MAX_PROVIDER_FAILURES", 3);
        let circuit_cooldown_seconds = env_parse("CIRCUIT_COOLDOWN_SECONDS", 120);
        let provider_timeout_seconds = env_parse("PROVIDER_TIMEOUT_SECONDS", 20);

        let max_retries = env_parse("MAX_RETRIES", 3);
        let initial_retry_delay_seconds = env_parse("INITIAL_RETRY_DELAY_SECONDS", 1.0);

        let training_min_outcome_records = env_parse("TRAINING_MIN_OUTCOME_RECORDS", 500);
        let training_failure_streak_pause = env_parse("TRAINING_FAILURE_STREAK_PAUSE", 3);
        let dataset_seed = env_parse("DATASET_SEED", 7);
        let evaluator_seed = env_parse("EVALUATOR_SEED", 11);
        let replay_ratio = env_parse("REPLAY_RATIO", 0.30);
        let min_regime_ratio = env_parse("MIN_REGIME_RATIO", 0.20);
        let holdout_lock_filename = std::env::var("HOLDOUT_LOCK_FILENAME")
            .unwrap_or_else(|_| "holdout_lock.json".to_string());

        let adapter_registry_path = std::env::var("ADAPTER_REGISTRY_PATH")
            .unwrap_or_else(|_| "./adapter_registry.json".to_string());

        Ok(Self {
            database_path,
            live_trading,
            max_position_pct,
            max_daily_drawdown_pct,
            max_correlated_exposure_pct,
            no_trade_event_window_minutes,
            min_history_days,
            intraday_max_age_minutes,
            swing_max_age_days,
            max_provider_failures,
            circuit_cooldown_seconds,
            provider_timeout_seconds,
            max_retries,
            initial_retry_delay_seconds,
            training_min_outcome_records,
            training_failure_streak_pause,
            dataset_seed,
            evaluator_seed,
            replay_ratio,
            min_regime_ratio,
            holdout_lock_filename,
            adapter_registry_path,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_env_unset() {
        std::env::remove_var("MAX_POSITION_PCT");
        let cfg = Config::from_env().unwrap();
        assert!((cfg.max_position_pct - 0.02).abs() < 1e-9);
        assert_eq!(cfg.training_min_outcome_records, 500);
    }
}
