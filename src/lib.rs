//! Multi-agent trading and autonomous-retraining platform.
//!
//! `agents` and `market_data` hold the pluggable boundaries (signal
//! sources, data providers); everything else is a single-purpose pipeline
//! stage wired together by the `trading-crew` binary.

pub mod adapter_registry;
pub mod agents;
pub mod config;
pub mod context_sources;
pub mod coordinator;
pub mod dataset_builder;
pub mod decision_log;
pub mod domain;
pub mod error;
pub mod evaluator;
pub mod execution_agent;
pub mod fine_tuner;
pub mod indicators;
pub mod market_data;
pub mod order_manager;
pub mod promoter;
pub mod regime;
pub mod risk_agent;
pub mod trainer_agent;
