//! Append-only adapter metadata registry. A single JSON array on disk,
//! guarded by an in-process `parking_lot::Mutex` for the read-modify-write
//! cycle — the distributed-coordination story (exclusive file locking
//! across processes) is a non-goal; single-process correctness is what
//! this registry actually needs to provide.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterRecord {
    pub agent_id: String,
    pub adapter_version: String,
    pub dataset_version: String,
    pub run_id: String,
    pub stage: String,
    pub created_at: DateTime<Utc>,
}

fn to_io_result<T>(result: Result<T, serde_json::Error>) -> std::io::Result<T> {
    result.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

pub struct AdapterRegistry {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AdapterRegistry {
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            fs::write(&path, "[]\n")?;
        }
        Ok(Self { path, lock: Mutex::new(()) })
    }

    pub fn register(&self, record: AdapterRecord) -> std::io::Result<()> {
        let _guard = self.lock.lock();
        let mut records = self.read_locked()?;
        records.push(record);
        let payload = to_io_result(serde_json::to_string_pretty(&records))?;
        fs::write(&self.path, payload + "\n")?;
        Ok(())
    }

    pub fn latest_for_agent(&self, agent_id: &str, stage: &str) -> std::io::Result<Option<AdapterRecord>> {
        let _guard = self.lock.lock();
        let records = self.read_locked()?;
        Ok(records.into_iter().rev().find(|r| r.agent_id == agent_id && r.stage == stage))
    }

    fn read_locked(&self) -> std::io::Result<Vec<AdapterRecord>> {
        let contents = fs::read_to_string(&self.path)?;
        to_io_result(serde_json::from_str(&contents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(agent_id: &str, stage: &str) -> AdapterRecord {
        AdapterRecord {
            agent_id: agent_id.to_string(),
            adapter_version: "v1".to_string(),
            dataset_version: "ds-1".to_string(),
            run_id: "run-1".to_string(),
            stage: stage.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn register_then_query_latest() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AdapterRegistry::new(dir.path().join("registry.json")).unwrap();
        registry.register(record("technical-agent", "candidate")).unwrap();
        registry.register(record("technical-agent", "champion")).unwrap();
        let latest = registry.latest_for_agent("technical-agent", "champion").unwrap();
        assert!(latest.is_some());
        assert_eq!(latest.unwrap().stage, "champion");
    }

    #[test]
    fn unknown_agent_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let registry = AdapterRegistry::new(dir.path().join("registry.json")).unwrap();
        assert!(registry.latest_for_agent("nobody", "champion").unwrap().is_none());
    }
}
