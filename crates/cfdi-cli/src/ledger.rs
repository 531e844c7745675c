//! JSON ledger file backing the CLI's repository.
//!
//! The whole [`LedgerSnapshot`] is read at start and written back after a
//! command that changes it. Writes go to a sibling temp file first and are
//! renamed into place, so an interrupted run never leaves half a ledger.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cfdi_state::{InMemoryRepository, LedgerSnapshot};

/// Default ledger location, relative to the working directory.
pub const DEFAULT_LEDGER: &str = ".cfdi/ledger.json";

/// Load the ledger at `path`. A missing file is an empty ledger.
pub fn load(path: &Path) -> Result<InMemoryRepository> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "ledger not found, starting empty");
        return Ok(InMemoryRepository::new());
    }
    let raw = std::fs::read_to_string(path).with_context(|| format!("failed to read ledger {}", path.display()))?;
    let snapshot: LedgerSnapshot =
        serde_json::from_str(&raw).with_context(|| format!("ledger {} is not valid", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        transactions = snapshot.transactions.len(),
        stamped = snapshot.stamped.len(),
        "ledger loaded"
    );
    Ok(InMemoryRepository::from_snapshot(snapshot))
}

pub fn save(path: &Path, repo: &InMemoryRepository) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create ledger directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&repo.snapshot())?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, json).with_context(|| format!("failed to write {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("failed to replace ledger {}", path.display()))?;
    tracing::debug!(path = %path.display(), "ledger saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfdi_core::CounterpartyId;
    use cfdi_invoice::CounterpartyProfile;

    #[test]
    fn missing_ledger_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = load(&dir.path().join("nope.json")).unwrap();
        assert!(repo.list_transactions().is_empty());
    }

    #[test]
    fn save_creates_directories_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".cfdi").join("ledger.json");

        let repo = InMemoryRepository::new();
        repo.insert_counterparty(CounterpartyProfile {
            id: CounterpartyId::new(),
            rfc: "XIQB891116QE4".into(),
            legal_name: "XOCHILT CASAS CHAVEZ".into(),
            tax_regime: "612".into(),
            cfdi_use: "G03".into(),
            postal_code: "10740".into(),
        });
        save(&path, &repo).unwrap();

        assert!(!temp_path(&path).exists());
        assert_eq!(load(&path).unwrap().snapshot(), repo.snapshot());
    }

    #[test]
    fn corrupt_ledger_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("is not valid"));
    }
}
