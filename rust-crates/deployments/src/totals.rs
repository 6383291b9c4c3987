// Client-side running totals of claimed rewards, keyed by wallet address.
// Display state only: nothing here is reconciled against the ledger.
use anyhow::{
    Context,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    collections::BTreeMap,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

const TOTALS_FILE: &str = "claimed_totals.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct TotalsFile {
    #[serde(default)]
    totals: BTreeMap<String, u128>,
}

#[derive(Clone, Debug)]
pub struct ClaimedTotalsStore {
    path: PathBuf,
}

impl ClaimedTotalsStore {
    pub fn new(env_dir: impl AsRef<Path>) -> Self {
        Self {
            path: env_dir.as_ref().join(TOTALS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cumulative base units claimed by `address`, zero when unknown.
    pub fn total_for(&self, address: &str) -> Result<u128> {
        let file = self.read()?;
        Ok(file.totals.get(&key(address)).copied().unwrap_or_default())
    }

    /// Adds `amount` to the running total and returns the new value.
    pub fn add(&self, address: &str, amount: u128) -> Result<u128> {
        let mut file = self.read()?;
        let entry = file.totals.entry(key(address)).or_default();
        *entry = entry.saturating_add(amount);
        let updated = *entry;
        self.write(&file)?;
        Ok(updated)
    }

    fn read(&self) -> Result<TotalsFile> {
        if !self.path.exists() {
            return Ok(TotalsFile::default());
        }
        let data = fs::read(&self.path).with_context(|| {
            format!("Failed to read claimed totals at {}", self.path.display())
        })?;
        if data.is_empty() || data.iter().all(u8::is_ascii_whitespace) {
            return Ok(TotalsFile::default());
        }
        serde_json::from_slice(&data).context("Failed to parse claimed totals JSON")
    }

    fn write(&self, file: &TotalsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create directory {}", parent.display())
            })?;
        }
        let json = serde_json::to_vec_pretty(file)
            .context("Failed to serialize claimed totals")?;
        fs::write(&self.path, json).context("Failed to write claimed totals")
    }
}

fn key(address: &str) -> String {
    address.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn total_for__is_zero_for_unknown_wallet() {
        let dir = TempDir::new("totals").unwrap();
        let store = ClaimedTotalsStore::new(dir.path());

        assert_eq!(store.total_for("0xabc").unwrap(), 0);
    }

    #[test]
    fn add__accumulates_per_wallet_and_survives_reopen() {
        // given
        let dir = TempDir::new("totals").unwrap();
        let store = ClaimedTotalsStore::new(dir.path());

        // when
        store.add("0xAbC", 5).unwrap();
        store.add("0xabc", 7).unwrap();
        store.add("0xdef", 1).unwrap();

        // then
        let reopened = ClaimedTotalsStore::new(dir.path());
        assert_eq!(reopened.total_for("0xABC").unwrap(), 12);
        assert_eq!(reopened.total_for("0xdef").unwrap(), 1);
    }

    #[test]
    fn add__handles_amounts_beyond_u64() {
        let dir = TempDir::new("totals").unwrap();
        let store = ClaimedTotalsStore::new(dir.path());
        let large = 40 * 10u128.pow(18);

        let total = store.add("0x1", large).unwrap();

        assert_eq!(total, large);
        assert_eq!(store.total_for("0x1").unwrap(), large);
    }
}
