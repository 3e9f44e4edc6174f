use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    pub ticker: String,
    #[serde(default)]
    pub expiry: Option<String>,
    #[serde(default)]
    pub notes: String,
}

pub type Watchlist = BTreeMap<String, WatchlistEntry>;

/// JSON file of watched tickers, keyed by ticker.
///
/// Each mutation rewrites the whole file; two processes writing at once may
/// lose one of the updates.
#[derive(Debug, Clone)]
pub struct WatchlistStore {
    path: PathBuf,
}

impl WatchlistStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file reads as an empty watchlist
    pub fn load(&self) -> Result<Watchlist> {
        if !self.path.exists() {
            return Ok(Watchlist::new());
        }

        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if text.trim().is_empty() {
            return Ok(Watchlist::new());
        }

        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    pub fn get(&self, ticker: &str) -> Result<Option<WatchlistEntry>> {
        Ok(self.load()?.remove(ticker))
    }

    pub fn upsert(&self, entry: WatchlistEntry) -> Result<Watchlist> {
        let mut watchlist = self.load()?;
        watchlist.insert(entry.ticker.clone(), entry);
        self.save(&watchlist)?;
        Ok(watchlist)
    }

    /// Returns whether the ticker was present
    pub fn remove(&self, ticker: &str) -> Result<bool> {
        let mut watchlist = self.load()?;
        let removed = watchlist.remove(ticker).is_some();
        if removed {
            self.save(&watchlist)?;
        }
        Ok(removed)
    }

    /// Temp file in the same directory, then rename over the target
    fn save(&self, watchlist: &Watchlist) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).context("Failed to create temp watchlist")?;
        tmp.write_all(serde_json::to_string_pretty(watchlist)?.as_bytes())
            .context("Failed to write temp watchlist")?;
        tmp.as_file().sync_all().context("Failed to sync temp watchlist")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), entries = watchlist.len(), "Watchlist saved");
        Ok(())
    }
}
