//! Saved (tax rate, tip) combinations
//!
//! Stored as `{"taxTipFavorites": [{"tax": 9.5, "tip": 18}]}`. The file is
//! read once when opened and rewritten atomically on every change.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::planner::round_cents;

/// A saved tax/tip pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FavoriteCombo {
    /// Tax rate in percent, rounded to two decimals
    pub tax: f64,
    pub tip: u8,
}

impl FavoriteCombo {
    pub fn new(tax: f64, tip: u8) -> Self {
        Self {
            tax: round_cents(tax),
            tip,
        }
    }

    fn same_as(&self, other: &FavoriteCombo) -> bool {
        (self.tax * 100.0).round() as i64 == (other.tax * 100.0).round() as i64
            && self.tip == other.tip
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FavoritesDocument {
    #[serde(rename = "taxTipFavorites", default)]
    favorites: Vec<FavoriteCombo>,
}

/// File-backed list of favorites
#[derive(Debug)]
pub struct FavoritesStore {
    path: PathBuf,
    favorites: Vec<FavoriteCombo>,
}

impl FavoritesStore {
    /// Open the store at `path`; a missing file is an empty store
    pub fn open(path: &Path) -> Result<Self> {
        let favorites = if path.exists() {
            let content = fs::read_to_string(path)?;
            if content.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str::<FavoritesDocument>(&content)
                    .map_err(|e| {
                        Error::InvalidData(format!(
                            "Invalid favorites file {}: {}",
                            path.display(),
                            e
                        ))
                    })?
                    .favorites
            }
        } else {
            Vec::new()
        };

        debug!(path = %path.display(), count = favorites.len(), "Opened favorites");
        Ok(Self {
            path: path.to_path_buf(),
            favorites,
        })
    }

    /// Open the store in the default data directory
    pub fn open_default() -> Result<Self> {
        let path = default_favorites_path()
            .ok_or_else(|| Error::InvalidData("No data directory available".into()))?;
        Self::open(&path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn list(&self) -> &[FavoriteCombo] {
        &self.favorites
    }

    /// Save a combination; returns false if an identical one already exists
    pub fn add(&mut self, tax: f64, tip: u8) -> Result<bool> {
        if !tax.is_finite() || tax < 0.0 {
            return Err(Error::InvalidInput(format!("Invalid tax rate: {}", tax)));
        }
        if tip > 100 {
            return Err(Error::InvalidInput(
                "Tip percentage must be between 0 and 100".into(),
            ));
        }

        let combo = FavoriteCombo::new(tax, tip);
        if self.favorites.iter().any(|f| f.same_as(&combo)) {
            return Ok(false);
        }
        self.favorites.push(combo);
        self.save()?;
        Ok(true)
    }

    /// Favorite at `index`, for applying its tip to a form
    pub fn get(&self, index: usize) -> Result<FavoriteCombo> {
        self.favorites
            .get(index)
            .copied()
            .ok_or_else(|| Error::NotFound(format!("favorite #{}", index)))
    }

    pub fn remove(&mut self, index: usize) -> Result<FavoriteCombo> {
        if index >= self.favorites.len() {
            return Err(Error::NotFound(format!("favorite #{}", index)));
        }
        let removed = self.favorites.remove(index);
        self.save()?;
        Ok(removed)
    }

    fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let document = FavoritesDocument {
            favorites: self.favorites.clone(),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(serde_json::to_string_pretty(&document)?.as_bytes())?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

/// Default favorites file
pub fn default_favorites_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("plate").join("favorites.json"))
}
