//! Sales tax resolution
//!
//! A location resolves to a combined sales tax percentage with a provenance
//! label. Resolution never fails: the county rate is preferred, then the
//! region rate, then the configured default.
//!
//! ## Rate tables
//!
//! Tables are loaded with a two-layer resolution:
//! 1. `PLATE_TAX_RATES`, or ~/.local/share/plate/config/tax_rates.toml
//! 2. Fall back to the embedded table (compiled into binary)

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::geocode::Geocoder;
use crate::places::county_name;

/// Embedded default tables (compiled into binary)
const DEFAULT_TABLE: &str = include_str!("../../../config/tax_rates.toml");

/// Region and county sales tax rates, in percent
#[derive(Debug, Clone, PartialEq)]
pub struct TaxRateTable {
    default_rate: f64,
    regions: HashMap<String, f64>,
    counties: HashMap<String, HashMap<String, f64>>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    default_rate: Option<f64>,
    #[serde(default)]
    regions: HashMap<String, f64>,
    #[serde(default)]
    counties: HashMap<String, HashMap<String, f64>>,
}

impl TaxRateTable {
    /// Rate used when no table has an entry
    pub const FALLBACK_RATE: f64 = 9.5;

    /// The table compiled into the binary
    pub fn embedded() -> Result<Self> {
        Self::parse(DEFAULT_TABLE)
    }

    /// Load the override table if one exists, else the embedded one
    pub fn load() -> Result<Self> {
        match override_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Self::embedded(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::InvalidData(format!(
                "Failed to read tax rates {}: {}",
                path.display(),
                e
            ))
        })?;
        debug!(path = %path.display(), "Loaded tax rate override");
        Self::parse(&content)
    }

    /// Parse a TOML table, rejecting negative or non-finite rates
    pub fn parse(content: &str) -> Result<Self> {
        let raw: RawTable = toml::from_str(content)
            .map_err(|e| Error::InvalidData(format!("Invalid tax rate TOML: {}", e)))?;

        let default_rate = raw.default_rate.unwrap_or(Self::FALLBACK_RATE);
        check_rate("default_rate", default_rate)?;

        let mut regions = HashMap::with_capacity(raw.regions.len());
        for (region, rate) in raw.regions {
            check_rate(&region, rate)?;
            regions.insert(region.trim().to_uppercase(), rate);
        }

        let mut counties = HashMap::with_capacity(raw.counties.len());
        for (region, table) in raw.counties {
            for (county, rate) in &table {
                check_rate(&format!("{}/{}", region, county), *rate)?;
            }
            counties.insert(region.trim().to_uppercase(), table);
        }

        Ok(Self {
            default_rate,
            regions,
            counties,
        })
    }

    pub fn default_rate(&self) -> f64 {
        self.default_rate
    }

    /// Rate for an (uppercase) region code
    pub fn region_rate(&self, region: &str) -> Option<f64> {
        self.regions.get(region).copied()
    }

    /// Rate for a county; county names match exactly
    pub fn county_rate(&self, region: &str, county: &str) -> Option<f64> {
        self.counties.get(region)?.get(county).copied()
    }

    /// All (region, county, rate) entries
    pub fn county_entries(&self) -> impl Iterator<Item = (&str, &str, f64)> {
        self.counties.iter().flat_map(|(region, table)| {
            table
                .iter()
                .map(move |(county, rate)| (region.as_str(), county.as_str(), *rate))
        })
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }
}

fn check_rate(name: &str, rate: f64) -> Result<()> {
    if !rate.is_finite() || rate < 0.0 {
        return Err(Error::InvalidData(format!(
            "Tax rate for {} must be a non-negative number, got {}",
            name, rate
        )));
    }
    Ok(())
}

/// Default tax table override path
pub fn default_table_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("plate").join("config").join("tax_rates.toml"))
}

fn override_path() -> Option<PathBuf> {
    std::env::var_os("PLATE_TAX_RATES")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(default_table_path)
}

/// How a rate was determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateSource {
    County { county: String },
    Region,
    Default,
}

/// A resolved rate and where it came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxResolution {
    /// Percentage, e.g. 9.5 for 9.5%
    pub rate: f64,
    pub source: RateSource,
    /// Human-readable provenance
    pub label: String,
}

impl TaxResolution {
    pub fn county(rate: f64, county: &str) -> Self {
        Self {
            rate,
            source: RateSource::County {
                county: county.to_string(),
            },
            label: format!("{} County", county),
        }
    }

    pub fn region(rate: f64) -> Self {
        Self {
            rate,
            source: RateSource::Region,
            label: "State rate - county rate not available".to_string(),
        }
    }

    pub fn fallback(rate: f64) -> Self {
        Self {
            rate,
            source: RateSource::Default,
            label: "Tax rate not found".to_string(),
        }
    }

    /// Whether the rate came from the most precise table
    pub fn is_precise(&self) -> bool {
        matches!(self.source, RateSource::County { .. })
    }
}

impl fmt::Display for TaxResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sales Tax: {:.2}% ({})", self.rate, self.label)
    }
}

/// Maps a (city, region) location to a sales tax rate
#[derive(Clone)]
pub struct TaxResolver {
    table: Arc<TaxRateTable>,
    geocoder: Option<Arc<dyn Geocoder>>,
}

impl TaxResolver {
    /// Resolver that only uses region rates
    pub fn new(table: Arc<TaxRateTable>) -> Self {
        Self {
            table,
            geocoder: None,
        }
    }

    /// Resolver that geocodes the city to find county rates
    pub fn with_geocoder(table: Arc<TaxRateTable>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self {
            table,
            geocoder: Some(geocoder),
        }
    }

    pub fn table(&self) -> &TaxRateTable {
        &self.table
    }

    pub fn has_geocoder(&self) -> bool {
        self.geocoder.is_some()
    }

    /// Resolve a location to a rate; never fails
    pub async fn resolve(&self, city: &str, region: &str) -> TaxResolution {
        let region = region.trim().to_uppercase();

        if let Some(county) = self.find_county(city, &region).await {
            if let Some(rate) = self.table.county_rate(&region, &county) {
                debug!(region = %region, county = %county, rate, "County tax rate");
                return TaxResolution::county(rate, &county);
            }
            debug!(region = %region, county = %county, "No county rate, using region rate");
        }

        match self.table.region_rate(&region) {
            Some(rate) => TaxResolution::region(rate),
            None => {
                warn!(region = %region, "Unknown region, using default tax rate");
                TaxResolution::fallback(self.table.default_rate())
            }
        }
    }

    async fn find_county(&self, city: &str, region: &str) -> Option<String> {
        let geocoder = self.geocoder.as_ref()?;
        let address = format!("{}, {}", city.trim(), region);
        match geocoder.geocode(&address).await {
            Ok(components) => county_name(&components),
            Err(e) => {
                warn!(address = %address, "County lookup failed: {}", e);
                None
            }
        }
    }
}
