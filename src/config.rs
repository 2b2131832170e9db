//! Construction settings for outranking digraphs.
//!
//! Every field has a default, so a config file only needs to name what it
//! overrides:
//!
//! ```toml
//! normalized = false
//! ndigits = 2
//! polarization = "electre"
//!
//! [threading]
//! enabled = true
//! start_method = "forkserver"
//! nbr_cores = 4
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OutrankingError, Result};
use crate::valuation::MAX_NDIGITS;

/// Which polarization model turns the concordance into the final outranking value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarization {
    /// Bipolar disjunction of concordance, vetoes and counter-vetoes.
    #[default]
    Bipolar,
    /// Classical veto: a strong veto caps the concordance at the minimum.
    Electre,
    /// Plain concordance, no veto handling at all.
    NoVeto,
}

impl Polarization {
    /// Map the legacy `bipolarVeto` / `hasNoVeto` flag pair onto a variant.
    /// `has_no_veto` wins when both are set.
    pub fn from_flags(bipolar_veto: bool, has_no_veto: bool) -> Self {
        if has_no_veto {
            Self::NoVeto
        } else if bipolar_veto {
            Self::Bipolar
        } else {
            Self::Electre
        }
    }

    pub fn has_vetoes(self) -> bool {
        !matches!(self, Self::NoVeto)
    }

    pub fn has_counter_vetoes(self) -> bool {
        matches!(self, Self::Bipolar)
    }
}

/// How a criterion missing an evaluation on either side of a pair is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingData {
    /// Drop the criterion and re-normalize over the criteria evaluated on both sides.
    #[default]
    Skip,
    /// Count half of the weight for and half against; the normalizer keeps the full weight sum.
    HalfWeight,
}

/// Scheduling flavour of the parallel driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartMethod {
    /// A dedicated worker pool is created for the build and torn down afterwards.
    #[default]
    Spawn,
    /// Workers run on the process-global pool.
    Fork,
    /// A lazily created process-wide pool is reused across builds.
    Forkserver,
}

impl StartMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Spawn => "spawn",
            Self::Fork => "fork",
            Self::Forkserver => "forkserver",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadingConfig {
    pub enabled: bool,
    pub start_method: StartMethod,
    /// Upper bound on workers; `None` uses the host's available parallelism.
    pub nbr_cores: Option<usize>,
    /// Parent directory for scratch artifacts; `None` uses the system temp dir.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ThreadingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            start_method: StartMethod::Spawn,
            nbr_cores: None,
            temp_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutrankingConfig {
    /// `true` yields valuations in [-1, 1]; `false` in [-W, W] with W the weight sum.
    pub normalized: bool,
    /// Decimal digits kept in every characteristic value.
    pub ndigits: u32,
    pub polarization: Polarization,
    /// Threshold reference `max(|a|, |b|)` when set, `|a|` otherwise.
    pub symmetric_thresholds: bool,
    pub missing_data: MissingData,
    pub actions_subset: Option<Vec<String>>,
    pub criteria_subset: Option<Vec<String>>,
    pub objectives_subset: Option<Vec<String>>,
    /// Row alternatives; defaults to every alternative.
    pub initial: Option<Vec<String>>,
    /// Column alternatives; defaults to every alternative.
    pub terminal: Option<Vec<String>>,
    pub threading: ThreadingConfig,
    pub with_concordance_relation: bool,
    pub with_veto_counts: bool,
}

impl Default for OutrankingConfig {
    fn default() -> Self {
        Self {
            normalized: true,
            ndigits: 4,
            polarization: Polarization::Bipolar,
            symmetric_thresholds: true,
            missing_data: MissingData::Skip,
            actions_subset: None,
            criteria_subset: None,
            objectives_subset: None,
            initial: None,
            terminal: None,
            threading: ThreadingConfig::default(),
            with_concordance_relation: true,
            with_veto_counts: true,
        }
    }
}

impl OutrankingConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| OutrankingError::Config(format!("failed to parse TOML config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| OutrankingError::Config(format!("failed to parse JSON config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ndigits > MAX_NDIGITS {
            return Err(OutrankingError::Config(format!(
                "ndigits must be at most {MAX_NDIGITS}, got {}",
                self.ndigits
            )));
        }
        Ok(())
    }

    /// Load from a `.toml` or `.json` file, chosen by extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| OutrankingError::Config(format!("failed to read {}: {e}", path.display())))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_toml_str(&raw),
        }
    }

    /// Ledgers that need cross-worker synchronization are dropped when threading.
    pub(crate) fn effective_ledgers(&self) -> (bool, bool) {
        if self.threading.enabled {
            (false, false)
        } else {
            (self.with_concordance_relation, self.with_veto_counts)
        }
    }

    pub fn with_polarization(mut self, polarization: Polarization) -> Self {
        self.polarization = polarization;
        self
    }

    pub fn with_normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    pub fn with_missing_data(mut self, missing_data: MissingData) -> Self {
        self.missing_data = missing_data;
        self
    }

    pub fn with_threading(mut self, threading: ThreadingConfig) -> Self {
        self.threading = threading;
        self
    }
}
