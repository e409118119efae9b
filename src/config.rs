//! Cascade configuration.
//!
//! A single `RetrievalConfig` is loaded from a TOML document once at run
//! start and passed by reference into each stage. Unknown keys are
//! ignored; missing keys fall back to the documented defaults, so an
//! empty (or absent) config file is valid.

use std::path::Path;

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    fusion::FusionWeights,
};

/// Top-level recognized-options document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Scout output bound.
    #[serde(rename = "K_A")]
    pub k_a: usize,
    /// Inspector output bound.
    #[serde(rename = "K_B")]
    pub k_b: usize,
    /// Judge output bound.
    #[serde(rename = "K_C")]
    pub k_c: usize,
    pub bm25: Bm25Config,
    pub dense: DenseConfig,
    pub fusion: FusionConfig,
    pub li: LateInteractionConfig,
    pub xenc: CrossEncoderConfig,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_a: 200,
            k_b: 50,
            k_c: 10,
            bm25: Bm25Config::default(),
            dense: DenseConfig::default(),
            fusion: FusionConfig::default(),
            li: LateInteractionConfig::default(),
            xenc: CrossEncoderConfig::default(),
        }
    }
}

/// Lexical (BM25) provider parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Bm25Config {
    /// Add Levenshtein-distance-1 fuzzy clauses for query terms of three
    /// characters or more.
    pub fuzzy: bool,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self { fuzzy: false }
    }
}

/// Dense provider parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DenseConfig {
    /// Dimension of the hashed bag-of-tokens embedding.
    pub dim: usize,
}

impl Default for DenseConfig {
    fn default() -> Self {
        Self { dim: 256 }
    }
}

/// Fusion method and weights for the Scout merge.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub method: String,
    pub weights: FusionWeights,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            method: "weighted_sum".to_string(),
            weights: FusionWeights::default(),
        }
    }
}

/// Late-interaction provider parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LateInteractionConfig {
    /// Maximum number of chunk tokens considered per chunk.
    pub max_len: usize,
}

impl Default for LateInteractionConfig {
    fn default() -> Self {
        Self { max_len: 512 }
    }
}

/// Cross-encoder provider parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrossEncoderConfig {
    /// Score contribution per query term found verbatim in the chunk.
    pub term_match_weight: f32,
    /// Scale applied to the character-overlap similarity term.
    pub overlap_weight: f32,
}

impl Default for CrossEncoderConfig {
    fn default() -> Self {
        Self {
            term_match_weight: 0.4,
            overlap_weight: 0.1,
        }
    }
}

impl RetrievalConfig {
    /// Load configuration from a TOML file, or the defaults when no path
    /// is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "cannot read config file {}: {e}",
                path.display()
            ))
        })?;

        toml::from_str(&raw).map_err(|e| {
            Error::Config(format!(
                "invalid config file {}: {e}",
                path.display()
            ))
        })
    }

    /// How many results each Scout provider is asked for. The merge, not
    /// the provider call, enforces the K_A bound, so the per-provider
    /// bound is deliberately generous.
    pub fn scout_provider_limit(&self) -> usize {
        self.k_a.saturating_mul(4).max(1)
    }
}
