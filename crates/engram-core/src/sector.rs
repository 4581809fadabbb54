//! Sector Registry
//!
//! The five fixed memory subspaces. Each memory carries one vector per
//! sector; the sector of record (`primary_sector`) controls its decay rate.
//!
//! The registry is immutable at runtime. Configuration overrides live in
//! [`crate::config::DecayConfig`], not here.

use serde::{Deserialize, Serialize};

// ============================================================================
// SECTOR ENUM
// ============================================================================

/// One of the five fixed memory subspaces, in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Sector {
    /// Autobiographical events; decays fastest
    Episodic,
    /// Facts and concepts; decays slowest
    #[default]
    Semantic,
    /// How-to knowledge
    Procedural,
    /// Affect-laden experiences
    Emotional,
    /// Self-referential observations
    Reflective,
}

/// All sectors in canonical order
pub const SECTORS: [Sector; 5] = [
    Sector::Episodic,
    Sector::Semantic,
    Sector::Procedural,
    Sector::Emotional,
    Sector::Reflective,
];

impl Sector {
    /// All sectors in canonical order
    pub fn all() -> [Sector; 5] {
        SECTORS
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Episodic => "episodic",
            Sector::Semantic => "semantic",
            Sector::Procedural => "procedural",
            Sector::Emotional => "emotional",
            Sector::Reflective => "reflective",
        }
    }

    /// Parse from string name; unknown names map to None
    pub fn parse_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "episodic" => Some(Sector::Episodic),
            "semantic" => Some(Sector::Semantic),
            "procedural" => Some(Sector::Procedural),
            "emotional" => Some(Sector::Emotional),
            "reflective" => Some(Sector::Reflective),
            _ => None,
        }
    }

    /// Default decay multiplier for this sector
    ///
    /// Episodic memories fade quickly; semantic knowledge persists.
    pub fn default_multiplier(&self) -> f64 {
        match self {
            Sector::Episodic => 1.5,
            Sector::Semantic => 0.5,
            Sector::Procedural => 0.7,
            Sector::Emotional => 1.2,
            Sector::Reflective => 0.8,
        }
    }

    /// Stable index of the sector in canonical order
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// TESTS
// ============================================================================
