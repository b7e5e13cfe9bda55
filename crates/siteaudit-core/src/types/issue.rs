//! Content issue classification enums.
//!
//! These are shared by the analyzer contract and the persisted `issues`
//! table, so they live here rather than in the entity crate.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of text-quality problem found on a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "issue_type", rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    /// Spelling, grammar or punctuation mistakes.
    Grammar,
    /// The same statement repeated without adding information.
    Redundancy,
    /// Statements that conflict with each other.
    Contradiction,
    /// Leftover template or lorem-ipsum text.
    Placeholder,
    /// Missing or near-empty content.
    Empty,
}

impl IssueType {
    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grammar => "grammar",
            Self::Redundancy => "redundancy",
            Self::Contradiction => "contradiction",
            Self::Placeholder => "placeholder",
            Self::Empty => "empty",
        }
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IssueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grammar" | "spelling" => Ok(Self::Grammar),
            "redundancy" | "redundant" => Ok(Self::Redundancy),
            "contradiction" | "contradictory" => Ok(Self::Contradiction),
            "placeholder" => Ok(Self::Placeholder),
            "empty" => Ok(Self::Empty),
            other => Err(format!("unknown issue type '{other}'")),
        }
    }
}

/// Severity of a detected issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "issue_severity", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    /// Cosmetic.
    Low,
    /// Noticeable to readers.
    Medium,
    /// Misleading or broken content.
    High,
}

impl IssueSeverity {
    /// Return the severity as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for IssueSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for IssueSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "minor" => Ok(Self::Low),
            "medium" | "moderate" => Ok(Self::Medium),
            "high" | "major" | "critical" => Ok(Self::High),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}
