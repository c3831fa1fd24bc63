//! Common types used across the ledger

use serde::{Deserialize, Serialize};

/// Unit of account for a weight bucket or a warehouse section.
///
/// Kg-kind rows account in kilograms only; pair-kind rows carry an auxiliary
/// pair count alongside the weight, because weight alone does not capture
/// saleable units for goods sold as matched pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Kg,
    Pair,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Kg => "kg",
            UnitKind::Pair => "pair",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "kg" => Some(UnitKind::Kg),
            "pair" => Some(UnitKind::Pair),
            _ => None,
        }
    }
}

/// Lifecycle status of an import bag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BagStatus {
    Unopened,
    Opened,
}

impl BagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BagStatus::Unopened => "unopened",
            BagStatus::Opened => "opened",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "unopened" => Some(BagStatus::Unopened),
            "opened" => Some(BagStatus::Opened),
            _ => None,
        }
    }
}
