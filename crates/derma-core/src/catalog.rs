//! Analysis catalog.
//!
//! Brain label pools, the routine template, and the chat script are data,
//! not code: they live in `contrib/catalog.toml`, embedded at compile time
//! and parsed once on first use.

use crate::types::SkinType;
use serde::Deserialize;
use std::sync::OnceLock;

const CATALOG_TOML: &str = include_str!("../../../contrib/catalog.toml");

static CATALOG: OnceLock<Catalog> = OnceLock::new();

#[derive(Debug, Deserialize)]
pub struct Catalog {
    pub brains: Brains,
    pub routine: RoutineTemplate,
    pub chat: ChatScript,
}

#[derive(Debug, Deserialize)]
pub struct Brains {
    pub primary: BrainProfile,
    pub secondary: BrainProfile,
}

/// Pools and ranges one mock brain draws from.
#[derive(Debug, Deserialize)]
pub struct BrainProfile {
    pub skin_types: Vec<SkinType>,
    pub issues: Vec<String>,
    pub issues_per_report: usize,
    pub confidence_min: u8,
    pub confidence_max: u8,
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct RoutineTemplate {
    pub morning: Vec<String>,
    pub evening: Vec<String>,
    #[serde(default)]
    pub extras: Vec<ExtraStep>,
}

/// A conditional routine step. Applies when the assessment matches the
/// skin type, or when any issue label contains `issue_contains`
/// (case-insensitive).
#[derive(Debug, Deserialize)]
pub struct ExtraStep {
    pub issue_contains: Option<String>,
    pub skin_type: Option<SkinType>,
    pub slot: Slot,
    pub step: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Morning,
    Evening,
    Both,
}

#[derive(Debug, Deserialize)]
pub struct ChatScript {
    pub fallbacks: Vec<String>,
    #[serde(default)]
    pub replies: Vec<KeywordReply>,
}

/// First entry whose keyword matches the message wins.
#[derive(Debug, Deserialize)]
pub struct KeywordReply {
    pub contains: Vec<String>,
    pub reply: String,
}

/// The parsed embedded catalog.
pub fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(|| {
        toml::from_str(CATALOG_TOML).expect("embedded catalog is valid TOML")
    })
}
