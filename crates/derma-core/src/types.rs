use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Skin type label reported by a brain or the consensus merge.
///
/// `Uncertain` is only ever produced by the consensus merge when the two
/// brains disagree; it never appears in a catalog pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkinType {
    Oily,
    Dry,
    Combination,
    Normal,
    Sensitive,
    Uncertain,
}

impl SkinType {
    pub fn label(&self) -> &'static str {
        match self {
            SkinType::Oily => "Oily",
            SkinType::Dry => "Dry",
            SkinType::Combination => "Combination",
            SkinType::Normal => "Normal",
            SkinType::Sensitive => "Sensitive",
            SkinType::Uncertain => "Uncertain",
        }
    }
}

impl fmt::Display for SkinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown skin type: {0}")]
pub struct ParseSkinTypeError(pub String);

impl FromStr for SkinType {
    type Err = ParseSkinTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Oily" => Ok(SkinType::Oily),
            "Dry" => Ok(SkinType::Dry),
            "Combination" => Ok(SkinType::Combination),
            "Normal" => Ok(SkinType::Normal),
            "Sensitive" => Ok(SkinType::Sensitive),
            "Uncertain" => Ok(SkinType::Uncertain),
            other => Err(ParseSkinTypeError(other.to_string())),
        }
    }
}

/// One analysis result: what a brain fabricated, or what the consensus
/// merge made of two of them. This is the JSON payload shape returned
/// over D-Bus and the row shape stored per case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub skin_type: SkinType,
    /// Issue labels, order-preserving and duplicate-free.
    pub issues: Vec<String>,
    /// Confidence percent, 0–100.
    pub confidence: u8,
    /// Set when a dermatologist visit should be recommended.
    pub doctor_flag: bool,
    pub notes: String,
}

/// Which mock brain produced an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrainKind {
    Primary,
    Secondary,
}

impl BrainKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrainKind::Primary => "primary",
            BrainKind::Secondary => "secondary",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skin_type_display_from_str_roundtrip() {
        for skin in [
            SkinType::Oily,
            SkinType::Dry,
            SkinType::Combination,
            SkinType::Normal,
            SkinType::Sensitive,
            SkinType::Uncertain,
        ] {
            let parsed: SkinType = skin.to_string().parse().unwrap();
            assert_eq!(parsed, skin);
        }
    }

    #[test]
    fn test_skin_type_unknown_label_errors() {
        let err = "Radiant".parse::<SkinType>().unwrap_err();
        assert!(err.to_string().contains("Radiant"));
    }

    #[test]
    fn test_assessment_serializes_with_plain_labels() {
        let assessment = Assessment {
            skin_type: SkinType::Combination,
            issues: vec!["Mild acne".into(), "Dullness".into()],
            confidence: 72,
            doctor_flag: false,
            notes: "n".into(),
        };
        let json = serde_json::to_string(&assessment).unwrap();
        assert!(json.contains("\"Combination\""));
        assert!(json.contains("\"Mild acne\""));
        let back: Assessment = serde_json::from_str(&json).unwrap();
        assert_eq!(back.skin_type, SkinType::Combination);
        assert_eq!(back.confidence, 72);
    }
}
