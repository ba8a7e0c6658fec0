//! Consensus merge of two brain assessments.

use crate::types::{Assessment, SkinType};

/// Confidence floor after the disagreement penalty.
const CONFIDENCE_FLOOR: i16 = 50;
/// Penalty applied when the two brains disagree on skin type.
const DISAGREEMENT_PENALTY: i16 = 10;

const CONSENSUS_NOTES: &str = "Consensus result from multiple AI models.";

/// Merge two assessments into one reported result.
///
/// Skin type is `a`'s when both agree, else `Uncertain`. Issues are the
/// union in first-seen order. Confidence is the truncated average, minus
/// the penalty on disagreement, floored at 50. Doctor flags OR together.
pub fn merge(a: &Assessment, b: &Assessment) -> Assessment {
    let same_skin = a.skin_type == b.skin_type;

    let mut confidence = (a.confidence as i16 + b.confidence as i16) / 2;
    if !same_skin {
        confidence -= DISAGREEMENT_PENALTY;
    }
    let confidence = confidence.max(CONFIDENCE_FLOOR) as u8;

    let mut issues = a.issues.clone();
    for issue in &b.issues {
        if !issues.contains(issue) {
            issues.push(issue.clone());
        }
    }

    Assessment {
        skin_type: if same_skin { a.skin_type } else { SkinType::Uncertain },
        issues,
        confidence,
        doctor_flag: a.doctor_flag || b.doctor_flag,
        notes: CONSENSUS_NOTES.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assessment(skin: SkinType, issues: &[&str], confidence: u8, doctor: bool) -> Assessment {
        Assessment {
            skin_type: skin,
            issues: issues.iter().map(|s| s.to_string()).collect(),
            confidence,
            doctor_flag: doctor,
            notes: "x".into(),
        }
    }

    #[test]
    fn test_agreement_keeps_skin_type_and_averages() {
        let a = assessment(SkinType::Oily, &["Mild acne"], 80, false);
        let b = assessment(SkinType::Oily, &["Redness"], 70, false);
        let merged = merge(&a, &b);
        assert_eq!(merged.skin_type, SkinType::Oily);
        assert_eq!(merged.confidence, 75);
        assert_eq!(merged.issues, vec!["Mild acne", "Redness"]);
        assert!(!merged.doctor_flag);
        assert_eq!(merged.notes, CONSENSUS_NOTES);
    }

    #[test]
    fn test_disagreement_goes_uncertain_with_penalty() {
        let a = assessment(SkinType::Dry, &[], 80, false);
        let b = assessment(SkinType::Oily, &[], 70, false);
        let merged = merge(&a, &b);
        assert_eq!(merged.skin_type, SkinType::Uncertain);
        // avg 75, minus 10
        assert_eq!(merged.confidence, 65);
    }

    #[test]
    fn test_confidence_floor_applies_after_penalty() {
        let a = assessment(SkinType::Dry, &[], 60, false);
        let b = assessment(SkinType::Oily, &[], 55, false);
        let merged = merge(&a, &b);
        // avg truncates to 57, penalty takes it to 47, floored at 50
        assert_eq!(merged.confidence, 50);
    }

    #[test]
    fn test_average_truncates_like_the_original() {
        let a = assessment(SkinType::Normal, &[], 71, false);
        let b = assessment(SkinType::Normal, &[], 70, false);
        assert_eq!(merge(&a, &b).confidence, 70);
    }

    #[test]
    fn test_issue_union_preserves_order_and_dedups() {
        let a = assessment(SkinType::Normal, &["Open pores", "Dullness"], 70, false);
        let b = assessment(SkinType::Normal, &["Dullness", "Redness"], 70, false);
        let merged = merge(&a, &b);
        assert_eq!(merged.issues, vec!["Open pores", "Dullness", "Redness"]);
    }

    #[test]
    fn test_doctor_flag_ors() {
        let a = assessment(SkinType::Normal, &[], 70, false);
        let b = assessment(SkinType::Normal, &[], 70, true);
        assert!(merge(&a, &b).doctor_flag);
        assert!(merge(&b, &a).doctor_flag);
    }
}
