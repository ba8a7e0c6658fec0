//! Skincare routine templater.

use crate::catalog::{catalog, ExtraStep, Slot};
use crate::types::Assessment;
use serde::{Deserialize, Serialize};

/// Routine steps keyed by time of day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutinePlan {
    pub morning: Vec<String>,
    pub evening: Vec<String>,
}

/// Build a routine for an assessment: the fixed base steps per time of
/// day, plus catalog extras keyed on detected issues and skin type.
pub fn build(assessment: &Assessment) -> RoutinePlan {
    let template = &catalog().routine;
    let mut plan = RoutinePlan {
        morning: template.morning.clone(),
        evening: template.evening.clone(),
    };

    for extra in &template.extras {
        if !applies(extra, assessment) {
            continue;
        }
        match extra.slot {
            Slot::Morning => push_unique(&mut plan.morning, &extra.step),
            Slot::Evening => push_unique(&mut plan.evening, &extra.step),
            Slot::Both => {
                push_unique(&mut plan.morning, &extra.step);
                push_unique(&mut plan.evening, &extra.step);
            }
        }
    }

    plan
}

fn applies(extra: &ExtraStep, assessment: &Assessment) -> bool {
    if extra.skin_type == Some(assessment.skin_type) {
        return true;
    }
    if let Some(needle) = &extra.issue_contains {
        let needle = needle.to_lowercase();
        return assessment
            .issues
            .iter()
            .any(|issue| issue.to_lowercase().contains(&needle));
    }
    false
}

fn push_unique(steps: &mut Vec<String>, step: &str) {
    if !steps.iter().any(|s| s == step) {
        steps.push(step.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SkinType;

    fn assessment(skin: SkinType, issues: &[&str]) -> Assessment {
        Assessment {
            skin_type: skin,
            issues: issues.iter().map(|s| s.to_string()).collect(),
            confidence: 70,
            doctor_flag: false,
            notes: "x".into(),
        }
    }

    #[test]
    fn test_base_template_always_present() {
        let plan = build(&assessment(SkinType::Uncertain, &[]));
        let template = &catalog().routine;
        assert_eq!(plan.morning, template.morning);
        assert_eq!(plan.evening, template.evening);
    }

    #[test]
    fn test_acne_adds_evening_spot_treatment() {
        let plan = build(&assessment(SkinType::Normal, &["Mild acne"]));
        assert!(plan.evening.iter().any(|s| s.contains("Salicylic")));
        assert!(!plan.morning.iter().any(|s| s.contains("Salicylic")));
    }

    #[test]
    fn test_issue_match_is_case_insensitive() {
        let plan = build(&assessment(SkinType::Normal, &["MILD ACNE"]));
        assert!(plan.evening.iter().any(|s| s.contains("Salicylic")));
    }

    #[test]
    fn test_dry_skin_gets_serum_both_slots() {
        let plan = build(&assessment(SkinType::Dry, &[]));
        assert!(plan.morning.iter().any(|s| s.contains("Hyaluronic")));
        assert!(plan.evening.iter().any(|s| s.contains("Hyaluronic")));
    }

    #[test]
    fn test_overlapping_triggers_never_duplicate_a_step() {
        // "Dry patches" issue and Dry skin type both select the serum.
        let plan = build(&assessment(SkinType::Dry, &["Dry patches"]));
        let count = plan
            .morning
            .iter()
            .filter(|s| s.contains("Hyaluronic"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_pigmentation_family_adds_vitamin_c_once() {
        let plan = build(&assessment(SkinType::Normal, &["Pigmentation", "Dullness", "Uneven tone"]));
        let count = plan
            .morning
            .iter()
            .filter(|s| s.contains("Vitamin C"))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_oily_skin_gets_morning_oil_control() {
        let plan = build(&assessment(SkinType::Oily, &[]));
        assert!(plan.morning.iter().any(|s| s.contains("niacinamide")));
        assert!(!plan.evening.iter().any(|s| s.contains("niacinamide")));
    }
}
