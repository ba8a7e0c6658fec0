//! Mock analysis brains.
//!
//! Each brain fabricates an assessment by uniform random selection from
//! its catalog profile. Output never depends on the uploaded image — the
//! brains stand in for model calls that are not part of this system.

use crate::catalog::{catalog, BrainProfile};
use crate::types::{Assessment, BrainKind};
use rand::seq::SliceRandom;
use rand::Rng;

pub struct MockBrain {
    kind: BrainKind,
    profile: &'static BrainProfile,
}

impl MockBrain {
    /// The primary brain: full skin-type pool, surface-feature issues.
    pub fn primary() -> Self {
        Self {
            kind: BrainKind::Primary,
            profile: &catalog().brains.primary,
        }
    }

    /// The secondary brain used for cross-verification: narrower pools,
    /// slightly lower confidence range.
    pub fn secondary() -> Self {
        Self {
            kind: BrainKind::Secondary,
            profile: &catalog().brains.secondary,
        }
    }

    pub fn kind(&self) -> BrainKind {
        self.kind
    }

    /// Fabricate one assessment.
    pub fn assess<R: Rng + ?Sized>(&self, rng: &mut R) -> Assessment {
        let profile = self.profile;
        let skin_type = *profile
            .skin_types
            .choose(rng)
            .expect("catalog brain profile has skin types");
        let issues: Vec<String> = profile
            .issues
            .choose_multiple(rng, profile.issues_per_report)
            .cloned()
            .collect();

        Assessment {
            skin_type,
            issues,
            confidence: rng.gen_range(profile.confidence_min..=profile.confidence_max),
            doctor_flag: false,
            notes: profile.notes.clone(),
        }
    }
}
