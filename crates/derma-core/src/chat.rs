//! Scripted chat replies.
//!
//! Keyword-matched canned responses with a random fallback. Prior
//! history is never consulted.

use crate::catalog::catalog;
use rand::seq::SliceRandom;
use rand::Rng;

/// Produce a reply for one user message. The first catalog entry with a
/// matching keyword wins; otherwise a fallback is chosen at random.
pub fn scripted_reply<R: Rng + ?Sized>(message: &str, rng: &mut R) -> String {
    let script = &catalog().chat;
    let lower = message.to_lowercase();

    for entry in &script.replies {
        if entry
            .contains
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()))
        {
            return entry.reply.clone();
        }
    }

    script.fallbacks.choose(rng).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_keyword_reply_matches() {
        let mut rng = StdRng::seed_from_u64(1);
        let reply = scripted_reply("Do I really need sunscreen every day?", &mut rng);
        assert!(reply.contains("SPF 50"));
    }

    #[test]
    fn test_keyword_match_is_case_insensitive() {
        let mut rng = StdRng::seed_from_u64(1);
        let reply = scripted_reply("SUNSCREEN???", &mut rng);
        assert!(reply.contains("SPF 50"));
    }

    #[test]
    fn test_first_matching_entry_wins() {
        let mut rng = StdRng::seed_from_u64(1);
        // "routine" appears before "acne" in the script.
        let reply = scripted_reply("what routine helps acne", &mut rng);
        assert!(reply.contains("routine"));
    }

    #[test]
    fn test_unmatched_message_gets_a_fallback() {
        let mut rng = StdRng::seed_from_u64(5);
        let reply = scripted_reply("zzzzzz", &mut rng);
        assert!(catalog().chat.fallbacks.contains(&reply));
    }

    #[test]
    fn test_doctor_question_points_to_a_dermatologist() {
        let mut rng = StdRng::seed_from_u64(1);
        let reply = scripted_reply("should I see a doctor about this?", &mut rng);
        assert!(reply.contains("dermatologist"));
    }
}
