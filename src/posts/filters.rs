//! Junk docket-entry filter.
//!
//! Routine procedural entries (attorney appearances, disclosure statements
//! and the like) are filed constantly and are noise to followers, so the
//! resolver drops them before posting. The event row itself is still
//! created and resolved; only the posts are suppressed.

use regex::Regex;
use std::sync::OnceLock;

/// Entry descriptions matching this pattern are never posted.
const DO_NOT_POST_PATTERN: &str = r"(?i)pro hac vice|notice of appearance|certificate of disclosure|corporate disclosure|add and terminate|appearance of counsel|withdraw(al)? of (counsel|attorney)|summons issued";

fn do_not_post_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(DO_NOT_POST_PATTERN).expect("do-not-post pattern is valid"))
}

/// Returns true if the entry description is junk and must not be posted.
pub fn do_not_post(description: &str) -> bool {
    do_not_post_regex().is_match(description)
}
