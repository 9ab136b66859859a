//! Domain keyword table and scorer.
//!
//! Scoring is a pure function of the case-folded task text and an ordered
//! table of keyword lists. A Guardian's score is the number of its keywords
//! that occur in the text as substrings. The highest score wins; ties go to
//! the entry that appears first in the table. A zero score never wins.

/// Domain keywords of the canonical Guardians, in table order.
pub const DOMAIN_KEYWORDS: [(&str, &[&str]); 10] = [
    (
        "lyssandria",
        &[
            "database", "schema", "migration", "infrastructure", "storage", "foundation",
            "stability", "security", "persistence", "sql",
        ],
    ),
    (
        "leyla",
        &[
            "design", "creative", "create", "aesthetic", "visual", "style", "animation",
            "layout", "color", "flow",
        ],
    ),
    (
        "draconia",
        &[
            "performance", "optimize", "speed", "fast", "refactor", "execute", "power",
            "transform", "accelerate", "throughput", "latency",
        ],
    ),
    (
        "maylinn",
        &[
            "documentation", "communication", "writing", "write", "story", "content",
            "empathy", "heal", "community", "onboarding", "tutorial", "message",
        ],
    ),
    (
        "alera",
        &[
            "api", "interface", "public", "contract", "protocol", "naming", "voice",
            "expression", "truth", "endpoint", "specification",
        ],
    ),
    (
        "lyria",
        &[
            "debug", "investigate", "analyze", "crash", "insight", "vision", "pattern",
            "intuition", "diagnose", "bug", "logs", "trace",
        ],
    ),
    (
        "aiyami",
        &[
            "wisdom", "enlightenment", "crown", "philosophy", "principle", "holistic",
            "architecture", "mentor", "teach", "knowledge",
        ],
    ),
    (
        "elara",
        &[
            "shift", "perspective", "change", "transition", "pivot", "alternative", "reframe",
            "evolve", "rethink", "experiment",
        ],
    ),
    (
        "ino",
        &[
            "integration", "integrate", "merge", "collaborate", "unity", "partnership",
            "partner", "connect", "sync", "team", "bridge",
        ],
    ),
    (
        "shinkami",
        &[
            "orchestrate", "orchestration", "meta", "oversee", "consciousness", "source",
            "coordinate", "everything", "council", "cosmos",
        ],
    ),
];

/// Returns the canonical keyword list for a Guardian, empty if unknown.
#[must_use]
pub fn domain_keywords(guardian_id: &str) -> &'static [&'static str] {
    DOMAIN_KEYWORDS
        .iter()
        .find(|(id, _)| *id == guardian_id)
        .map_or(&[] as &[&str], |(_, keywords)| *keywords)
}

/// Returns the keywords that occur in `text_lower`, in list order.
///
/// `text_lower` must already be case-folded.
pub fn matched_keywords<'a, S>(text_lower: &str, keywords: &'a [S]) -> Vec<&'a str>
where
    S: AsRef<str>,
{
    keywords
        .iter()
        .map(AsRef::as_ref)
        .filter(|keyword| !keyword.is_empty() && text_lower.contains(keyword))
        .collect()
}

/// Picks the best-scoring entry for `text`.
///
/// Returns the winning entry's position and its matched keywords, or `None`
/// if no keyword of any entry occurs in the text.
pub fn best_match<'a, I, S>(text: &str, table: I) -> Option<(usize, Vec<String>)>
where
    I: IntoIterator<Item = &'a [S]>,
    S: AsRef<str> + 'a,
{
    let text_lower = text.to_lowercase();
    let mut best: Option<(usize, Vec<&str>)> = None;
    for (index, keywords) in table.into_iter().enumerate() {
        let matched = matched_keywords(&text_lower, keywords);
        let leads = best
            .as_ref()
            .map_or(!matched.is_empty(), |(_, current)| matched.len() > current.len());
        if leads {
            best = Some((index, matched));
        }
    }
    best.map(|(index, matched)| {
        (
            index,
            matched.into_iter().map(str::to_string).collect(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn canonical(text: &str) -> Option<&'static str> {
        best_match(text, DOMAIN_KEYWORDS.iter().map(|(_, k)| *k))
            .map(|(index, _)| DOMAIN_KEYWORDS[index].0)
    }

    #[test_case("database schema", "lyssandria"; "foundation")]
    #[test_case("Design a new color palette", "leyla"; "flow")]
    #[test_case("optimize the performance of the query", "draconia"; "fire")]
    #[test_case("write onboarding documentation", "maylinn"; "heart")]
    #[test_case("review the public API contract", "alera"; "voice")]
    #[test_case("debug the crash in the logs", "lyria"; "sight")]
    #[test_case("mentor the team on architecture principles", "aiyami"; "crown")]
    #[test_case("rethink our perspective and pivot", "elara"; "shift")]
    #[test_case("merge and integrate the partner feeds", "ino"; "unity")]
    #[test_case("orchestrate the council", "shinkami"; "source")]
    fn test_routes_to_domain(text: &str, expected: &str) {
        assert_eq!(canonical(text), Some(expected));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(canonical("hello there"), None);
        assert_eq!(canonical(""), None);
    }

    #[test]
    fn test_ties_go_to_table_order() {
        // One keyword each for lyssandria ("storage") and draconia ("speed").
        assert_eq!(canonical("speed up storage"), Some("lyssandria"));
    }

    #[test]
    fn test_matching_is_case_insensitive_and_substring() {
        let keywords = ["sql", "schema"];
        assert_eq!(matched_keywords("postgresql schemas", &keywords), vec!["sql", "schema"]);
        let (_, matched) = best_match("SCHEMA", [&keywords[..]]).unwrap();
        assert_eq!(matched, vec!["schema"]);
    }

    #[test]
    fn test_domain_keywords_lookup() {
        assert!(domain_keywords("draconia").contains(&"performance"));
        assert!(domain_keywords("unknown").is_empty());
    }

    #[test]
    fn test_every_canonical_guardian_has_keywords() {
        for guardian in crate::models::canonical_guardians() {
            assert!(!domain_keywords(&guardian.id).is_empty(), "{}", guardian.id);
        }
    }
}
