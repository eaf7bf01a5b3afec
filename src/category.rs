//! Category normalization.
//!
//! Analyzer backends and upstream list documents produce free-form category
//! names; this module folds them onto the fixed set the catalog publishes.

/// The standard category identifiers, in display order.
pub const STANDARD_CATEGORIES: [&str; 8] = [
    "development",
    "data",
    "web",
    "productivity",
    "ai",
    "media",
    "trading",
    "communication",
];

/// Exact aliases for category names that upstream sources commonly emit.
const ALIASES: [(&str, &str); 5] = [
    ("health", "data"),
    ("healthcare", "data"),
    ("cloud storage", "data"),
    ("video", "media"),
    ("automation", "productivity"),
];

/// Keyword fuzzy-match rules, applied in order; first hit wins.
const KEYWORD_RULES: [(&[&str], &str); 8] = [
    (
        &["art", "music", "video", "image", "design", "photo", "media", "creative"],
        "media",
    ),
    (
        &["trade", "finance", "crypto", "bitcoin", "exchange", "payment", "money"],
        "trading",
    ),
    (
        &["chat", "email", "message", "social", "slack", "discord", "telegram"],
        "communication",
    ),
    (
        &["search", "browser", "scrape", "crawl", "http", "url", "web"],
        "web",
    ),
    (
        &["database", "sql", "storage", "analytics", "data"],
        "data",
    ),
    (
        &["llm", "machine learning", "neural", "gpt", "openai", "anthropic"],
        "ai",
    ),
    (
        &["calendar", "todo", "note", "task", "workflow", "automat"],
        "productivity",
    ),
    (
        &["code", "dev", "git", "docker", "deploy", "ci", "test"],
        "development",
    ),
];

/// Normalize a raw category name onto the standard set.
///
/// Lowercases and trims, passes standard names through, applies exact
/// aliases, then keyword rules, and falls back to `development`.
pub fn clean_category(raw: &str) -> &'static str {
    let normalized = raw.trim().to_lowercase();

    if let Some(std) = STANDARD_CATEGORIES.iter().find(|c| **c == normalized) {
        return *std;
    }

    for (alias, target) in ALIASES {
        if alias == normalized {
            return target;
        }
    }

    for (keywords, target) in KEYWORD_RULES {
        for kw in keywords {
            if normalized.contains(kw) {
                return target;
            }
        }
    }

    "development"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_category_passes_through() {
        assert_eq!(clean_category("ai"), "ai");
        assert_eq!(clean_category("  Development "), "development");
    }

    #[test]
    fn exact_alias_applies() {
        assert_eq!(clean_category("healthcare"), "data");
        assert_eq!(clean_category("Cloud Storage"), "data");
    }

    #[test]
    fn keyword_rules_match_in_order() {
        assert_eq!(clean_category("Image Generation"), "media");
        assert_eq!(clean_category("crypto exchange tools"), "trading");
        assert_eq!(clean_category("web scraping"), "web");
    }

    #[test]
    fn unknown_falls_back_to_development() {
        assert_eq!(clean_category("quantum basket weaving"), "development");
        assert_eq!(clean_category(""), "development");
    }
}
