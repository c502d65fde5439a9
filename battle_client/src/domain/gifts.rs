// Gift catalog: point values for named gifts used when scoring manually.

/// The gift the server flags as top tier.
pub const TOP_TIER_GIFT: &str = "Lion";

const GIFT_POINTS: &[(&str, u64)] = &[
    ("Rose", 1),
    ("TikTok", 1),
    ("Finger Heart", 5),
    ("Panda", 5),
    ("Ice Cream Cone", 5),
    ("Sunglasses", 10),
    ("Heart Me", 10),
    ("Rainbow Puke", 50),
    ("Drama Queen", 50),
    ("Interstellar", 100),
    ("Lion", 500),
    ("Universe", 1000),
];

pub fn gift_points(gift_name: &str) -> Option<u64> {
    GIFT_POINTS
        .iter()
        .find(|(name, _)| *name == gift_name)
        .map(|(_, points)| *points)
}

pub fn is_top_tier(gift_name: &str) -> bool {
    gift_name.eq_ignore_ascii_case(TOP_TIER_GIFT)
}

/// Catalog points win over the manual value when a known gift is named.
pub fn resolve_points(gift_name: Option<&str>, fallback: u64) -> u64 {
    gift_name.and_then(gift_points).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_gift_overrides_manual_points() {
        assert_eq!(resolve_points(Some("Lion"), 7), 500);
        assert_eq!(resolve_points(Some("Unknown Gift"), 7), 7);
        assert_eq!(resolve_points(None, 7), 7);
    }

    #[test]
    fn top_tier_match_ignores_case() {
        assert!(is_top_tier("lion"));
        assert!(!is_top_tier("Universe"));
    }
}
