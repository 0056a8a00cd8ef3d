//! Phone-number detection in free text.

use std::sync::LazyLock;

use regex::Regex;

/// Uzbek numbers with and without `+`, then any 9–12 digit run.
/// Alternatives are tried left to right at each position.
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\+998\d{9}|998\d{9}|\+?\d{9,12}").expect("phone pattern is valid")
});

/// Return the leftmost phone-shaped substring of `text`, verbatim.
pub fn extract_phone(text: &str) -> Option<&str> {
    PHONE_PATTERN.find(text).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn international_uzbek_number() {
        assert_eq!(
            extract_phone("mening raqamim +998901234567"),
            Some("+998901234567")
        );
    }

    #[test]
    fn bare_country_code_number() {
        assert_eq!(
            extract_phone("tel 998901234567 ga qo'ng'iroq qiling"),
            Some("998901234567")
        );
    }

    #[test]
    fn local_nine_digit_number() {
        assert_eq!(extract_phone("901234567 ga yozing"), Some("901234567"));
    }

    #[test]
    fn generic_plus_prefixed_number() {
        assert_eq!(extract_phone("call +77012345678"), Some("+77012345678"));
    }

    #[test]
    fn long_digit_run_is_capped_at_twelve() {
        assert_eq!(extract_phone("1234567890123"), Some("123456789012"));
    }

    #[test]
    fn leftmost_match_wins() {
        assert_eq!(
            extract_phone("901111111 yoki +998902222222"),
            Some("901111111")
        );
    }

    #[test]
    fn short_runs_are_ignored() {
        assert_eq!(extract_phone("12345678"), None);
        assert_eq!(extract_phone("soat 14:30 da"), None);
    }

    #[test]
    fn spaced_number_is_not_detected() {
        assert_eq!(extract_phone("+998 90 123 45 67"), None);
    }

    #[test]
    fn no_number() {
        assert_eq!(extract_phone("Chilonzordan taksi kerak"), None);
    }
}
