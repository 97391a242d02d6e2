//! String synthesis for `pattern` constraints.
//!
//! Patterns are parsed with `regex-syntax` in ASCII mode first so `\d` and
//! `\w` stay ASCII, then in Unicode mode for patterns that need it.

use rand::Rng;
use rand_regex::Regex;
use regex_syntax::ParserBuilder;

use super::random_source::RandomSource;

/// Upper repeat count used for open-ended quantifiers.
const MAX_REPEAT: u32 = 8;

/// Generate a string matching `pattern`, or `None` if it does not compile.
pub fn generate_match(pattern: &str, rng: &mut RandomSource) -> Option<String> {
    let regex = compile(pattern)?;
    Some(rng.sample::<String, _>(&regex))
}

fn compile(pattern: &str) -> Option<Regex> {
    let body = strip_anchors(pattern);
    let hir = ParserBuilder::new()
        .unicode(false)
        .build()
        .parse(body)
        .or_else(|_| ParserBuilder::new().build().parse(body))
        .ok()?;
    let regex = Regex::with_hir(hir, MAX_REPEAT).ok()?;
    regex.is_utf8().then_some(regex)
}

/// JSON Schema patterns are unanchored; leading `^` and trailing `$` only
/// pin the whole value, which generation does anyway.
fn strip_anchors(pattern: &str) -> &str {
    let body = pattern.strip_prefix('^').unwrap_or(pattern);
    body.strip_suffix('$')
        .filter(|rest| !rest.ends_with('\\'))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_pattern() {
        let mut rng = RandomSource::seeded(1);
        assert_eq!(generate_match("^hello$", &mut rng).as_deref(), Some("hello"));
    }

    #[test]
    fn test_class_and_repetition() {
        let mut rng = RandomSource::seeded(2);
        let value = generate_match(r"^[A-Z]{3}-\d{4}$", &mut rng).unwrap();
        assert_eq!(value.len(), 8);
        let (letters, digits) = value.split_at(3);
        assert!(letters.chars().all(|c| c.is_ascii_uppercase()));
        assert!(digits.starts_with('-'));
        assert!(digits[1..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_range_quantifier_bounds() {
        let mut rng = RandomSource::seeded(3);
        for _ in 0..50 {
            let value = generate_match("x{2,4}", &mut rng).unwrap();
            assert!((2..=4).contains(&value.len()));
            assert!(value.chars().all(|c| c == 'x'));
        }
    }

    #[test]
    fn test_escaped_metacharacters() {
        let mut rng = RandomSource::seeded(4);
        assert_eq!(generate_match(r"a\.b\$", &mut rng).as_deref(), Some("a.b$"));
    }

    #[test]
    fn test_groups_and_alternation() {
        let mut rng = RandomSource::seeded(5);
        for _ in 0..20 {
            let value = generate_match("^(ab|cd)$", &mut rng).unwrap();
            assert!(value == "ab" || value == "cd");
        }
    }

    #[test]
    fn test_negated_class() {
        let mut rng = RandomSource::seeded(6);
        for _ in 0..20 {
            let value = generate_match("^[^x]$", &mut rng).unwrap();
            assert_eq!(value.chars().count(), 1);
            assert_ne!(value, "x");
        }
    }

    #[test]
    fn test_invalid_pattern_is_none() {
        let mut rng = RandomSource::seeded(7);
        assert!(generate_match("[abc", &mut rng).is_none());
        assert!(generate_match("*a", &mut rng).is_none());
    }

    #[test]
    fn test_seeded_output_repeats() {
        let a = generate_match(r"[a-z]{5}\d+", &mut RandomSource::seeded(9));
        let b = generate_match(r"[a-z]{5}\d+", &mut RandomSource::seeded(9));
        assert_eq!(a, b);
    }
}
