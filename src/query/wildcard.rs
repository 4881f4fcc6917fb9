//! Wildcard and list handling for identifier filters
//!
//! User-facing filters use `*` (zero or more characters) and `?` (exactly one
//! character), and may list alternatives separated by commas. SQL `LIKE` uses
//! `%` and `_` for the same purposes.

/// Characters users may type as wildcards
pub const USER_WILDCARDS: [char; 2] = ['*', '?'];

/// Characters `LIKE` treats as wildcards
pub const ENGINE_WILDCARDS: [char; 2] = ['%', '_'];

/// One alternative of a filter value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    /// Compared with `=`
    Exact(String),
    /// Compared with `LIKE`, already translated
    Pattern(String),
}

impl Term {
    pub fn as_str(&self) -> &str {
        match self {
            Term::Exact(s) | Term::Pattern(s) => s,
        }
    }
}

/// Whether the raw value uses `*` or `?`
pub fn has_user_wildcard(raw: &str) -> bool {
    raw.contains(&USER_WILDCARDS[..])
}

/// Whether the raw value contains `%` or `_`
pub fn has_engine_wildcard(raw: &str) -> bool {
    raw.contains(&ENGINE_WILDCARDS[..])
}

/// Translate `*` to `%` and `?` to `_`
pub fn translate(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '*' => '%',
            '?' => '_',
            other => other,
        })
        .collect()
}

/// Split a raw filter into its alternatives
///
/// Wildcards are translated before the split. A single value is a pattern
/// only when the user typed `*` or `?`. Inside a comma list every element
/// holding a `LIKE` token is a pattern, so raw `%`/`_` become patterns there.
pub fn parse_terms(raw: &str) -> Vec<Term> {
    let translated = translate(raw);

    if !translated.contains(',') {
        return if has_user_wildcard(raw) {
            vec![Term::Pattern(translated)]
        } else {
            vec![Term::Exact(translated)]
        };
    }

    translated
        .split(',')
        .map(|element| {
            if has_engine_wildcard(element) {
                Term::Pattern(element.to_string())
            } else {
                Term::Exact(element.to_string())
            }
        })
        .collect()
}

/// Match a value against a `*`/`?` pattern, outside of SQL
pub fn glob_match(pattern: &str, value: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let v: Vec<char> = value.chars().collect();

    let (mut pi, mut vi) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while vi < v.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == v[vi]) {
            pi += 1;
            vi += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = vi;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            vi = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_every_position() {
        assert_eq!(translate("RCM*"), "RCM%");
        assert_eq!(translate("?HZ"), "_HZ");
        assert_eq!(translate("*?*??"), "%_%__");
        assert_eq!(translate("UW"), "UW");
    }

    #[test]
    fn test_parse_single_terms() {
        assert_eq!(parse_terms("UW"), vec![Term::Exact("UW".into())]);
        assert_eq!(parse_terms("*"), vec![Term::Pattern("%".into())]);
        assert_eq!(parse_terms(""), vec![Term::Exact("".into())]);
    }

    #[test]
    fn test_parse_list_mixes_exact_and_pattern() {
        assert_eq!(
            parse_terms("MBW*,JCW"),
            vec![Term::Pattern("MBW%".into()), Term::Exact("JCW".into())]
        );
        assert_eq!(parse_terms("HHZ,EHZ,BH?").len(), 3);
    }

    #[test]
    fn test_raw_engine_tokens_pass_through() {
        // Unescaped either way: compared literally alone, as a pattern in a list
        assert_eq!(parse_terms("RC_"), vec![Term::Exact("RC_".into())]);
        assert_eq!(
            parse_terms("RC_,JCW"),
            vec![Term::Pattern("RC_".into()), Term::Exact("JCW".into())]
        );
        assert!(has_engine_wildcard("10%"));
        assert!(!has_engine_wildcard("RCM*"));
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match("RCM*", "RCM"));
        assert!(glob_match("RCM*", "RCMX"));
        assert!(glob_match("?HZ", "EHZ"));
        assert!(!glob_match("?HZ", "HZ"));
        assert!(glob_match("*", ""));
        assert!(glob_match("B*Z", "BHZ"));
        assert!(!glob_match("B*Z", "BHN"));
        assert!(glob_match("", ""));
        assert!(!glob_match("", "X"));
    }
}
