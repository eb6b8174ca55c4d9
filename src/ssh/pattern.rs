use regex::Regex;

/// Match a hostname against a stanza's pattern list.
///
/// Patterns are evaluated in order and the first one that matches decides
/// the outcome: a `!`-negated hit returns `false` immediately, a positive
/// hit returns `true`. Later patterns are never consulted, so a negation
/// placed after a matching wildcard has no effect.
pub fn matches_host(host: &str, patterns: &[String]) -> bool {
    let host = host.to_ascii_lowercase();
    for raw in patterns {
        let mut pattern = raw.to_ascii_lowercase();
        let negated = pattern.starts_with('!');
        if negated {
            pattern.remove(0);
        }
        if !pattern.contains('*') && !pattern.contains('?') {
            if host == pattern {
                return !negated;
            }
            continue;
        }
        let Some(re) = glob_to_regex(&pattern) else {
            continue;
        };
        if re.is_match(&host) {
            return !negated;
        }
    }
    false
}

/// `*` matches any run of characters, `?` exactly one; everything else is
/// literal. Anchored so the pattern must cover the whole hostname.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            c => out.push_str(&regex::escape(&c.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).ok()
}
