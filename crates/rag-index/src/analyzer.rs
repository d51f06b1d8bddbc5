//! Text analysis for the keyword index.

/// Words too common to carry keyword signal.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "did", "do", "does", "for",
    "from", "had", "has", "have", "how", "in", "into", "is", "it", "its", "of", "on", "or",
    "our", "that", "the", "their", "there", "these", "this", "those", "to", "was", "were",
    "what", "when", "where", "which", "who", "why", "will", "with",
];

/// Split text into normalized keyword terms.
///
/// Lowercases, splits on anything that is not alphanumeric, keeps `.` and
/// `,` between two digits so amounts like `22.4` or `1,200` survive as one
/// term, drops stopwords and strips plural suffixes.
pub fn analyze(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut terms = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
            continue;
        }

        let numeric_separator = (c == '.' || c == ',')
            && i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if numeric_separator && !current.is_empty() {
            current.push(c);
            continue;
        }

        flush(&mut current, &mut terms);
    }
    flush(&mut current, &mut terms);

    terms
}

fn flush(current: &mut String, terms: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let token = std::mem::take(current);
    if STOPWORDS.contains(&token.as_str()) {
        return;
    }
    terms.push(stem(token));
}

/// Light plural stemmer: `liabilities -> liability`, `costs -> cost`.
fn stem(token: String) -> String {
    let len = token.chars().count();
    if len <= 3 || token.chars().any(|c| c.is_ascii_digit()) {
        return token;
    }
    if let Some(base) = token.strip_suffix("ies") {
        if len > 4 {
            return format!("{}y", base);
        }
    }
    if token.ends_with("ss") || token.ends_with("us") || token.ends_with("is") {
        return token;
    }
    match token.strip_suffix('s') {
        Some(base) => base.to_string(),
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_lease_sentence() {
        let terms = analyze(
            "The Company recognized operating lease costs of $22.4 million during the year ended December 31, 2022.",
        );
        for expected in ["operating", "lease", "cost", "22.4", "2022", "31", "december"] {
            assert!(terms.contains(&expected.to_string()), "missing {}", expected);
        }
        assert!(!terms.contains(&"the".to_string()));
        assert!(!terms.contains(&"2022.".to_string()));
    }

    #[test]
    fn test_numeric_separators() {
        assert_eq!(analyze("1,200 units"), vec!["1,200", "unit"]);
        assert_eq!(analyze("ended 31, 2022"), vec!["ended", "31", "2022"]);
        assert_eq!(analyze("v1.2.3"), vec!["v1.2.3"]);
    }

    #[test]
    fn test_stemming() {
        assert_eq!(analyze("liabilities"), vec!["liability"]);
        assert_eq!(analyze("leases"), vec!["lease"]);
        assert_eq!(analyze("business analysis status"), vec!["business", "analysis", "status"]);
        assert_eq!(analyze("gas"), vec!["gas"]);
    }

    #[test]
    fn test_only_stopwords() {
        assert!(analyze("what is the").is_empty());
        assert!(analyze("").is_empty());
    }
}
