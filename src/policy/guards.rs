use std::sync::OnceLock;

use regex::Regex;

use crate::config::PolicyChecksConfig;
use crate::models::count_words;

/// Outcome of a policy check. Violations fail the item, warnings are logged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyResult {
    pub passed: bool,
    pub violations: Vec<String>,
    pub warnings: Vec<String>,
}

impl PolicyResult {
    fn from_parts(violations: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            passed: violations.is_empty(),
            violations,
            warnings,
        }
    }

    pub fn reason(&self) -> Option<String> {
        (!self.violations.is_empty()).then(|| self.violations.join("; "))
    }

    fn merge(&mut self, other: PolicyResult) {
        self.violations.extend(other.violations);
        self.warnings.extend(other.warnings);
        self.passed = self.violations.is_empty();
    }
}

fn quote_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r#""([^"]{10,})""#,
            r"'([^']{10,})'",
            r"(?i)according to[^.]{10,}[.!?]",
            r"(?i)the article states[^.]{10,}[.!?]",
            r"(?i)as mentioned in[^.]{10,}[.!?]",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid quote pattern"))
        .collect()
    })
}

/// Flags quoted spans that run longer than `max_quote_words`.
pub struct QuoteChecker {
    pub max_quote_words: usize,
}

impl QuoteChecker {
    pub fn new(max_quote_words: usize) -> Self {
        Self { max_quote_words }
    }

    pub fn check(&self, text: &str) -> PolicyResult {
        let mut quotes = Vec::new();
        for pattern in quote_patterns() {
            for caps in pattern.captures_iter(text) {
                let quote = caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str().trim());
                if let Some(quote) = quote {
                    quotes.push(quote.to_string());
                }
            }
        }

        let violations: Vec<String> = quotes
            .iter()
            .map(|q| count_words(q))
            .filter(|&n| n > self.max_quote_words)
            .map(|n| format!("quote_exceeds_limit: {} words > {}", n, self.max_quote_words))
            .collect();

        let mut warnings = Vec::new();
        if !quotes.is_empty() && violations.is_empty() {
            warnings.push(format!("quotes_detected: {} quotes found", quotes.len()));
        }
        PolicyResult::from_parts(violations, warnings)
    }
}

const STRONG_PAYWALL: &[&str] = &[
    "subscribe to continue reading",
    "unlock this article",
    "premium subscribers only",
    "this content is for subscribers",
    "sign up to read",
    "become a member",
    "subscriber-only content",
    "behind paywall",
    "subscription required",
    "premium access required",
];

const MODERATE_PAYWALL: &[&str] = &[
    "subscribe",
    "subscription",
    "premium",
    "sign in to read",
    "free trial",
    "members only",
];

/// Paywall heuristics over raw article text.
///
/// Any strong indicator is definitive. Two or more moderate indicators flag a
/// paywall, and so does a single one in content shorter than 100 words.
#[derive(Debug, Default)]
pub struct PaywallDetector;

impl PaywallDetector {
    pub fn check(&self, content: &str) -> PolicyResult {
        let lower = content.to_lowercase();
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        let strong: Vec<&str> = STRONG_PAYWALL.iter().copied().filter(|i| lower.contains(i)).collect();
        if !strong.is_empty() {
            violations.push(format!("paywall_detected: {}", strong.join(", ")));
        }

        let moderate: Vec<&str> = MODERATE_PAYWALL.iter().copied().filter(|i| lower.contains(i)).collect();
        if moderate.len() >= 2 {
            violations.push(format!(
                "paywall_likely: multiple indicators ({})",
                moderate.join(", ")
            ));
        } else if !moderate.is_empty() {
            let words = count_words(content);
            if words < 100 {
                violations.push(format!(
                    "paywall_likely: short content ({} words) with subscription mention",
                    words
                ));
            } else {
                warnings.push(format!("paywall_possible: found {}", moderate.join(", ")));
            }
        }

        PolicyResult::from_parts(violations, warnings)
    }

    pub fn is_paywalled(&self, content: &str) -> bool {
        !self.check(content).passed
    }
}

const TRANSFORMATIVE_PHRASES: &[&str] = &[
    "this means",
    "the implications",
    "why this matters",
    "looking ahead",
    "the key insight",
    "what's significant",
    "the takeaway",
    "this suggests",
    "in other words",
    "to put it simply",
    "the bigger picture",
    "breaking it down",
];

const DERIVATIVE_PHRASES: &[&str] = &[
    "according to the article",
    "the article states",
    "as mentioned in the piece",
    "the author writes",
    "the piece explains",
    "as stated in",
    "the document says",
    "quoting from",
];

/// Looks for analysis language and for phrasing that merely restates the source.
#[derive(Debug, Default)]
pub struct TransformativeChecker;

impl TransformativeChecker {
    pub fn check_analysis(&self, text: &str, title: &str) -> PolicyResult {
        let lower = text.to_lowercase();
        let mut violations = Vec::new();
        let mut warnings = Vec::new();

        let count = TRANSFORMATIVE_PHRASES.iter().filter(|p| lower.contains(*p)).count();
        if count == 0 {
            violations.push("lacks_transformative_analysis: no analytical language found".to_string());
        } else if count < 2 {
            warnings.push("minimal_transformative_language: consider adding more analysis".to_string());
        }

        if count_words(title) > 3 {
            let title_lower = title.to_lowercase();
            let title_words: std::collections::HashSet<&str> = title_lower.split_whitespace().collect();
            let text_words: std::collections::HashSet<&str> = lower.split_whitespace().collect();
            let overlap = title_words.intersection(&text_words).count() as f32 / title_words.len() as f32;
            if overlap > 0.8 {
                warnings.push("high_title_overlap: consider paraphrasing title content".to_string());
            }
        }

        PolicyResult::from_parts(violations, warnings)
    }

    pub fn check_derivative(&self, text: &str) -> PolicyResult {
        let lower = text.to_lowercase();
        let count = DERIVATIVE_PHRASES.iter().filter(|p| lower.contains(*p)).count();
        let violations = if count > 0 {
            vec![format!("derivative_language_detected: {} instances", count)]
        } else {
            Vec::new()
        };
        PolicyResult::from_parts(violations, Vec::new())
    }
}

/// Post-generation checks on a summary script.
pub struct PolicyGuard {
    checks: PolicyChecksConfig,
    max_script_words: usize,
    quotes: QuoteChecker,
    transformative: TransformativeChecker,
}

impl PolicyGuard {
    pub fn new(checks: PolicyChecksConfig, max_script_words: usize, max_quote_words: usize) -> Self {
        Self {
            checks,
            max_script_words,
            quotes: QuoteChecker::new(max_quote_words),
            transformative: TransformativeChecker,
        }
    }

    pub fn check(&self, script: &str, title: &str) -> PolicyResult {
        let mut result = PolicyResult::from_parts(Vec::new(), Vec::new());

        if self.checks.max_word_count {
            let words = count_words(script);
            if words > self.max_script_words {
                result.merge(PolicyResult::from_parts(
                    vec![format!("exceeds_word_limit: {} > {}", words, self.max_script_words)],
                    Vec::new(),
                ));
            }
        }
        if self.checks.quote_length_check {
            result.merge(self.quotes.check(script));
        }
        if self.checks.derivative_language_check {
            result.merge(self.transformative.check_derivative(script));
        }
        if self.checks.transformative_analysis_check {
            result.merge(self.transformative.check_analysis(script, title));
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_quotes_are_violations() {
        let checker = QuoteChecker::new(5);
        let text = r#"She said "this is a very long quoted passage that goes on and on" today."#;
        let result = checker.check(text);
        assert!(!result.passed);
        assert!(result.violations[0].starts_with("quote_exceeds_limit"));

        let short = checker.check(r#"He called it "remarkable work" in passing."#);
        assert!(short.passed);
        assert_eq!(short.warnings.len(), 1);
    }

    #[test]
    fn strong_paywall_indicator_is_definitive() {
        let long_text = format!("{} Subscribe to continue reading.", "word ".repeat(300));
        assert!(PaywallDetector.is_paywalled(&long_text));
    }

    #[test]
    fn moderate_indicators_depend_on_count_and_length() {
        let two = format!("{} premium subscription offers", "word ".repeat(300));
        assert!(PaywallDetector.is_paywalled(&two));

        let one_short = "A short teaser. Subscribe for more.";
        assert!(PaywallDetector.is_paywalled(one_short));

        let one_long = format!("{} subscribe", "word ".repeat(150));
        let result = PaywallDetector.check(&one_long);
        assert!(result.passed);
        assert_eq!(result.warnings.len(), 1);

        assert!(!PaywallDetector.is_paywalled("An open article about compilers."));
    }

    #[test]
    fn guard_flags_derivative_language_and_missing_analysis() {
        let guard = PolicyGuard::new(PolicyChecksConfig::default(), 50, 30);

        let derivative = guard.check("According to the article, the model is faster.", "Model news");
        assert!(!derivative.passed);
        assert!(derivative
            .violations
            .iter()
            .any(|v| v.starts_with("derivative_language_detected")));
        assert!(derivative
            .violations
            .iter()
            .any(|v| v.starts_with("lacks_transformative_analysis")));

        let good = guard.check(
            "A new compiler landed. Why this matters: builds get faster, and this means shorter CI.",
            "Compiler release",
        );
        assert!(good.passed, "{:?}", good.violations);
    }

    #[test]
    fn guard_enforces_word_limit_and_respects_toggles() {
        let script = format!("Why this matters and this means {}", "word ".repeat(60));
        let guard = PolicyGuard::new(PolicyChecksConfig::default(), 50, 30);
        let result = guard.check(&script, "");
        assert!(result.reason().unwrap().contains("exceeds_word_limit"));

        let relaxed = PolicyChecksConfig {
            max_word_count: false,
            ..PolicyChecksConfig::default()
        };
        assert!(PolicyGuard::new(relaxed, 50, 30).check(&script, "").passed);
    }
}
