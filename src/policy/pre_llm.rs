use super::guards::PaywallDetector;
use crate::config::PolicyChecksConfig;
use crate::models::count_words;

const MIN_WORDS: usize = 20;

const LOW_QUALITY_MARKERS: &[&str] = &[
    "404 not found",
    "page not found",
    "access denied",
    "please enable javascript",
    "loading...",
    "click here to continue",
    "advertisement",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PreLlmVerdict {
    pub passed: bool,
    pub reason: Option<String>,
    pub word_count: usize,
}

impl PreLlmVerdict {
    fn reject(reason: String, word_count: usize) -> Self {
        Self {
            passed: false,
            reason: Some(reason),
            word_count,
        }
    }
}

/// Cheap checks that keep obviously unusable items away from the LLM.
pub struct PreLlmChecker {
    checks: PolicyChecksConfig,
    min_words: usize,
    paywall: PaywallDetector,
}

impl PreLlmChecker {
    pub fn new(checks: PolicyChecksConfig) -> Self {
        Self {
            checks,
            min_words: MIN_WORDS,
            paywall: PaywallDetector,
        }
    }

    /// `raw` is the content as fetched, `cleaned` its plain-text form.
    pub fn check(&self, raw: &str, cleaned: &str) -> PreLlmVerdict {
        let word_count = count_words(cleaned);

        if self.checks.paywall_detection && self.paywall.is_paywalled(raw) {
            return PreLlmVerdict::reject("paywall_detected".to_string(), word_count);
        }

        if self.checks.min_content_length && word_count < self.min_words {
            return PreLlmVerdict::reject(
                format!("insufficient_content: {} words < {}", word_count, self.min_words),
                word_count,
            );
        }

        if self.checks.content_quality_check {
            let lower = cleaned.to_lowercase();
            if let Some(marker) = LOW_QUALITY_MARKERS.iter().find(|m| lower.contains(*m)) {
                return PreLlmVerdict::reject(format!("low_quality_content: {}", marker), word_count);
            }
        }

        // url_allowlist_check has no allowlist source yet and always passes.

        PreLlmVerdict {
            passed: true,
            reason: None,
            word_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(words: usize) -> String {
        "Compilers translate source programs into machine code efficiently. "
            .repeat(words / 7 + 1)
    }

    #[test]
    fn healthy_article_passes() {
        let text = article(140);
        let verdict = PreLlmChecker::new(PolicyChecksConfig::default()).check(&text, &text);
        assert!(verdict.passed);
        assert!(verdict.word_count >= 140);
    }

    #[test]
    fn short_content_is_rejected() {
        let verdict = PreLlmChecker::new(PolicyChecksConfig::default()).check("Too short.", "Too short.");
        assert!(!verdict.passed);
        assert!(verdict.reason.unwrap().starts_with("insufficient_content"));
    }

    #[test]
    fn paywall_is_checked_on_raw_content() {
        let cleaned = article(140);
        let raw = format!("<p>{}</p><div>Subscribe to continue reading</div>", cleaned);
        let checker = PreLlmChecker::new(PolicyChecksConfig::default());
        assert_eq!(checker.check(&raw, &cleaned).reason.as_deref(), Some("paywall_detected"));

        let off = PolicyChecksConfig {
            paywall_detection: false,
            ..PolicyChecksConfig::default()
        };
        assert!(PreLlmChecker::new(off).check(&raw, &cleaned).passed);
    }

    #[test]
    fn error_pages_are_low_quality() {
        let text = format!("404 Not Found. {}", article(140));
        let verdict = PreLlmChecker::new(PolicyChecksConfig::default()).check(&text, &text);
        assert_eq!(verdict.reason.as_deref(), Some("low_quality_content: 404 not found"));
    }
}
