//! Busy-indicator detection over page class-list snapshots.
//!
//! The in-page shim streams the class attributes of candidate elements; the
//! rule is evaluated against the most recent snapshot on every tick. A
//! missing or empty snapshot reads as "not busy" — detection failures are
//! never errors.

use pagewatch_protocol::PageSnapshot;

use crate::config::IndicatorConfig;

/// Matching rule for the generation indicator.
///
/// Primary match: an element whose class list contains `marker_class` as an
/// exact token. Fallback: any class attribute that looks animated and
/// contains one of the configured keyword substrings. The fallback absorbs
/// minor markup churn on the observed page.
#[derive(Debug, Clone)]
pub struct IndicatorRule {
    marker_class: String,
    keywords: Vec<String>,
}

impl IndicatorRule {
    pub fn new(marker_class: impl Into<String>, keywords: Vec<String>) -> Self {
        IndicatorRule {
            marker_class: marker_class.into(),
            keywords,
        }
    }

    pub fn from_config(config: &IndicatorConfig) -> Self {
        IndicatorRule::new(config.marker_class.clone(), config.keywords.clone())
    }

    /// Returns true if the busy indicator is visible in the snapshot.
    pub fn is_busy(&self, snapshot: &PageSnapshot) -> bool {
        for class_attr in &snapshot.classes {
            if class_attr
                .split_whitespace()
                .any(|token| token == self.marker_class)
            {
                return true;
            }
        }

        // Fallback: fuzzy scan for animated elements with a known keyword.
        snapshot.classes.iter().any(|class_attr| {
            class_attr.contains("animat")
                && self
                    .keywords
                    .iter()
                    .any(|keyword| class_attr.contains(keyword.as_str()))
        })
    }
}

impl Default for IndicatorRule {
    fn default() -> Self {
        IndicatorRule::from_config(&IndicatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(classes: &[&str]) -> PageSnapshot {
        PageSnapshot {
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn rule() -> IndicatorRule {
        IndicatorRule::new(
            "animate-pplxIndicator",
            vec!["typing".to_string(), "indicator".to_string()],
        )
    }

    #[test]
    fn matches_exact_marker_token() {
        let snap = snapshot(&["icon small animate-pplxIndicator"]);
        assert!(rule().is_busy(&snap));
    }

    #[test]
    fn marker_must_be_a_whole_token() {
        let snap = snapshot(&["animate-pplxIndicatorLegacy"]);
        // Not the exact token, but the fuzzy fallback catches it: the class
        // is animated and contains the "indicator" keyword.
        assert!(rule().is_busy(&snap));

        let strict = IndicatorRule::new("animate-pplxIndicator", vec![]);
        assert!(!strict.is_busy(&snap));
    }

    #[test]
    fn fallback_requires_animation_and_keyword() {
        assert!(rule().is_busy(&snapshot(&["svg animated typing-dots"])));
        assert!(!rule().is_busy(&snapshot(&["svg animated spinner"])));
        assert!(!rule().is_busy(&snapshot(&["svg static typing-dots"])));
    }

    #[test]
    fn empty_snapshot_reads_as_not_busy() {
        assert!(!rule().is_busy(&PageSnapshot::default()));
    }
}
