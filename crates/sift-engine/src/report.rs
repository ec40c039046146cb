//! Markdown body for the managed triage comment.

use sift_core::FusedResult;
use sift_github::{COMMENT_MARKER, Event};

use crate::ReportFormatter;

/// Default comment formatter: a duplicate call-out plus a similarity table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriageReport {
    /// Results at or above this display similarity get the duplicate
    /// call-out; zero falls back to the shared default.
    pub duplicate_threshold: f64,
}

impl TriageReport {
    fn duplicate_threshold(&self) -> f64 {
        if self.duplicate_threshold <= 0.0 {
            0.92
        } else {
            self.duplicate_threshold
        }
    }
}

impl ReportFormatter for TriageReport {
    fn format(&self, _event: &Event, results: &[FusedResult]) -> String {
        if results.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        out.push_str(COMMENT_MARKER);
        out.push('\n');

        let threshold = self.duplicate_threshold();
        for result in results {
            if result.display_similarity >= threshold {
                out.push_str(&format!(
                    "\n> ⚠️ **Possible duplicate** of #{}: {} ({}% similar)\n",
                    result.number,
                    result.title,
                    percent(result.display_similarity)
                ));
            }
        }

        out.push_str(&format!("\n### 📋 Similar items found ({})\n\n", results.len()));
        out.push_str("| Item | Title | Similarity | Status |\n");
        out.push_str("| --- | --- | --- | --- |\n");
        for result in results {
            out.push_str(&format!(
                "| #{} | {} | {}% | {} |\n",
                result.number,
                result.title,
                percent(result.display_similarity),
                state_badge(&result.state)
            ));
        }

        out
    }
}

fn percent(similarity: f64) -> i64 {
    (similarity * 100.0).round() as i64
}

fn state_badge(state: &str) -> String {
    let icon = match state {
        "open" => "🟢",
        "closed" => "⚫",
        "merged" => "🟣",
        _ => "⚪",
    };
    format!("{icon} {state}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(number: i64, title: &str, similarity: f64, state: &str) -> FusedResult {
        FusedResult {
            id: format!("issue/{number}"),
            item_type: "issue".to_string(),
            number,
            title: title.to_string(),
            state: state.to_string(),
            display_similarity: similarity,
            ..FusedResult::default()
        }
    }

    #[test]
    fn no_results_returns_empty() {
        let formatter = TriageReport::default();
        assert_eq!(formatter.format(&Event::default(), &[]), "");
    }

    #[test]
    fn marker_is_the_first_line() {
        let formatter = TriageReport::default();
        let body = formatter.format(
            &Event::default(),
            &[result(1, "Login", 0.82, "open")],
        );
        assert_eq!(body.lines().next(), Some(COMMENT_MARKER));
    }

    #[test]
    fn duplicate_callout_and_similarity_table() {
        let formatter = TriageReport {
            duplicate_threshold: 0.92,
        };
        let body = formatter.format(
            &Event::default(),
            &[
                result(5, "Fix login timeout", 0.95, "open"),
                result(9, "Retry auth", 0.81, "closed"),
            ],
        );

        assert!(body.contains("Possible duplicate"), "{body}");
        assert!(body.contains("#5"), "{body}");
        assert!(body.contains("📋 Similar items found (2)"), "{body}");
        assert!(body.contains("95%"), "{body}");
        assert!(body.contains("81%"), "{body}");
        assert!(body.contains("🟢 open"), "{body}");
        assert!(body.contains("⚫ closed"), "{body}");
    }

    #[test]
    fn below_threshold_has_no_duplicate_callout() {
        let formatter = TriageReport {
            duplicate_threshold: 0.92,
        };
        let body = formatter.format(&Event::default(), &[result(9, "Retry", 0.81, "open")]);
        assert!(!body.contains("Possible duplicate"), "{body}");
    }

    #[test]
    fn rounds_percent_and_supports_merged() {
        let formatter = TriageReport {
            duplicate_threshold: 0.99,
        };
        let body = formatter.format(
            &Event::default(),
            &[result(7, "Merge path", 0.9234, "merged")],
        );
        assert!(body.contains("92%"), "{body}");
        assert!(body.contains("🟣 merged"), "{body}");
    }
}
