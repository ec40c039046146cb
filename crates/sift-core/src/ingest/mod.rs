//! Shapes raw event fields into a single embeddable text string.

mod diff;
mod issue;
mod pr;

pub use diff::{MAX_DIFF_CHARS, truncate_diff};
pub use issue::build_issue_content;
pub use pr::{PrDiffMode, PrInput, build_pr_content};
