use super::diff::{MAX_DIFF_CHARS, truncate_diff};

/// How much of the PR's change set goes into the embeddable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrDiffMode {
    /// Keep both the file list and the truncated diff.
    Include,
    /// Diff was unavailable or too large; keep the file list only.
    SkipDiffKeepFiles,
    /// Diff API failed entirely; embed title and body only.
    TitleBodyOnly,
}

#[derive(Debug, Clone)]
pub struct PrInput {
    pub title: String,
    pub body: String,
    pub files: Vec<String>,
    pub diff: String,
    pub mode: PrDiffMode,
}

/// Convert PR fields into embeddable text.
///
/// Sections are joined by blank lines in a fixed order; any section that
/// would be empty is omitted. A PR with no body degrades to the title line,
/// and a PR with no title degrades to the bare body.
pub fn build_pr_content(input: &PrInput) -> String {
    let title = input.title.trim();
    let body = input.body.trim();

    match (title.is_empty(), body.is_empty()) {
        (true, true) => return String::new(),
        (true, false) => return body.to_string(),
        (false, true) => return format!("PR: {title}"),
        (false, false) => {}
    }

    let mut parts = vec![format!("PR: {title}"), format!("Description: {body}")];

    if input.mode != PrDiffMode::TitleBodyOnly {
        let files = normalize_files(&input.files);
        if !files.is_empty() {
            parts.push(format!("Files changed: {}", files.join(", ")));
        }
    }

    if input.mode == PrDiffMode::Include {
        let diff = input.diff.trim();
        if !diff.is_empty() {
            parts.push(format!("Diff summary: {}", truncate_diff(diff, MAX_DIFF_CHARS)));
        }
    }

    parts.join("\n\n")
}

fn normalize_files(files: &[String]) -> Vec<&str> {
    files
        .iter()
        .map(|file| file.trim())
        .filter(|file| !file.is_empty())
        .collect()
}
