//! Normalized event model and webhook payload decoding.

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

/// The normalized payload consumed by the triage engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Event {
    pub event_type: String,
    pub action: String,

    pub owner: String,
    pub repo: String,

    pub number: i64,
    pub title: String,
    pub body: String,

    pub author: String,
    pub labels: Vec<String>,
    pub state: String,
    pub url: String,

    pub diff: String,
    pub files: Vec<String>,
}

/// Split `owner/repo` into its halves, rejecting malformed values.
pub fn parse_repository(repository: &str) -> Result<(String, String)> {
    let repository = repository.trim();
    let parts: Vec<&str> = repository.split('/').collect();
    if parts.len() != 2 || parts[0].trim().is_empty() || parts[1].trim().is_empty() {
        bail!("invalid repository format {repository:?}, expected owner/repo");
    }
    Ok((parts[0].trim().to_string(), parts[1].trim().to_string()))
}

/// Decode the webhook payload at `event_path` into a normalized [`Event`].
///
/// Supported event names: `issues`, `pull_request`, `pull_request_target`.
pub fn parse_event_file(
    event_name: &str,
    event_path: impl AsRef<Path>,
    repository: &str,
) -> Result<Event> {
    let (owner, repo) = parse_repository(repository)?;

    let payload = std::fs::read_to_string(event_path.as_ref())
        .with_context(|| format!("read event payload {}", event_path.as_ref().display()))?;

    match event_name.trim() {
        "issues" => parse_issue_event(&payload, owner, repo),
        "pull_request" | "pull_request_target" => parse_pull_request_event(&payload, owner, repo),
        other => bail!("unsupported event name {other:?}"),
    }
}

fn parse_issue_event(payload: &str, owner: String, repo: String) -> Result<Event> {
    let incoming: IssueEventPayload =
        serde_json::from_str(payload).context("decode issue event")?;

    if incoming.issue.number == 0 {
        bail!("issue number missing in event payload");
    }

    let labels = incoming
        .issue
        .labels
        .into_iter()
        .map(|label| label.name)
        .filter(|name| !name.trim().is_empty())
        .collect();

    Ok(Event {
        event_type: "issue".to_string(),
        action: incoming.action,
        owner,
        repo,
        number: incoming.issue.number,
        title: incoming.issue.title,
        body: incoming.issue.body,
        author: incoming.issue.user.login,
        labels,
        state: incoming.issue.state,
        url: incoming.issue.html_url,
        ..Event::default()
    })
}

fn parse_pull_request_event(payload: &str, owner: String, repo: String) -> Result<Event> {
    let incoming: PullRequestEventPayload =
        serde_json::from_str(payload).context("decode pull request event")?;
    let pr = incoming.pull_request;

    if pr.number == 0 {
        bail!("pull request number missing in event payload");
    }

    let state = if pr.merged {
        "merged".to_string()
    } else {
        pr.state
    };

    // PR metadata is treated as untrusted text and never executed.
    Ok(Event {
        event_type: "pr".to_string(),
        action: incoming.action,
        owner,
        repo,
        number: pr.number,
        title: pr.title,
        body: pr.body,
        author: pr.user.login,
        state,
        url: pr.html_url,
        diff: pr.diff,
        files: normalize_file_paths(pr.files),
        ..Event::default()
    })
}

fn normalize_file_paths(paths: Vec<String>) -> Vec<String> {
    paths
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

#[derive(Deserialize)]
struct IssueEventPayload {
    #[serde(default)]
    action: String,
    issue: IssuePayload,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct IssuePayload {
    number: i64,
    title: String,
    body: String,
    state: String,
    html_url: String,
    user: UserPayload,
    labels: Vec<LabelPayload>,
}

#[derive(Deserialize)]
struct PullRequestEventPayload {
    #[serde(default)]
    action: String,
    pull_request: PullRequestPayload,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct PullRequestPayload {
    number: i64,
    title: String,
    body: String,
    state: String,
    merged: bool,
    html_url: String,

    // Optional convenience fields used by tests and local fixtures.
    diff: String,
    files: Vec<String>,

    user: UserPayload,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct UserPayload {
    login: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct LabelPayload {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_payload(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn parse_repository_accepts_owner_repo() {
        assert_eq!(
            parse_repository(" acme/repo ").unwrap(),
            ("acme".to_string(), "repo".to_string())
        );
    }

    #[test]
    fn parse_repository_rejects_malformed() {
        for bad in ["", "acme", "acme/", "/repo", "a/b/c"] {
            assert!(parse_repository(bad).is_err(), "{bad:?} should be invalid");
        }
    }

    #[test]
    fn parses_issue_event() {
        let file = write_payload(
            r#"{
                "action": "opened",
                "issue": {
                    "number": 12,
                    "title": "Login timeout",
                    "body": "Auth fails",
                    "state": "open",
                    "html_url": "https://github.com/acme/repo/issues/12",
                    "user": {"login": "octocat"},
                    "labels": [{"name": "bug"}, {"name": "  "}, {"name": "auth"}]
                }
            }"#,
        );

        let event = parse_event_file("issues", file.path(), "acme/repo").unwrap();
        assert_eq!(event.event_type, "issue");
        assert_eq!(event.action, "opened");
        assert_eq!(event.owner, "acme");
        assert_eq!(event.repo, "repo");
        assert_eq!(event.number, 12);
        assert_eq!(event.author, "octocat");
        assert_eq!(event.labels, vec!["bug", "auth"]);
    }

    #[test]
    fn parses_pull_request_event_with_merged_state() {
        let file = write_payload(
            r#"{
                "action": "closed",
                "pull_request": {
                    "number": 9,
                    "title": "Add retry",
                    "body": "retries",
                    "state": "closed",
                    "merged": true,
                    "html_url": "https://github.com/acme/repo/pull/9",
                    "user": {"login": "octocat"},
                    "files": [" src/a.rs ", "", "src/b.rs"]
                }
            }"#,
        );

        let event = parse_event_file("pull_request", file.path(), "acme/repo").unwrap();
        assert_eq!(event.event_type, "pr");
        assert_eq!(event.state, "merged");
        assert_eq!(event.files, vec!["src/a.rs", "src/b.rs"]);
    }

    #[test]
    fn pull_request_target_is_a_pr() {
        let file = write_payload(r#"{"pull_request": {"number": 3}}"#);
        let event = parse_event_file("pull_request_target", file.path(), "acme/repo").unwrap();
        assert_eq!(event.event_type, "pr");
        assert_eq!(event.number, 3);
    }

    #[test]
    fn missing_number_is_an_error() {
        let file = write_payload(r#"{"issue": {"title": "no number"}}"#);
        let err = parse_event_file("issues", file.path(), "acme/repo").unwrap_err();
        assert!(err.to_string().contains("number missing"));
    }

    #[test]
    fn unsupported_event_name_is_an_error() {
        let file = write_payload("{}");
        let err = parse_event_file("release", file.path(), "acme/repo").unwrap_err();
        assert!(err.to_string().contains("unsupported event name"));
    }
}
