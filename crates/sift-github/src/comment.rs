//! Managed triage comment: at most one per item, identified by a marker.

use anyhow::Result;

use crate::client::IssueComment;

/// A comment is "managed" iff its body contains this exact marker.
pub const COMMENT_MARKER: &str = "<!-- triage-bot:v1 -->";

/// What the reconcile pass ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentAction {
    Noop,
    Created,
    Updated,
    Deleted,
}

/// The subset of the issues API needed to maintain the managed comment.
pub trait CommentApi {
    fn list_issue_comments(&self, owner: &str, repo: &str, number: i64)
    -> Result<Vec<IssueComment>>;
    fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<IssueComment>;
    fn update_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: i64,
        body: &str,
    ) -> Result<IssueComment>;
    fn delete_issue_comment(&self, owner: &str, repo: &str, comment_id: i64) -> Result<()>;
}

/// Reconciles the single managed comment against a candidate body.
pub struct CommentManager<A: CommentApi> {
    pub api: A,
}

impl<A: CommentApi> CommentManager<A> {
    /// Bring the managed comment in line with `body`.
    ///
    /// Empty candidate: delete the managed comment if one exists, else do
    /// nothing. Non-empty candidate: create when absent, update when the
    /// existing body differs, noop when equivalent after trimming.
    pub fn upsert_triage_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<CommentAction> {
        let comments = self.api.list_issue_comments(owner, repo, number)?;
        let existing = find_triage_comment(&comments);
        let normalized = normalize_comment_body(body);

        if normalized.trim().is_empty() {
            let Some(existing) = existing else {
                return Ok(CommentAction::Noop);
            };
            self.api.delete_issue_comment(owner, repo, existing.id)?;
            return Ok(CommentAction::Deleted);
        }

        if let Some(existing) = existing {
            if existing.body.trim() == normalized.trim() {
                return Ok(CommentAction::Noop);
            }
            self.api
                .update_issue_comment(owner, repo, existing.id, &normalized)?;
            return Ok(CommentAction::Updated);
        }

        self.api
            .create_issue_comment(owner, repo, number, &normalized)?;
        Ok(CommentAction::Created)
    }
}

/// First comment whose body carries the managed marker, if any.
pub fn find_triage_comment(comments: &[IssueComment]) -> Option<&IssueComment> {
    comments
        .iter()
        .find(|comment| comment.body.contains(COMMENT_MARKER))
}

fn normalize_comment_body(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }
    if body.starts_with(COMMENT_MARKER) {
        return body.to_string();
    }
    format!("{COMMENT_MARKER}\n{body}")
}
