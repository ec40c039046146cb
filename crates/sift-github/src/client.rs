//! Thin blocking client for the handful of REST endpoints the pipeline
//! touches: issue comments, PR file listings, and the raw PR diff.

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use crate::comment::CommentApi;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const PER_PAGE: usize = 100;
const USER_AGENT: &str = concat!("sift/", env!("CARGO_PKG_VERSION"));

/// One issue/PR comment as the reconciler sees it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssueComment {
    pub id: i64,
    pub body: String,
    pub author: String,
}

pub struct Client {
    http: reqwest::blocking::Client,
    token: String,
    base_url: String,
}

#[derive(Deserialize)]
struct CommentPayload {
    id: i64,
    #[serde(default)]
    body: String,
    #[serde(default)]
    user: UserPayload,
}

#[derive(Deserialize, Default)]
struct UserPayload {
    #[serde(default)]
    login: String,
}

#[derive(Deserialize)]
struct PullFilePayload {
    #[serde(default)]
    filename: String,
}

impl Client {
    /// # Errors
    ///
    /// Fails when the token is blank or the HTTP client cannot be built.
    pub fn new(token: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            bail!("github token is required");
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("build github http client")?;

        Ok(Self {
            http,
            token: token.to_string(),
            base_url: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API root (test servers, GHES).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            bail!("GET {url} failed: status={status}");
        }

        response.json().with_context(|| format!("decode {url}"))
    }

    /// All comments on one issue or PR, following pagination.
    pub fn list_issue_comments_paginated(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<IssueComment>> {
        let mut out = Vec::new();
        let mut page = 1usize;

        loop {
            let url = format!(
                "{}/repos/{owner}/{repo}/issues/{number}/comments?per_page={PER_PAGE}&page={page}",
                self.base_url
            );
            let batch: Vec<CommentPayload> =
                self.get_json(&url).context("list issue comments")?;
            let batch_len = batch.len();

            out.extend(batch.into_iter().map(|c| IssueComment {
                id: c.id,
                body: c.body,
                author: c.user.login,
            }));

            if batch_len < PER_PAGE {
                return Ok(out);
            }
            page += 1;
        }
    }

    /// Paths of all files changed by a PR, following pagination.
    pub fn list_pull_request_files(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut page = 1usize;

        loop {
            let url = format!(
                "{}/repos/{owner}/{repo}/pulls/{number}/files?per_page={PER_PAGE}&page={page}",
                self.base_url
            );
            let batch: Vec<PullFilePayload> =
                self.get_json(&url).context("list pull request files")?;
            let batch_len = batch.len();

            files.extend(
                batch
                    .into_iter()
                    .map(|f| f.filename)
                    .filter(|name| !name.is_empty()),
            );

            if batch_len < PER_PAGE {
                return Ok(files);
            }
            page += 1;
        }
    }

    /// The raw unified diff for a PR.
    pub fn get_pull_request_diff(&self, owner: &str, repo: &str, number: i64) -> Result<String> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{number}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, "application/vnd.github.diff")
            .send()
            .context("get pull request diff")?;

        let status = response.status();
        if !status.is_success() {
            bail!("get pull request diff failed: status={status}");
        }

        response.text().context("read pull request diff")
    }
}

impl CommentApi for Client {
    fn list_issue_comments(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<Vec<IssueComment>> {
        self.list_issue_comments_paginated(owner, repo, number)
    }

    fn create_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        body: &str,
    ) -> Result<IssueComment> {
        let url = format!(
            "{}/repos/{owner}/{repo}/issues/{number}/comments",
            self.base_url
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .context("create issue comment")?;

        let status = response.status();
        if !status.is_success() {
            bail!("create issue comment failed: status={status}");
        }

        let created: CommentPayload = response.json().context("decode created comment")?;
        Ok(IssueComment {
            id: created.id,
            body: created.body,
            author: created.user.login,
        })
    }

    fn update_issue_comment(
        &self,
        owner: &str,
        repo: &str,
        comment_id: i64,
        body: &str,
    ) -> Result<IssueComment> {
        let url = format!(
            "{}/repos/{owner}/{repo}/issues/comments/{comment_id}",
            self.base_url
        );
        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .context("update issue comment")?;

        let status = response.status();
        if !status.is_success() {
            bail!("update issue comment failed: status={status}");
        }

        let updated: CommentPayload = response.json().context("decode updated comment")?;
        Ok(IssueComment {
            id: updated.id,
            body: updated.body,
            author: updated.user.login,
        })
    }

    fn delete_issue_comment(&self, owner: &str, repo: &str, comment_id: i64) -> Result<()> {
        let url = format!(
            "{}/repos/{owner}/{repo}/issues/comments/{comment_id}",
            self.base_url
        );
        let response = self
            .http
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .context("delete issue comment")?;

        let status = response.status();
        if !status.is_success() {
            bail!("delete issue comment failed: status={status}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_token() {
        assert!(Client::new("  ").is_err());
        assert!(Client::new("tkn").is_ok());
    }

    #[test]
    fn with_base_url_strips_trailing_slash() {
        let client = Client::new("tkn").unwrap().with_base_url("http://localhost:9999/");
        assert_eq!(client.base_url, "http://localhost:9999");
    }

    #[test]
    fn comment_payload_tolerates_missing_fields() {
        let payload: CommentPayload = serde_json::from_str(r#"{"id": 5}"#).unwrap();
        assert_eq!(payload.id, 5);
        assert!(payload.body.is_empty());
        assert!(payload.user.login.is_empty());
    }
}
