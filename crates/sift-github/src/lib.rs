//! GitHub-facing edges of the triage pipeline: event payload decoding, the
//! REST client, the managed-comment reconciler, and the orphan-branch state
//! transport.

mod client;
mod comment;
mod event;
mod state;

pub use client::{Client, IssueComment};
pub use comment::{
    COMMENT_MARKER, CommentAction, CommentApi, CommentManager, find_triage_comment,
};
pub use event::{Event, parse_event_file, parse_repository};
pub use state::{CommandRunner, ExecRunner, StateManager};
