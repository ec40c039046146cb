/// Convert issue title/body into embeddable text.
pub fn build_issue_content(title: &str, body: &str) -> String {
    let title = title.trim();
    let body = body.trim();

    match (title.is_empty(), body.is_empty()) {
        (false, false) => format!("Issue: {title}\n\n{body}"),
        (false, true) => format!("Issue: {title}"),
        (true, false) => body.to_string(),
        (true, true) => String::new(),
    }
}
