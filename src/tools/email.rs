// Email tools
//! `read_emails` and `send_email`: free-text queries parsed into structured
//! requests and handed to a [`Mailbox`].

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};

use super::{require_str, LocalTool, ToolError};

const DEFAULT_COUNT: usize = 5;
const MAX_COUNT: usize = 20;
const PREVIEW_CHARS: usize = 200;
const MAX_SUBJECT_CHARS: usize = 100;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("valid email regex")
});

const QUOTES: &[char] = &[' ', '"', '\''];

// ── Mailbox ─────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Email credentials not set. Set EMAIL_ADDRESS and EMAIL_PASSWORD")]
    NotConfigured,
    #[error("Email login failed: {0}")]
    Auth(String),
    #[error("Mail server error: {0}")]
    Transport(String),
}

/// One fetched message, already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailSummary {
    pub from: String,
    pub subject: String,
    pub date: String,
    pub body: String,
}

/// Mail transport behind the email tools.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Newest first, at most `query.count` messages.
    async fn fetch(&self, query: &EmailQuery) -> Result<Vec<EmailSummary>, MailboxError>;
    async fn send(&self, email: &OutgoingEmail) -> Result<(), MailboxError>;
}

/// Used when no mail credentials are configured; every call fails cleanly.
#[derive(Debug, Default)]
pub struct UnconfiguredMailbox;

#[async_trait]
impl Mailbox for UnconfiguredMailbox {
    async fn fetch(&self, _query: &EmailQuery) -> Result<Vec<EmailSummary>, MailboxError> {
        Err(MailboxError::NotConfigured)
    }

    async fn send(&self, _email: &OutgoingEmail) -> Result<(), MailboxError> {
        Err(MailboxError::NotConfigured)
    }
}

// ── Query parsing ───────────────────────────────────────────────────────────

/// Inbox search derived from text like "3 unread emails from boss about invoice".
#[derive(Debug, Clone, PartialEq)]
pub struct EmailQuery {
    pub count: usize,
    pub unread_only: bool,
    pub sender: Option<String>,
    pub subject: Option<String>,
}

impl EmailQuery {
    pub fn parse(query: &str) -> Self {
        let lower = query.to_lowercase();

        let count = query
            .split_whitespace()
            .find(|w| !w.is_empty() && w.chars().all(|c| c.is_ascii_digit()))
            .and_then(|w| w.parse::<usize>().ok())
            .map(|n| n.clamp(1, MAX_COUNT))
            .unwrap_or(DEFAULT_COUNT);

        let sender = word_after(&lower, "from ");
        let subject = word_after(&lower, "about ").or_else(|| word_after(&lower, "subject "));

        Self {
            count,
            unread_only: lower.contains("unread"),
            sender,
            subject,
        }
    }

    /// IMAP SEARCH criteria for this query.
    pub fn imap_criteria(&self) -> String {
        let mut criteria = Vec::new();
        if self.unread_only {
            criteria.push("UNSEEN".to_string());
        }
        if let Some(sender) = &self.sender {
            criteria.push(format!("FROM \"{sender}\""));
        }
        if let Some(subject) = &self.subject {
            criteria.push(format!("SUBJECT \"{subject}\""));
        }
        if criteria.is_empty() {
            "ALL".to_string()
        } else {
            criteria.join(" ")
        }
    }
}

fn word_after(lower: &str, marker: &str) -> Option<String> {
    let (_, rest) = lower.split_once(marker)?;
    rest.split_whitespace().next().map(String::from)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComposeError {
    #[error("No recipient email address found. Provide a valid address (e.g. user@example.com)")]
    NoRecipient,
    #[error("No email message body found. Provide the message content to send to {0}")]
    NoBody(String),
}

/// Message derived from text like
/// `send email to a@b.com subject 'Hi' message 'See you'`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutgoingEmail {
    pub fn parse(query: &str) -> Result<Self, ComposeError> {
        let addresses: Vec<&str> = EMAIL_RE.find_iter(query).map(|m| m.as_str()).collect();
        let to = addresses.first().ok_or(ComposeError::NoRecipient)?.to_string();

        let subject = parse_subject(query).unwrap_or_else(|| "No Subject".to_string());

        let mut body = ["message:", "body:", "saying:", "message ", "body ", "saying "]
            .iter()
            .find_map(|indicator| split_ci(query, indicator).map(|(_, rest)| rest.trim_matches(QUOTES).to_string()))
            .unwrap_or_default();

        // "... about X: body" / "... subject X: body"
        if body.is_empty() && (find_ci(query, "subject").is_some() || find_ci(query, "about").is_some()) {
            if let Some((_, rest)) = query.split_once(':') {
                let mut candidate = rest.to_string();
                for addr in &addresses {
                    candidate = candidate.replace(addr, "");
                }
                let candidate = candidate.trim();
                if candidate.chars().count() > 10 {
                    body = candidate.to_string();
                }
            }
        }

        if body.is_empty() {
            return Err(ComposeError::NoBody(to));
        }
        Ok(Self { to, subject, body })
    }
}

fn parse_subject(query: &str) -> Option<String> {
    let (rest, delimiters): (&str, &[&str]) = if let Some((_, rest)) = split_ci(query, "subject") {
        (rest, &[" message ", " body ", " saying ", " and message ", ":"])
    } else if let Some((_, rest)) = split_ci(query, "about") {
        (rest, &[":", " saying ", " message ", " body "])
    } else {
        return None;
    };
    let rest = rest.trim();

    let subject = match delimiters.iter().find_map(|d| split_ci(rest, d)) {
        Some((head, _)) => head.trim_matches(QUOTES).to_string(),
        None => {
            let sentence = rest.split('.').next().unwrap_or_default().trim_matches(QUOTES);
            sentence.chars().take(MAX_SUBJECT_CHARS).collect()
        }
    };
    Some(subject)
}

/// ASCII case-insensitive find; byte offsets stay valid for `haystack`.
fn find_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}

fn split_ci<'a>(haystack: &'a str, needle: &str) -> Option<(&'a str, &'a str)> {
    find_ci(haystack, needle).map(|i| (&haystack[..i], &haystack[i + needle.len()..]))
}

fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ── Tools ───────────────────────────────────────────────────────────────────

fn query_schema(description: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {"type": "string", "description": description}
        },
        "required": ["query"]
    })
}

pub struct ReadEmailsTool {
    mailbox: Arc<dyn Mailbox>,
}

impl ReadEmailsTool {
    pub fn new(mailbox: Arc<dyn Mailbox>) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl LocalTool for ReadEmailsTool {
    fn name(&self) -> &str {
        "read_emails"
    }

    fn description(&self) -> &str {
        "Fetch and read emails from the user's inbox. The query describes which emails \
         (e.g. \"recent 5 emails\", \"emails from boss\", \"unread emails about meeting\")."
    }

    fn parameters(&self) -> Value {
        query_schema("What emails to fetch: count, sender, subject keyword, unread filter")
    }

    async fn call(&self, args: &Value) -> Result<String, ToolError> {
        let query = require_str(args, "query")?;
        let parsed = EmailQuery::parse(query);
        tracing::debug!(criteria = %parsed.imap_criteria(), count = parsed.count, "email: searching inbox");

        let emails = self
            .mailbox
            .fetch(&parsed)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        if emails.is_empty() {
            return Ok(format!("📭 No emails found matching: {query}"));
        }

        let mut out = format!("📧 Found {} email(s):\n\n", emails.len());
        for (i, em) in emails.iter().take(parsed.count).enumerate() {
            out.push_str(&format!(
                "--- Email {} ---\nFrom: {}\nSubject: {}\nDate: {}\nPreview: {}\n\n",
                i + 1,
                em.from,
                em.subject,
                em.date,
                preview(&em.body, PREVIEW_CHARS)
            ));
        }
        Ok(out)
    }
}

pub struct SendEmailTool {
    mailbox: Arc<dyn Mailbox>,
}

impl SendEmailTool {
    pub fn new(mailbox: Arc<dyn Mailbox>) -> Self {
        Self { mailbox }
    }
}

#[async_trait]
impl LocalTool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send an email. The query must contain the recipient address, a subject and the message \
         body (e.g. \"send email to john@example.com subject 'Meeting' message 'Hi, let's meet'\")."
    }

    fn parameters(&self) -> Value {
        query_schema("Recipient, subject and message body in free text")
    }

    async fn call(&self, args: &Value) -> Result<String, ToolError> {
        let query = require_str(args, "query")?;
        let email = OutgoingEmail::parse(query).map_err(|e| ToolError::Execution(e.to_string()))?;

        self.mailbox
            .send(&email)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        tracing::info!(to = %email.to, "email: sent");
        Ok(format!(
            "✅ Email sent successfully!\n\nTo: {}\nSubject: {}\nMessage: {}",
            email.to,
            email.subject,
            preview(&email.body, PREVIEW_CHARS)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeMailbox {
        inbox: Vec<EmailSummary>,
        queries: Mutex<Vec<EmailQuery>>,
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailbox for FakeMailbox {
        async fn fetch(&self, query: &EmailQuery) -> Result<Vec<EmailSummary>, MailboxError> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.inbox.iter().take(query.count).cloned().collect())
        }
        async fn send(&self, email: &OutgoingEmail) -> Result<(), MailboxError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    #[test]
    fn read_query_defaults() {
        let q = EmailQuery::parse("show me my recent emails");
        assert_eq!(q.count, DEFAULT_COUNT);
        assert!(!q.unread_only);
        assert_eq!(q.sender, None);
        assert_eq!(q.imap_criteria(), "ALL");
    }

    #[test]
    fn read_query_filters() {
        let q = EmailQuery::parse("Find 50 unread emails from John@Example.com about invoice");
        assert_eq!(q.count, MAX_COUNT);
        assert!(q.unread_only);
        assert_eq!(q.sender.as_deref(), Some("john@example.com"));
        assert_eq!(q.subject.as_deref(), Some("invoice"));
        assert_eq!(q.imap_criteria(), r#"UNSEEN FROM "john@example.com" SUBJECT "invoice""#);

        assert_eq!(EmailQuery::parse("3 recent emails").count, 3);
        assert_eq!(EmailQuery::parse("subject report").subject.as_deref(), Some("report"));
    }

    #[test]
    fn compose_with_subject_and_message() {
        let e = OutgoingEmail::parse("send email to test@example.com subject 'Test' message 'Hello World'").unwrap();
        assert_eq!(e.to, "test@example.com");
        assert_eq!(e.subject, "Test");
        assert_eq!(e.body, "Hello World");
    }

    #[test]
    fn compose_about_with_colon_body() {
        let e = OutgoingEmail::parse("Email boss@company.com about the project update: We completed phase 1")
            .unwrap();
        assert_eq!(e.subject, "the project update");
        assert_eq!(e.body, "We completed phase 1");
    }

    #[test]
    fn compose_errors() {
        assert_eq!(OutgoingEmail::parse("send a note to bob"), Err(ComposeError::NoRecipient));
        assert_eq!(
            OutgoingEmail::parse("email bob@example.com"),
            Err(ComposeError::NoBody("bob@example.com".into()))
        );
    }

    #[tokio::test]
    async fn read_tool_formats_results() {
        let mailbox = Arc::new(FakeMailbox {
            inbox: vec![EmailSummary {
                from: "ann@example.com".into(),
                subject: "Lunch".into(),
                date: "Mon, 1 Jan 2024".into(),
                body: "Noon?".into(),
            }],
            ..Default::default()
        });
        let tool = ReadEmailsTool::new(mailbox.clone());
        let out = tool.call(&json!({"query": "3 recent emails"})).await.unwrap();
        assert!(out.starts_with("📧 Found 1 email(s)"));
        assert!(out.contains("Subject: Lunch"));
        assert_eq!(mailbox.queries.lock().unwrap()[0].count, 3);
    }

    #[tokio::test]
    async fn read_tool_empty_inbox() {
        let tool = ReadEmailsTool::new(Arc::new(FakeMailbox::default()));
        let out = tool.call(&json!({"query": "unread"})).await.unwrap();
        assert_eq!(out, "📭 No emails found matching: unread");
    }

    #[tokio::test]
    async fn send_tool_reports_delivery() {
        let mailbox = Arc::new(FakeMailbox::default());
        let tool = SendEmailTool::new(mailbox.clone());
        let out = tool
            .call(&json!({"query": "send email to a@b.io subject Hi message See you soon"}))
            .await
            .unwrap();
        assert!(out.contains("To: a@b.io"));
        assert_eq!(mailbox.sent.lock().unwrap()[0].body, "See you soon");
    }

    #[tokio::test]
    async fn unconfigured_mailbox_fails_cleanly() {
        let tool = ReadEmailsTool::new(Arc::new(UnconfiguredMailbox));
        let err = tool.call(&json!({"query": "emails"})).await.unwrap_err();
        assert!(err.to_string().contains("EMAIL_ADDRESS"));
        assert!(tool.call(&json!({})).await.is_err());
    }
}
