//! RFC 822 message parsing with `mail-parser`.
//!
//! Turns a raw message into a [`NewMessage`]. Headers that are absent or
//! unreadable become `None`; the rule engine decides later whether a rule
//! actually needs them.

use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};

use crate::error::IngestError;
use crate::store::NewMessage;

/// Parse a raw message. Input without any header is rejected.
///
/// The external ID is the `Message-ID` header, or `fallback_id` when the
/// message has none.
pub fn parse_raw_email(raw: &[u8], fallback_id: &str) -> Result<NewMessage, IngestError> {
    let parsed = MessageParser::default()
        .parse(raw)
        .filter(|m| !m.headers().is_empty())
        .ok_or_else(|| IngestError::Unparseable(fallback_id.to_string()))?;

    let external_id = parsed
        .message_id()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .unwrap_or(fallback_id)
        .to_string();

    Ok(NewMessage {
        external_id,
        sender: extract_sender(&parsed),
        subject: parsed.subject().map(|s| s.to_string()),
        body: extract_text(&parsed),
        received_at: extract_date(&parsed),
    })
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// The first `From` address.
fn extract_sender(parsed: &mail_parser::Message) -> Option<String> {
    parsed
        .from()
        .and_then(|addr| addr.first())
        .and_then(|a| a.address())
        .map(|s| s.to_string())
}

/// The first text body, falling back to stripped HTML, then to a text attachment.
fn extract_text(parsed: &mail_parser::Message) -> Option<String> {
    if let Some(text) = parsed.body_text(0) {
        return Some(text.into_owned());
    }
    if let Some(html) = parsed.body_html(0) {
        return Some(strip_html(html.as_ref()));
    }
    for part in parsed.attachments() {
        let part: &mail_parser::MessagePart = part;
        if let Some(ct) = MimeHeaders::content_type(part)
            && ct.ctype() == "text"
            && let Ok(text) = std::str::from_utf8(part.contents())
        {
            return Some(text.to_string());
        }
    }
    None
}

/// The `Date` header as UTC.
fn extract_date(parsed: &mail_parser::Message) -> Option<DateTime<Utc>> {
    parsed
        .date()
        .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    const PLAIN: &str = "Message-ID: <abc123@mail.example>\r\n\
From: \"Shop\" <noreply@shop.example>\r\n\
To: me@example.com\r\n\
Subject: Your order has shipped\r\n\
Date: Tue, 10 Mar 2026 09:30:00 +0100\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Tracking number 42.\r\n";

    #[test]
    fn parses_headers_and_body() {
        let msg = parse_raw_email(PLAIN.as_bytes(), "fallback").unwrap();
        assert_eq!(msg.external_id, "abc123@mail.example");
        assert_eq!(msg.sender.as_deref(), Some("noreply@shop.example"));
        assert_eq!(msg.subject.as_deref(), Some("Your order has shipped"));
        assert_eq!(msg.body.as_deref().map(str::trim), Some("Tracking number 42."));
        assert_eq!(
            msg.received_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 10, 8, 30, 0).unwrap())
        );
    }

    #[test]
    fn missing_headers_become_none() {
        let raw = "To: me@example.com\r\n\r\nJust a body.\r\n";
        let msg = parse_raw_email(raw.as_bytes(), "file-7").unwrap();
        assert_eq!(msg.external_id, "file-7");
        assert!(msg.sender.is_none());
        assert!(msg.subject.is_none());
        assert!(msg.received_at.is_none());
        assert_eq!(msg.body.as_deref().map(str::trim), Some("Just a body."));
    }

    #[test]
    fn html_only_body_is_stripped() {
        let raw = "From: a@example.com\r\n\
Subject: News\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<html><body><p>Hello   <b>there</b></p></body></html>\r\n";
        let msg = parse_raw_email(raw.as_bytes(), "x").unwrap();
        assert!(msg.body.as_deref().unwrap().contains("Hello"));
        assert!(!msg.body.as_deref().unwrap().contains('<'));
    }

    #[test]
    fn multipart_prefers_plain_text() {
        let raw = "From: a@example.com\r\n\
Subject: Both\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/alternative; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
plain version\r\n\
--b1\r\n\
Content-Type: text/html; charset=utf-8\r\n\
\r\n\
<p>html version</p>\r\n\
--b1--\r\n";
        let msg = parse_raw_email(raw.as_bytes(), "x").unwrap();
        assert_eq!(msg.body.as_deref().map(str::trim), Some("plain version"));
    }

    #[test]
    fn empty_input_is_unparseable() {
        let err = parse_raw_email(b"", "empty").unwrap_err();
        assert!(matches!(err, IngestError::Unparseable(id) if id == "empty"));
    }

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
        assert_eq!(strip_html("No HTML here"), "No HTML here");
        assert_eq!(strip_html(""), "");
    }
}
