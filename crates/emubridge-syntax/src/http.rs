//! The minimal HTTP-POST subset spoken by the emulator's `comm.httpPost*` helpers.

use smol_str::SmolStr;

use crate::error::SyntaxError;

pub const HEADER_TERMINATOR: &str = "\r\n\r\n";

/// Sent for every POST, including the early acknowledgment that releases a withheld body.
pub const POST_ACK: &str = "HTTP/1.1 200 OK\r\n\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostRequest<'a> {
    head: &'a str,
    body: &'a str,
    content_length: usize,
}

impl<'a> PostRequest<'a> {
    pub fn parse(text: &'a str) -> Result<Self, SyntaxError> {
        let Some(head_end) = text.find(HEADER_TERMINATOR) else {
            return Err(SyntaxError::UnterminatedHead);
        };
        let head = &text[..head_end];
        let body = &text[head_end + HEADER_TERMINATOR.len()..];
        let raw_length =
            find_header(head, "content-length").ok_or(SyntaxError::MissingContentLength)?;
        let content_length = raw_length
            .parse::<usize>()
            .map_err(|_| SyntaxError::InvalidContentLength(SmolStr::new(raw_length)))?;
        Ok(Self {
            head,
            body,
            content_length,
        })
    }

    /// `POST /path HTTP/1.1`
    #[must_use]
    pub fn request_line(&self) -> &'a str {
        self.head.lines().next().unwrap_or_default()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&'a str> {
        find_header(self.head, name)
    }

    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content_length
    }

    /// Body bytes that arrived together with the head.
    #[must_use]
    pub fn body(&self) -> &'a str {
        self.body
    }

    /// The sender stops at the blank line and waits for an acknowledgment before
    /// sending the body.
    #[must_use]
    pub fn body_withheld(&self) -> bool {
        self.body.is_empty() && self.content_length > 0
    }
}

fn find_header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then_some(value.trim())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: &str = "POST /screenshot HTTP/1.1\r\nHost: 127.0.0.1:1337\r\ncontent-length: 38400\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\n";

    #[test]
    fn reads_head_fields() {
        let post = PostRequest::parse(HEAD).expect("parse head");
        assert_eq!(post.request_line(), "POST /screenshot HTTP/1.1");
        assert_eq!(post.content_length(), 38_400);
        assert_eq!(post.header("host"), Some("127.0.0.1:1337"));
        assert_eq!(post.header("Accept"), None);
        assert!(post.body_withheld());
    }

    #[test]
    fn body_sent_with_head_is_not_withheld() {
        let text = "POST / HTTP/1.1\r\nContent-Length: 14\r\n\r\npayload=UPDATE";
        let post = PostRequest::parse(text).expect("parse post");
        assert_eq!(post.body(), "payload=UPDATE");
        assert!(!post.body_withheld());
    }

    #[test]
    fn framing_errors() {
        assert_eq!(
            PostRequest::parse("POST / HTTP/1.1\r\nHost: x\r\n\r\n"),
            Err(SyntaxError::MissingContentLength)
        );
        assert_eq!(
            PostRequest::parse("POST / HTTP/1.1\r\nContent-Length: lots\r\n\r\n"),
            Err(SyntaxError::InvalidContentLength("lots".into()))
        );
        assert_eq!(
            PostRequest::parse("POST / HTTP/1.1\r\nContent-Length: 4\r\n"),
            Err(SyntaxError::UnterminatedHead)
        );
        assert!(SyntaxError::UnterminatedHead.is_framing());
        assert!(!SyntaxError::MissingName { verb: "GET" }.is_framing());
        assert_eq!(SyntaxError::UnterminatedHead.verb(), Some("POST"));
        assert_eq!(SyntaxError::TrailingTokens("a b c".into()).verb(), Some("GET"));
        assert_eq!(SyntaxError::UnknownVerb("FROB".into()).verb(), None);
    }
}
