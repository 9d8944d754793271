//! Statement tokenizer and parser.

use smol_str::SmolStr;

use crate::error::SyntaxError;
use crate::http::PostRequest;

pub const STATEMENT_SEPARATOR: &str = "; ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Statement<'a> {
    Update,
    Reset,
    Get {
        name: &'a str,
        index: Option<usize>,
    },
    Set {
        name: &'a str,
        target: SetTarget<'a>,
        value: &'a str,
    },
    Post(PostRequest<'a>),
}

/// Second token of a `SET` statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetTarget<'a> {
    /// `SET name <idx> <value>`: write one element of an existing list.
    Index(usize),
    /// `SET name <type> <value>`: (re)declare the variable.
    Tag(&'a str),
    /// `SET name <value>`: only meaningful for writable reserved names.
    Bare,
}

impl<'a> Statement<'a> {
    pub fn parse(text: &'a str) -> Result<Self, SyntaxError> {
        let text = text.trim_start();
        if text.starts_with("POST") {
            return PostRequest::parse(text).map(Statement::Post);
        }
        let text = text.trim_end();
        let (verb, args) = match text.split_once(' ') {
            Some((verb, args)) => (verb, args.trim_start()),
            None => (text, ""),
        };
        match verb {
            "UPDATE" => no_arguments("UPDATE", args).map(|()| Statement::Update),
            "RESET" => no_arguments("RESET", args).map(|()| Statement::Reset),
            "GET" => parse_get(args),
            "SET" => parse_set(args),
            other => Err(SyntaxError::UnknownVerb(SmolStr::new(other))),
        }
    }

    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Statement::Update => "UPDATE",
            Statement::Reset => "RESET",
            Statement::Get { .. } => "GET",
            Statement::Set { .. } => "SET",
            Statement::Post(_) => "POST",
        }
    }
}

fn no_arguments(verb: &'static str, args: &str) -> Result<(), SyntaxError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(SyntaxError::UnexpectedArguments { verb })
    }
}

fn parse_get(args: &str) -> Result<Statement<'_>, SyntaxError> {
    let mut tokens = args.split(' ').filter(|token| !token.is_empty());
    let name = tokens.next().ok_or(SyntaxError::MissingName { verb: "GET" })?;
    let index = tokens
        .next()
        .map(|token| parse_index("GET", token))
        .transpose()?;
    if tokens.next().is_some() {
        return Err(SyntaxError::TrailingTokens(SmolStr::new(args)));
    }
    Ok(Statement::Get { name, index })
}

fn parse_set(args: &str) -> Result<Statement<'_>, SyntaxError> {
    let mut parts = args.splitn(3, ' ');
    let name = parts
        .next()
        .filter(|name| !name.is_empty())
        .ok_or(SyntaxError::MissingName { verb: "SET" })?;
    let second = parts
        .next()
        .ok_or_else(|| SyntaxError::MissingValue(SmolStr::new(name)))?;
    let Some(value) = parts.next() else {
        return Ok(Statement::Set {
            name,
            target: SetTarget::Bare,
            value: second,
        });
    };
    let target = if second.bytes().all(|byte| byte.is_ascii_digit()) && !second.is_empty() {
        SetTarget::Index(parse_index("SET", second)?)
    } else {
        SetTarget::Tag(second)
    };
    Ok(Statement::Set {
        name,
        target,
        value,
    })
}

fn parse_index(verb: &'static str, text: &str) -> Result<usize, SyntaxError> {
    text.parse::<usize>()
        .map_err(|_| SyntaxError::InvalidIndex {
            verb,
            text: SmolStr::new(text),
        })
}

/// Splits a message into statements.
///
/// A token beginning with `POST` swallows the rest of the message: HTTP heads and
/// bodies may legitimately contain the separator.
#[must_use]
pub fn statements(message: &str) -> Statements<'_> {
    Statements {
        rest: Some(message),
    }
}

#[derive(Debug, Clone)]
pub struct Statements<'a> {
    rest: Option<&'a str>,
}

impl<'a> Iterator for Statements<'a> {
    type Item = Result<Statement<'a>, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let rest = self.rest?;
            if rest.trim_start().starts_with("POST") {
                self.rest = None;
                return Some(Statement::parse(rest));
            }
            let token = match rest.split_once(STATEMENT_SEPARATOR) {
                Some((token, remainder)) => {
                    self.rest = Some(remainder);
                    token
                }
                None => {
                    self.rest = None;
                    rest
                }
            };
            if token.trim().is_empty() {
                continue;
            }
            return Some(Statement::parse(token));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_all(message: &str) -> Vec<Result<Statement<'_>, SyntaxError>> {
        statements(message).collect()
    }

    #[test]
    fn splits_batch_in_order() {
        let parsed = parse_all("SET x Int 5; GET x; UPDATE; GET arr 2; RESET");
        assert_eq!(
            parsed,
            vec![
                Ok(Statement::Set {
                    name: "x",
                    target: SetTarget::Tag("Int"),
                    value: "5",
                }),
                Ok(Statement::Get {
                    name: "x",
                    index: None,
                }),
                Ok(Statement::Update),
                Ok(Statement::Get {
                    name: "arr",
                    index: Some(2),
                }),
                Ok(Statement::Reset),
            ]
        );
    }

    #[test]
    fn numeric_second_token_addresses_list_element() {
        assert_eq!(
            Statement::parse("SET distance 12 1893"),
            Ok(Statement::Set {
                name: "distance",
                target: SetTarget::Index(12),
                value: "1893",
            })
        );
    }

    #[test]
    fn string_value_keeps_inner_spaces() {
        assert_eq!(
            Statement::parse("SET title String Luigi Raceway"),
            Ok(Statement::Set {
                name: "title",
                target: SetTarget::Tag("String"),
                value: "Luigi Raceway",
            })
        );
    }

    #[test]
    fn two_token_set_is_bare() {
        assert_eq!(
            Statement::parse("SET restart False"),
            Ok(Statement::Set {
                name: "restart",
                target: SetTarget::Bare,
                value: "False",
            })
        );
    }

    #[test]
    fn negative_second_token_is_a_tag_not_an_index() {
        assert_eq!(
            Statement::parse("SET x -1 4"),
            Ok(Statement::Set {
                name: "x",
                target: SetTarget::Tag("-1"),
                value: "4",
            })
        );
    }

    #[test]
    fn trailing_line_break_is_ignored() {
        assert_eq!(Statement::parse("UPDATE\r\n"), Ok(Statement::Update));
        assert_eq!(
            Statement::parse("GET restart\n"),
            Ok(Statement::Get {
                name: "restart",
                index: None,
            })
        );
    }

    #[test]
    fn malformed_statements_are_reported_individually() {
        let parsed = parse_all("FROB x; GET; GET a b c; UPDATE now; SET x; GET y");
        assert_eq!(
            parsed,
            vec![
                Err(SyntaxError::UnknownVerb("FROB".into())),
                Err(SyntaxError::MissingName { verb: "GET" }),
                Err(SyntaxError::InvalidIndex {
                    verb: "GET",
                    text: "b".into(),
                }),
                Err(SyntaxError::UnexpectedArguments { verb: "UPDATE" }),
                Err(SyntaxError::MissingValue("x".into())),
                Ok(Statement::Get {
                    name: "y",
                    index: None,
                }),
            ]
        );
    }

    #[test]
    fn empty_tokens_are_skipped() {
        assert_eq!(parse_all(""), Vec::new());
        assert_eq!(parse_all("UPDATE; ; UPDATE"), vec![Ok(Statement::Update); 2]);
    }

    #[test]
    fn post_swallows_rest_of_message() {
        let message = "GET x; POST / HTTP/1.1\r\nContent-Type: text/plain; charset=utf-8\r\nContent-Length: 9\r\n\r\npayload=a";
        let parsed = parse_all(message);
        assert_eq!(parsed.len(), 2);
        let Ok(Statement::Post(post)) = &parsed[1] else {
            panic!("expected POST, got {:?}", parsed[1]);
        };
        assert_eq!(post.content_length(), 9);
        assert_eq!(post.body(), "payload=a");
    }
}
