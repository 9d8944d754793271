//! Wire grammar for the emubridge emulator protocol.
//!
//! A message is a batch of statements joined by `"; "`. Every statement is one of
//! `UPDATE`, `RESET`, `GET`, `SET`, or an HTTP-shaped `POST` whose body carries either a
//! screenshot or another, form-encoded statement batch. This crate only parses; it never
//! touches a socket or any runtime state.

#![allow(missing_docs)]

mod error;
mod form;
mod http;
mod statement;

pub use error::SyntaxError;
pub use form::{
    classify_body, form_unescape, percent_unescape, percent_unescape_bytes, BodyKind,
    MARKER_SCAN_LIMIT,
};
pub use http::{PostRequest, HEADER_TERMINATOR, POST_ACK};
pub use statement::{statements, SetTarget, Statement, Statements, STATEMENT_SEPARATOR};
