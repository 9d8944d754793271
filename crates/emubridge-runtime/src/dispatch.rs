//! Per-connection statement dispatch.
//!
//! One received message is a batch of statements. `GET` answers are collected and sent
//! back as a single `"; "`-joined reply, prefixed by the POST acknowledgment when the
//! batch carried a POST. A `payload=` body is itself a batch; it is unwrapped and run
//! through the same loop, up to `max_unwrap_depth` levels. A message that carried a
//! POST ends the connection once its reply is out: the acknowledgment has no
//! `Content-Length`, so the emulator reads it until EOF.

use emubridge_syntax::{
    classify_body, form_unescape, statements, BodyKind, PostRequest, Statement,
    POST_ACK, STATEMENT_SEPARATOR,
};
use smol_str::SmolStr;
use tracing::{debug, trace, warn};

use crate::bridge::Bridge;
use crate::error::RuntimeError;
use crate::screenshot::Frame;
use crate::state::BridgeState;
use crate::transport::{Transport, RECEIVE_BUFFER};

/// Written in place of a `GET` that produced no value.
pub const NONE_REPLY: &str = "None";

/// Response accumulated while one message is processed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    ack: bool,
    ack_sent: bool,
    close: bool,
    parts: Vec<String>,
}

impl Reply {
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// A POST was seen and its acknowledgment has not gone out yet.
    #[must_use]
    pub fn ack_pending(&self) -> bool {
        self.ack && !self.ack_sent
    }

    #[must_use]
    pub fn ack_sent(&self) -> bool {
        self.ack_sent
    }

    /// The connection closes after this reply is sent.
    #[must_use]
    pub fn closes(&self) -> bool {
        self.close
    }

    /// Wire form: the pending acknowledgment, then the `GET` answers.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut out = String::new();
        if self.ack_pending() {
            out.push_str(POST_ACK);
        }
        out.push_str(&self.parts.join(STATEMENT_SEPARATOR));
        out
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.ack_pending() && self.parts.is_empty()
    }

    fn push(&mut self, part: String) {
        self.parts.push(part);
    }

    /// Acknowledgment plus everything answered so far, for a sender that withholds
    /// its POST body until acknowledged.
    fn take_early_ack(&mut self) -> String {
        let mut out = String::from(POST_ACK);
        out.push_str(&self.parts.join(STATEMENT_SEPARATOR));
        self.parts.clear();
        self.ack = true;
        self.ack_sent = true;
        out
    }
}

/// One connection's view of the bridge.
#[derive(Debug)]
pub struct Session<'b, T> {
    bridge: &'b Bridge,
    transport: T,
    peer: SmolStr,
}

impl<'b, T: Transport> Session<'b, T> {
    pub fn new(bridge: &'b Bridge, transport: T, peer: impl Into<SmolStr>) -> Self {
        Self {
            bridge,
            transport,
            peer: peer.into(),
        }
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Serves messages until a POST exchange completes (`Ok`) or a connection-fatal
    /// error ends the session.
    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let served = self
                .transport
                .receive(RECEIVE_BUFFER)
                .and_then(|bytes| self.serve(&bytes));
            match served {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(err) if err.is_connection_fatal() => return Err(err),
                Err(err) => warn!("bridge {}: {err}", self.peer),
            }
        }
    }

    /// Handles one received message and sends the reply, if there is one.
    ///
    /// Returns `true` when the connection must be closed.
    pub fn serve(&mut self, bytes: &[u8]) -> Result<bool, RuntimeError> {
        let message = String::from_utf8_lossy(bytes);
        let reply = self.handle_message(&message)?;
        if !reply.is_empty() {
            self.transport.send(reply.encode().as_bytes())?;
        }
        Ok(reply.closes())
    }

    /// Runs every statement of `message`, unwrapping `payload=` bodies as they appear.
    ///
    /// Only connection-fatal errors are returned; statement-level failures are logged
    /// and the batch continues.
    pub fn handle_message(&mut self, message: &str) -> Result<Reply, RuntimeError> {
        let mut reply = Reply::default();
        let mut batch = self.run_batch(message, &mut reply)?;
        let mut depth = 0;
        while let Some(inner) = batch {
            depth += 1;
            if depth > self.bridge.settings().max_unwrap_depth {
                warn!(
                    "bridge {}: payload nested deeper than {} levels, dropped",
                    self.peer,
                    self.bridge.settings().max_unwrap_depth
                );
                break;
            }
            trace!("bridge {}: unwrapped payload level {depth}: {inner}", self.peer);
            batch = self.run_batch(&inner, &mut reply)?;
        }
        Ok(reply)
    }

    /// Returns the unwrapped batch when the statements end in a `payload=` POST.
    fn run_batch(
        &mut self,
        batch: &str,
        reply: &mut Reply,
    ) -> Result<Option<String>, RuntimeError> {
        for parsed in statements(batch) {
            let statement = match parsed {
                Ok(statement) => statement,
                Err(err) => {
                    let get = err.verb() == Some("GET");
                    let err = RuntimeError::from(err);
                    if err.is_connection_fatal() {
                        return Err(err);
                    }
                    warn!("bridge {}: {err}", self.peer);
                    if get {
                        reply.push(NONE_REPLY.to_string());
                    }
                    continue;
                }
            };
            match statement {
                Statement::Update => {
                    let actions = self.bridge.update();
                    trace!("bridge {}: UPDATE actions={actions}", self.peer);
                }
                Statement::Reset => self.bridge.with_state(BridgeState::reset_data),
                Statement::Get { name, index } => {
                    let part = match self.bridge.with_state(|state| state.get(name, index)) {
                        Ok(value) => value,
                        Err(err) => {
                            debug!("bridge {}: GET {name}: {err}", self.peer);
                            NONE_REPLY.to_string()
                        }
                    };
                    reply.push(part);
                }
                Statement::Set {
                    name,
                    target,
                    value,
                } => {
                    if let Err(err) = self
                        .bridge
                        .with_state(|state| state.set(name, target, value))
                    {
                        warn!("bridge {}: SET {name}: {err}", self.peer);
                    }
                }
                Statement::Post(post) => return self.handle_post(post, reply),
            }
        }
        Ok(None)
    }

    fn handle_post(
        &mut self,
        post: PostRequest<'_>,
        reply: &mut Reply,
    ) -> Result<Option<String>, RuntimeError> {
        let expected = post.content_length();
        let limit = self.bridge.settings().max_body_bytes;
        if expected > limit {
            return Err(RuntimeError::ProtocolFraming(
                format!("Content-Length {expected} exceeds limit of {limit} bytes").into(),
            ));
        }
        reply.close = true;
        if post.body_withheld() {
            let early = reply.take_early_ack();
            self.transport.send(early.as_bytes())?;
        } else {
            reply.ack = true;
        }

        let mut body = post.body().as_bytes().to_vec();
        while body.len() < expected {
            let chunk = self.transport.receive(RECEIVE_BUFFER)?;
            body.extend_from_slice(&chunk);
            if body.len() > limit {
                return Err(RuntimeError::ProtocolFraming(
                    format!("POST body exceeds limit of {limit} bytes").into(),
                ));
            }
        }
        trace!(
            "bridge {}: POST {} body={} bytes",
            self.peer,
            post.request_line(),
            body.len()
        );

        match classify_body(&body) {
            Some((BodyKind::Screenshot, offset)) => {
                self.store_screenshot(&body[offset..]);
                Ok(None)
            }
            Some((BodyKind::Payload, offset)) => {
                let encoded = String::from_utf8_lossy(&body[offset..]);
                match form_unescape(encoded.trim_end()) {
                    Ok(inner) => Ok(Some(inner)),
                    Err(err) => {
                        warn!("bridge {}: payload dropped: {err}", self.peer);
                        Ok(None)
                    }
                }
            }
            None => {
                let err = RuntimeError::MalformedStatement(
                    "POST body carries neither screenshot= nor payload=".into(),
                );
                warn!("bridge {}: {err}", self.peer);
                Ok(None)
            }
        }
    }

    fn store_screenshot(&mut self, data: &[u8]) {
        let grayscale = self.bridge.with_state(|state| state.grayscale());
        match Frame::from_form_data(data, grayscale) {
            Ok(frame) => {
                let (width, height) = frame.dimensions();
                let action = self.bridge.with_state(|state| state.store_screenshot(frame));
                debug!(
                    "bridge {}: screenshot {width}x{height} stored at action {action}",
                    self.peer
                );
            }
            Err(err) => warn!("bridge {}: {err}", self.peer),
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};

    use super::*;
    use crate::config::BridgeConfig;
    use crate::transport::scripted::ScriptedTransport;

    fn bridge() -> Bridge {
        Bridge::configure(&BridgeConfig::default()).expect("bridge")
    }

    fn post(body: &str) -> String {
        format!(
            "POST / HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    fn frame() -> Frame {
        Frame::Color(RgbImage::from_fn(8, 6, |x, y| {
            Rgb([(x * 30) as u8, (y * 40) as u8, 200])
        }))
    }

    #[test]
    fn get_answers_are_joined_in_order() {
        let bridge = bridge();
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");
        session
            .serve(b"SET x Int 5; SET names String[] [a,b]; GET x; GET missing; GET names 1; GET actions")
            .expect("serve");
        assert_eq!(
            session.transport().sent,
            vec!["Int 5; None; b; 0".to_string()]
        );
    }

    #[test]
    fn batch_without_gets_sends_nothing() {
        let bridge = bridge();
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");
        session.serve(b"UPDATE; UPDATE; SET x Int 1").expect("serve");
        assert!(session.transport().sent.is_empty());
        assert_eq!(bridge.with_state(|state| state.actions()), 2);
    }

    #[test]
    fn malformed_get_keeps_its_slot() {
        let bridge = bridge();
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");
        let reply = session
            .handle_message("SET x Int 3; GET x one; FROB; GET x")
            .expect("reply");
        assert_eq!(reply.parts(), ["None", "Int 3"]);
    }

    #[test]
    fn withheld_screenshot_body_is_read_after_early_ack() {
        let bridge = bridge();
        let body = frame().to_form_body().expect("form body");
        let split = body.len() / 2;
        let head = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            body.len()
        );
        let transport = ScriptedTransport::new([
            body[..split].as_bytes().to_vec(),
            body[split..].as_bytes().to_vec(),
        ]);
        let mut session = Session::new(&bridge, transport, "test");

        bridge.update();
        let close = session
            .serve(format!("GET actions; {head}").as_bytes())
            .expect("serve");
        assert!(close);

        let transport = session.into_transport();
        assert_eq!(transport.pending_reads(), 0);
        assert_eq!(transport.sent, vec![format!("{POST_ACK}1")]);
        bridge.with_state(|state| {
            assert_eq!(state.screenshots().get(1), Some(&frame()));
        });
    }

    #[test]
    fn inline_screenshot_acks_once_after_processing() {
        let bridge = bridge();
        let body = frame().to_form_body().expect("form body");
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");
        assert!(session.serve(post(&body).as_bytes()).expect("serve"));
        assert_eq!(session.transport().sent, vec![POST_ACK.to_string()]);
        assert_eq!(bridge.with_state(|state| state.screenshots().len()), 1);
    }

    #[test]
    fn payload_batches_are_unwrapped() {
        let bridge = bridge();
        let inner = "SET+speed_hint+Int+7%3B+GET+speed_hint%3B+GET+restart";
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");
        session
            .serve(post(&format!("payload={inner}")).as_bytes())
            .expect("serve");
        assert_eq!(
            session.transport().sent,
            vec![format!("{POST_ACK}Int 7; False")]
        );
    }

    fn nested_payload(levels: usize) -> String {
        let mut message = "GET actions".to_string();
        for _ in 0..levels {
            let encoded = urlencoding::encode(&message).replace("%20", "+");
            message = post(&format!("payload={encoded}"));
        }
        message
    }

    #[test]
    fn payload_nesting_is_bounded() {
        let bridge = bridge();
        let depth = bridge.settings().max_unwrap_depth;
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");

        let reply = session
            .handle_message(&nested_payload(depth))
            .expect("reply at the limit");
        assert_eq!(reply.parts(), ["0"]);

        let reply = session
            .handle_message(&nested_payload(depth + 1))
            .expect("reply past the limit");
        assert!(reply.parts().is_empty());
        assert!(reply.ack_pending());
        assert!(reply.closes());
    }

    #[test]
    fn undecodable_screenshot_and_unmarked_body_are_not_fatal() {
        let bridge = bridge();
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");
        session
            .serve(post("screenshot=bm90IGFuIGltYWdl").as_bytes())
            .expect("bad screenshot");
        session.serve(post("hello=world").as_bytes()).expect("no marker");
        assert_eq!(session.transport().sent.len(), 2);
        assert!(bridge.with_state(|state| state.screenshots().is_empty()));
    }

    #[test]
    fn framing_errors_end_the_session() {
        let bridge = bridge();
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");
        let err = session
            .serve(b"GET x; POST / HTTP/1.1\r\nHost: emulator\r\n\r\n")
            .expect_err("missing length");
        assert!(matches!(err, RuntimeError::ProtocolFraming(_)));

        let oversized = format!(
            "POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
            bridge.settings().max_body_bytes + 1
        );
        let err = session
            .serve(oversized.as_bytes())
            .expect_err("oversized body");
        assert!(err.is_connection_fatal());
    }

    #[test]
    fn run_returns_the_fatal_error() {
        let bridge = bridge();
        let transport = ScriptedTransport::new(["UPDATE", "GET actions"]);
        let mut session = Session::new(&bridge, transport, "test");
        assert!(matches!(session.run(), Err(RuntimeError::ConnectionReset)));
        assert_eq!(session.transport().sent, vec!["1".to_string()]);
    }

    #[test]
    fn run_ends_after_post_exchange() {
        let bridge = bridge();
        let transport = ScriptedTransport::new([
            "UPDATE; GET actions".to_string(),
            post("payload=GET+actions"),
            "GET actions".to_string(),
        ]);
        let mut session = Session::new(&bridge, transport, "test");
        assert!(session.run().is_ok());

        let transport = session.into_transport();
        assert_eq!(transport.pending_reads(), 1);
        assert_eq!(transport.sent, vec!["1".to_string(), format!("{POST_ACK}1")]);
    }

    #[test]
    fn batches_without_post_keep_the_connection() {
        let bridge = bridge();
        let mut session = Session::new(&bridge, ScriptedTransport::default(), "test");
        let reply = session.handle_message("UPDATE; GET actions").expect("reply");
        assert!(!reply.closes());
        assert!(!session.serve(b"RESET").expect("serve"));
    }
}
