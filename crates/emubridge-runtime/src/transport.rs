//! Byte transport under a bridge session.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;

use crate::error::RuntimeError;

/// Size of one receive. Matches what the emulator-side socket expects to fit in a read.
pub const RECEIVE_BUFFER: usize = 38_500;

pub trait Transport {
    /// Returns up to `limit` bytes. An orderly close by the peer is `ConnectionReset`.
    fn receive(&mut self, limit: usize) -> Result<Vec<u8>, RuntimeError>;

    fn send(&mut self, bytes: &[u8]) -> Result<(), RuntimeError>;
}

impl Transport for TcpStream {
    fn receive(&mut self, limit: usize) -> Result<Vec<u8>, RuntimeError> {
        let mut buffer = vec![0; limit];
        let read = self.read(&mut buffer).map_err(map_io_error)?;
        if read == 0 {
            return Err(RuntimeError::ConnectionReset);
        }
        buffer.truncate(read);
        Ok(buffer)
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), RuntimeError> {
        self.write_all(bytes).map_err(map_io_error)?;
        self.flush().map_err(map_io_error)
    }
}

fn map_io_error(err: std::io::Error) -> RuntimeError {
    match err.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => RuntimeError::Timeout,
        ErrorKind::ConnectionReset
        | ErrorKind::ConnectionAborted
        | ErrorKind::BrokenPipe
        | ErrorKind::UnexpectedEof => RuntimeError::ConnectionReset,
        _ => RuntimeError::Io(err),
    }
}


#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Duration;

    use super::*;

    #[test]
    fn tcp_read_timeout_and_close_are_classified() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        let mut client = TcpStream::connect(addr).expect("connect");
        let (mut server, _) = listener.accept().expect("accept");
        server
            .set_read_timeout(Some(Duration::from_millis(50)))
            .expect("timeout");

        assert!(matches!(
            server.receive(RECEIVE_BUFFER),
            Err(RuntimeError::Timeout)
        ));

        client.send(b"UPDATE").expect("send");
        assert_eq!(server.receive(RECEIVE_BUFFER).expect("read"), b"UPDATE");

        drop(client);
        assert!(matches!(
            server.receive(RECEIVE_BUFFER),
            Err(RuntimeError::ConnectionReset)
        ));
    }
}
