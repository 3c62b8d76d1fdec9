//! The two non-blocking TCP listeners. Each accepted
//! connection is a single-shot line exchange: read up to 4096 bytes,
//! hand them to a handler, write one reply, half-close.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};

pub const MAX_REQUEST_BYTES: usize = 4096;

/// Bind a non-blocking listener at `addr`. Non-blocking so the main
/// loop's accept attempt returns immediately when nobody is waiting.
pub fn bind_nonblocking(addr: std::net::SocketAddr) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Accept at most one pending connection and run `handler` against its
/// request bytes (truncated to `MAX_REQUEST_BYTES`), writing back
/// whatever it returns before half-closing the write side. A `WouldBlock`
/// (nobody waiting) is not an error — it's the normal "nothing to do"
/// case for this main-loop step.
pub fn service_one<F>(listener: &TcpListener, mut handler: F) -> std::io::Result<()>
where
    F: FnMut(&str) -> String,
{
    let (mut stream, _peer) = match listener.accept() {
        Ok(pair) => pair,
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
        Err(e) => return Err(e),
    };
    if let Err(e) = stream.set_nonblocking(false) {
        tracing::warn!(error = %e, "failed to switch accepted socket to blocking mode");
    }

    if let Err(e) = handle_stream(&mut stream, &mut handler) {
        tracing::warn!(error = %e, "TCP connection error, dropping connection");
    }
    Ok(())
}

fn handle_stream<F>(stream: &mut TcpStream, handler: &mut F) -> std::io::Result<()>
where
    F: FnMut(&str) -> String,
{
    let mut buf = [0u8; MAX_REQUEST_BYTES];
    let n = stream.read(&mut buf)?;
    let request = String::from_utf8_lossy(&buf[..n]);
    let request = request.trim_end_matches(['\r', '\n']);

    let reply = handler(request);
    stream.write_all(reply.as_bytes())?;
    stream.write_all(b"\n")?;
    stream.flush()?;
    stream.shutdown(Shutdown::Write)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;
    use std::net::TcpStream as ClientStream;

    #[test]
    fn services_one_connection_and_half_closes() {
        let listener = bind_nonblocking("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = std::thread::spawn(move || {
            let mut s = ClientStream::connect(addr).unwrap();
            s.write_all(b"PING OFF\n").unwrap();
            s.shutdown(Shutdown::Write).unwrap();
            let mut out = String::new();
            s.read_to_string(&mut out).unwrap();
            out
        });

        // Give the client a moment to connect before polling accept.
        std::thread::sleep(std::time::Duration::from_millis(50));
        service_one(&listener, |req| format!("OK: {req}")).unwrap();

        let reply = client.join().unwrap();
        assert_eq!(reply.trim_end(), "OK: PING OFF");
    }

    #[test]
    fn accept_returns_immediately_with_no_client() {
        let listener = bind_nonblocking("127.0.0.1:0".parse().unwrap()).unwrap();
        let start = std::time::Instant::now();
        service_one(&listener, |req| req.to_string()).unwrap();
        assert!(start.elapsed() < std::time::Duration::from_millis(100));
    }
}
