//! Minimal in-process HTTP origin for exercising the fetch path in tests.
#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

pub(crate) struct TestOrigin {
    pub(crate) base_url: String,
}

/// Serve `responses` in order, one per connection, then stop listening.
/// Connections after the last response are refused, so a test that expects
/// "no network call" fails loudly if one happens.
pub(crate) fn spawn_origin(responses: Vec<(u16, Vec<u8>)>) -> TestOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        for (status, body) in responses {
            let Ok((mut stream, _)) = listener.accept() else {
                break;
            };

            // Drain the request headers before answering.
            let mut buf = [0u8; 1024];
            let mut seen: Vec<u8> = Vec::new();
            while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => seen.extend_from_slice(&buf[..n]),
                }
            }

            let reason = match status {
                200 => "OK",
                404 => "Not Found",
                500 => "Internal Server Error",
                _ => "Status",
            };
            let header = format!(
                "HTTP/1.1 {status} {reason}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes());
            let _ = stream.write_all(&body);
            let _ = stream.flush();
        }
    });

    TestOrigin {
        base_url: format!("http://127.0.0.1:{port}"),
    }
}

/// Serve one response whose declared content-length exceeds the bytes
/// actually sent, then close the connection — an interrupted transfer.
pub(crate) fn spawn_truncating_origin(declared_len: usize, body: Vec<u8>) -> TestOrigin {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    thread::spawn(move || {
        let Ok((mut stream, _)) = listener.accept() else {
            return;
        };

        let mut buf = [0u8; 1024];
        let mut seen: Vec<u8> = Vec::new();
        while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => seen.extend_from_slice(&buf[..n]),
            }
        }

        let header = format!(
            "HTTP/1.1 200 OK\r\ncontent-length: {declared_len}\r\nconnection: close\r\n\r\n"
        );
        let _ = stream.write_all(header.as_bytes());
        let _ = stream.write_all(&body);
        let _ = stream.flush();
        // Dropping the stream here closes the connection mid-body.
    });

    TestOrigin {
        base_url: format!("http://127.0.0.1:{port}"),
    }
}
