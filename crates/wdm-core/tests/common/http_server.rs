//! Minimal HTTP/1.1 server for download tests.
//!
//! Serves static bodies per path, supports Range GET for resume, and keeps
//! a request log so tests can assert exactly which resources were fetched.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

pub struct TestServer {
    pub base_url: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    /// Requests seen so far, formatted as `"<path>"` or `"<path> range=<start>"`.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread serving `routes` (path -> body).
/// The server runs until the process exits.
pub fn start(routes: HashMap<String, Vec<u8>>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let routes = Arc::new(routes);
    let log = Arc::new(Mutex::new(Vec::new()));
    let server_log = Arc::clone(&log);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let log = Arc::clone(&server_log);
            thread::spawn(move || handle(stream, &routes, &log));
        }
    });
    TestServer {
        base_url: format!("http://127.0.0.1:{}", port),
        log,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    routes: &HashMap<String, Vec<u8>>,
    log: &Mutex<Vec<String>>,
) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (path, range) = parse_request(request);

    match range {
        Some(start) => log
            .lock()
            .unwrap()
            .push(format!("{} range={}", path, start)),
        None => log.lock().unwrap().push(path.clone()),
    }

    let body = match routes.get(&path) {
        Some(body) => body,
        None => {
            let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
            return;
        }
    };
    let total = body.len() as u64;

    if let Some(start) = range {
        if start >= total {
            let response = format!(
                "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\n\r\n",
                total
            );
            let _ = stream.write_all(response.as_bytes());
            return;
        }
        let slice = &body[start as usize..];
        let response = format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\nAccept-Ranges: bytes\r\n\r\n",
            slice.len(),
            start,
            total - 1,
            total
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(slice);
        return;
    }

    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\n\r\n",
        total
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(body);
}

/// Returns (path, optional range start for `Range: bytes=X-`).
fn parse_request(request: &str) -> (String, Option<u64>) {
    let mut path = String::new();
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if path.is_empty() {
            path = line
                .split_whitespace()
                .nth(1)
                .unwrap_or("/")
                .to_string();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((start, _)) = spec.split_once('-') {
                        range = start.trim().parse::<u64>().ok();
                    }
                }
            }
        }
    }
    (path, range)
}
