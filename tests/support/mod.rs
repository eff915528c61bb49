//! Scripted HTTP fixture for driving the client against canned responses.
//!
//! Binds a local listener and answers each request by exact path match
//! (query string ignored for routing, but recorded for assertions). A
//! `Drop` route accepts the connection and closes it without responding,
//! which the client sees as a transient transport failure.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub enum Reply {
    Json(&'static str),
    Bytes(Vec<u8>),
    Status(u16, &'static str),
    Drop,
}

#[derive(Default)]
struct Recorded {
    hits: HashMap<String, usize>,
    queries: HashMap<String, Vec<String>>,
}

pub struct TestServer {
    addr: SocketAddr,
    recorded: Arc<Mutex<Recorded>>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn serve(routes: Vec<(&'static str, Reply)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
        let addr = listener.local_addr().expect("read listener addr");

        let routes: Arc<HashMap<String, Reply>> = Arc::new(
            routes
                .into_iter()
                .map(|(p, r)| (p.to_string(), r))
                .collect(),
        );
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let running = Arc::new(AtomicBool::new(true));

        let handle = {
            let routes = Arc::clone(&routes);
            let recorded = Arc::clone(&recorded);
            let running = Arc::clone(&running);
            std::thread::spawn(move || {
                for stream in listener.incoming() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    handle_connection(stream, &routes, &recorded);
                }
            })
        };

        Self {
            addr,
            recorded,
            running,
            handle: Some(handle),
        }
    }

    /// Absolute URL for a path on this server.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn base_url(&self, path: &str) -> String {
        self.url(path)
    }

    /// How many requests hit a path (any query string).
    pub fn hits(&self, path: &str) -> usize {
        *self
            .recorded
            .lock()
            .unwrap()
            .hits
            .get(path)
            .unwrap_or(&0)
    }

    pub fn total_hits(&self) -> usize {
        self.recorded.lock().unwrap().hits.values().sum()
    }

    /// Query strings seen on a path, in arrival order.
    pub fn queries(&self, path: &str) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .queries
            .get(path)
            .cloned()
            .unwrap_or_default()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // unblock the accept loop
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_connection(
    stream: TcpStream,
    routes: &HashMap<String, Reply>,
    recorded: &Mutex<Recorded>,
) {
    let mut reader = BufReader::new(match stream.try_clone() {
        Ok(s) => s,
        Err(_) => return,
    });

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), q.to_string()),
        None => (target.to_string(), String::new()),
    };

    // drain request headers
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => {}
            Err(_) => return,
        }
    }

    {
        let mut rec = recorded.lock().unwrap();
        *rec.hits.entry(path.clone()).or_insert(0) += 1;
        rec.queries.entry(path.clone()).or_default().push(query);
    }

    let mut stream = stream;
    match routes.get(&path) {
        None => {
            respond(&mut stream, 404, "application/json", br#"{"error": "not found"}"#);
        }
        Some(Reply::Drop) => {
            // close without writing a response
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        Some(Reply::Json(body)) => {
            respond(&mut stream, 200, "application/json", body.as_bytes());
        }
        Some(Reply::Bytes(body)) => {
            respond(&mut stream, 200, "application/octet-stream", body);
        }
        Some(Reply::Status(code, body)) => {
            respond(&mut stream, *code, "application/json", body.as_bytes());
        }
    }
}

fn respond(stream: &mut TcpStream, code: u16, content_type: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {} TEST\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        code,
        content_type,
        body.len()
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}
