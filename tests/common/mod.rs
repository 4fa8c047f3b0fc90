#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

#[derive(Clone, Debug)]
pub struct TestHttpRequest {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

impl TestHttpRequest {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

#[derive(Clone)]
pub struct TestHttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TestHttpResponse {
    pub fn ok_js(body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![(
                "Content-Type".to_string(),
                "application/javascript".to_string(),
            )],
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn ok_json(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: value.to_string().into_bytes(),
        }
    }

    pub fn redirect(status: u16, location: &str) -> Self {
        Self {
            status,
            headers: vec![("Location".to_string(), location.to_string())],
            body: Vec::new(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: body.as_bytes().to_vec(),
        }
    }
}

pub type Handler = Arc<dyn Fn(&TestHttpRequest) -> TestHttpResponse + Send + Sync>;

pub fn respond(response: TestHttpResponse) -> Handler {
    Arc::new(move |_| response.clone())
}

/// Answers the transform endpoint by echoing the submitted code back.
pub fn echo_transform() -> Handler {
    Arc::new(|request: &TestHttpRequest| {
        let body = request.json();
        TestHttpResponse::ok_json(&serde_json::json!({
            "code": body["code"],
            "map": "",
        }))
    })
}

/// Single-threaded HTTP/1.1 server on an ephemeral port. Routes match on the
/// path with the query removed; every request is recorded.
pub struct TestHttpServer {
    addr: SocketAddr,
    running: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    requests: Arc<Mutex<Vec<TestHttpRequest>>>,
}

impl TestHttpServer {
    pub fn new(routes: Vec<(&str, TestHttpResponse)>) -> Self {
        Self::with_handlers(
            routes
                .into_iter()
                .map(|(path, response)| (path, respond(response)))
                .collect(),
        )
    }

    pub fn with_handlers(routes: Vec<(&str, Handler)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let routes = Arc::new(
            routes
                .into_iter()
                .map(|(path, handler)| (path.to_string(), handler))
                .collect::<HashMap<_, _>>(),
        );
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        handle_test_http_connection(stream, &routes, &requests_clone);
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });
        Self {
            addr,
            running,
            handle: Some(handle),
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn origin(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Directory the mirror uses for this server: `host:port`.
    pub fn host_segment(&self) -> String {
        self.addr.to_string()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests_to(&self, path: &str) -> Vec<TestHttpRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.path == path)
            .cloned()
            .collect()
    }
}

impl Drop for TestHttpServer {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn handle_test_http_connection(
    mut stream: TcpStream,
    routes: &HashMap<String, Handler>,
    requests: &Mutex<Vec<TestHttpRequest>>,
) {
    let _ = stream.set_nonblocking(false);
    let Ok(reader_stream) = stream.try_clone() else {
        return;
    };
    let mut reader = BufReader::new(reader_stream);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() || request_line.is_empty() {
        return;
    }
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("GET").to_string();
    let request_target = parts.next().unwrap_or("/");
    let request_path = request_target
        .split('?')
        .next()
        .unwrap_or(request_target)
        .to_string();

    let mut content_length = 0;
    loop {
        let mut header_line = String::new();
        if reader.read_line(&mut header_line).is_err() {
            return;
        }
        if header_line == "\r\n" || header_line == "\n" || header_line.is_empty() {
            break;
        }
        if let Some((name, value)) = header_line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }

    let request = TestHttpRequest {
        method,
        path: request_path,
        body,
    };
    requests.lock().push(request.clone());

    let response = match routes.get(&request.path) {
        Some(handler) => handler(&request),
        None => TestHttpResponse::status(404, "not found"),
    };

    let mut headers = response.headers;
    headers.push(("Content-Length".to_string(), response.body.len().to_string()));
    headers.push(("Connection".to_string(), "close".to_string()));

    let mut response_head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        http_reason_phrase(response.status)
    );
    for (name, value) in headers {
        response_head.push_str(&format!("{name}: {value}\r\n"));
    }
    response_head.push_str("\r\n");

    let _ = stream.write_all(response_head.as_bytes());
    let _ = stream.write_all(&response.body);
    let _ = stream.flush();
}

fn http_reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        301 => "Moved Permanently",
        302 => "Found",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Status",
    }
}
