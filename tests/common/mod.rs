#![allow(dead_code)]

use qdbfront::debugger::{ConnectConfig, RetryPolicy, Session, SessionConfig};
use qdbfront::rpc::{Connection, Listener, Record, RequestId};
use qdbfront::ui::relay::Event;
use serde_json::{Map, Value};
use std::thread;
use std::time::{Duration, Instant};

pub const SECRET: &str = "secret password";

/// Upper bound for a single receive performed by a test agent.
const AGENT_RECV_TIMEOUT: Duration = Duration::from_secs(3);

pub fn test_config() -> SessionConfig {
    SessionConfig {
        attach_retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5)),
        force_wait: RetryPolicy::new(100, Duration::from_millis(1), Duration::from_millis(20)),
        response_timeout: Duration::from_secs(3),
        poll_interval: Duration::from_millis(2),
        ..SessionConfig::default()
    }
}

pub fn connect_config(port: u16, authkey: &str) -> ConnectConfig {
    ConnectConfig {
        host: "127.0.0.1".to_string(),
        port,
        authkey: authkey.to_string(),
    }
}

/// Port nobody listens on (as long as no one grabs it in the meantime).
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Poll `cond` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Collect events published by the session until nothing arrives for `quiet`.
pub fn collect_events(session: &Session, quiet: Duration) -> Vec<Event> {
    let relay = session.events();
    let mut events = vec![];
    while let Some(event) = relay.recv_timeout(quiet) {
        events.push(event);
    }
    events
}

/// Scripted debug agent driven by a test.
pub struct FakeAgent {
    conn: Connection,
    _listener: Listener,
}

impl FakeAgent {
    /// Listen on a loopback port and attach `session` to it.
    pub fn attach(session: &Session) -> anyhow::Result<Self> {
        let listener = Listener::bind("127.0.0.1:0", SECRET.as_bytes())?;
        let port = listener.local_addr()?.port();

        let acceptor = thread::spawn(move || listener.accept().map(|conn| (listener, conn)));
        session.attach(&connect_config(port, SECRET))?;
        let (listener, mut conn) = acceptor.join().expect("acceptor panicked")?;
        conn.set_read_timeout(Some(AGENT_RECV_TIMEOUT))?;

        Ok(Self {
            conn,
            _listener: listener,
        })
    }

    pub fn send(&mut self, record: &Record) {
        self.send_raw(&record.encode().unwrap());
    }

    pub fn send_raw(&mut self, frame: &[u8]) {
        self.conn.send_bytes(frame).unwrap();
    }

    pub fn notify(&mut self, method: &str, args: Vec<Value>) {
        self.notify_with_kwargs(method, args, Map::new());
    }

    pub fn notify_with_kwargs(&mut self, method: &str, args: Vec<Value>, kwargs: Map<String, Value>) {
        self.send(&Record::Notification {
            method: method.to_string(),
            args,
            kwargs,
        });
    }

    pub fn request(&mut self, id: RequestId, method: &str, args: Vec<Value>) {
        self.send(&Record::Request {
            id,
            method: method.to_string(),
            args,
            kwargs: Map::new(),
        });
    }

    pub fn respond(&mut self, id: RequestId, result: Value) {
        self.send(&Record::response(id, result));
    }

    pub fn recv(&mut self) -> Record {
        let frame = self.conn.recv_bytes().expect("agent receive");
        Record::decode(&frame).expect("valid record")
    }

    /// Receive a request for `method`, return its id and arguments.
    pub fn expect_request(&mut self, method: &str) -> (RequestId, Vec<Value>) {
        match self.recv() {
            Record::Request {
                id,
                method: got,
                args,
                ..
            } if got == method => (id, args),
            other => panic!("expect `{method}` request, got {other:?}"),
        }
    }

    /// Receive a request for `method` and answer it with `null`.
    pub fn ack(&mut self, method: &str) -> Vec<Value> {
        let (id, args) = self.expect_request(method);
        self.respond(id, Value::Null);
        args
    }

    pub fn expect_notification(&mut self, method: &str) -> Vec<Value> {
        match self.recv() {
            Record::Notification {
                method: got, args, ..
            } if got == method => args,
            other => panic!("expect `{method}` notification, got {other:?}"),
        }
    }

    /// Assert the frontend sends nothing for `period`.
    pub fn expect_silence(&mut self, period: Duration) {
        thread::sleep(period);
        assert!(!self.conn.poll().unwrap(), "unexpected traffic from frontend");
    }

    /// Stop the program at a line as the agent does on a breakpoint hit.
    pub fn interaction(&mut self, file: &str, line: u32, source: &str) {
        self.notify(
            "interaction",
            vec![Value::from(file), Value::from(line), Value::from(source)],
        );
    }

    pub fn close(self) {
        self.conn.close();
    }
}
