pub mod breakpoint;
pub mod config;
pub mod error;
mod state;

pub use breakpoint::{Breakpoint, BreakpointRegistry};
pub use config::{ConnectConfig, InteractionParams, RetryPolicy, SessionConfig};
pub use error::Error;
pub use state::{Location, SessionState};

use crate::debugger::breakpoint::{canonicalize, is_pseudo_file};
use crate::debugger::state::Interaction;
use crate::rpc::{
    Connection, DecodeError, FrameReader, FrameWriter, Method, Record, RemoteError, RequestId,
};
use crate::ui::relay::{Event, EventRelay};
use crate::{muted_error, weak_error};
use log::{debug, info, trace, warn};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::net::TcpStream;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

enum Reply {
    /// A foreground caller blocks on the channel.
    Waiter(SyncSender<Result<Value, Error>>),
    /// Nobody waits, failures are only logged.
    Detached,
}

struct Pending {
    method: Method,
    reply: Reply,
}

/// How many requests given up on (timed out or failed) are remembered. A late
/// answer to one of them still moves the interaction state.
const ABANDONED_LIMIT: usize = 64;

#[derive(Default)]
struct SessionData {
    /// Incremented on every attach, a background loop only acts on its own connection.
    epoch: u64,
    attached: bool,
    remote: bool,
    interaction: Interaction,
    quitting: bool,
    /// Swallow the next interaction, it was provoked by a synthetic interrupt.
    suppress_next: bool,
    /// Continue over the next interaction, set on startup when running without pausing.
    start_continue: bool,
    /// Outstanding `readline` request and the interaction state to return to.
    input_request: Option<(RequestId, Interaction)>,
    location: Option<Location>,
    last_exception: Option<String>,
}

/// State shared between the foreground and the background loop.
struct Shared {
    config: SessionConfig,
    data: Mutex<SessionData>,
    writer: Mutex<Option<FrameWriter<TcpStream>>>,
    pending: Mutex<HashMap<RequestId, Pending>>,
    abandoned: Mutex<BTreeMap<RequestId, Method>>,
    next_id: AtomicU64,
    breakpoints: Mutex<BreakpointRegistry>,
    relay: Arc<EventRelay>,
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Shared {
    fn state(&self) -> SessionState {
        let data = self.data.lock().unwrap();
        if !data.attached {
            return SessionState::Detached;
        }
        match data.interaction {
            Interaction::NotInteracting => SessionState::Running,
            Interaction::Interacting => SessionState::Interacting,
            Interaction::BlockedOnInput => SessionState::BlockedOnInput,
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        let data = self.data.lock().unwrap();
        data.attached && data.epoch == epoch
    }

    /// Write a record. A failed write leaves a torn frame behind, so the
    /// connection is dropped.
    fn send(&self, record: &Record) -> Result<(), Error> {
        let buf = record.encode()?;
        let res = {
            let mut writer = self.writer.lock().unwrap();
            let writer = writer.as_mut().ok_or(Error::NotAttached)?;
            trace!(target: "session", "-> {}", String::from_utf8_lossy(&buf));
            writer.send_bytes(&buf)
        };

        if let Err(e) = res {
            warn!(target: "session", "write to agent: {e}");
            let epoch = self.data.lock().unwrap().epoch;
            self.detach(epoch);
            return Err(e.into());
        }
        Ok(())
    }

    fn notify(&self, method: Method, args: Vec<Value>) -> Result<(), Error> {
        self.send(&Record::notification(method, args))
    }

    fn respond(&self, id: RequestId, result: Value) -> Result<(), Error> {
        self.send(&Record::response(id, result))
    }

    fn register(&self, method: Method, reply: Reply) -> RequestId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .unwrap()
            .insert(id, Pending { method, reply });
        id
    }

    /// Send a request and wait for its response.
    fn call(&self, method: Method, args: Vec<Value>) -> Result<Value, Error> {
        let (tx, rx) = mpsc::sync_channel(1);
        let id = self.register(method, Reply::Waiter(tx));
        if let Err(e) = self.send(&Record::request(id, method, args)) {
            self.pending.lock().unwrap().remove(&id);
            return Err(e);
        }

        let timeout = self.config.response_timeout;
        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                let expired = self.pending.lock().unwrap().remove(&id);
                if expired.is_some() {
                    self.abandon(id, method);
                } else if let Ok(result) = rx.try_recv() {
                    // routed right at the deadline
                    return result;
                }
                warn!(target: "session", "`{method}` ({id}) not answered within {timeout:?}");
                Err(Error::ResponseTimeout {
                    method: method.as_str(),
                    timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(Error::Disconnected),
        }
    }

    /// Send a request without waiting for its response.
    fn call_detached(&self, method: Method, args: Vec<Value>) -> Result<(), Error> {
        let id = self.register(method, Reply::Detached);
        let res = self.send(&Record::request(id, method, args));
        if res.is_err() {
            self.pending.lock().unwrap().remove(&id);
        }
        res
    }

    fn abandon(&self, id: RequestId, method: Method) {
        let mut abandoned = self.abandoned.lock().unwrap();
        abandoned.insert(id, method);
        while abandoned.len() > ABANDONED_LIMIT {
            abandoned.pop_first();
        }
    }

    fn clear_interaction(&self) {
        self.data.lock().unwrap().interaction = Interaction::NotInteracting;
        self.relay.publish(Event::ClearInteraction);
    }

    /// Drop the connection `epoch` if it is still the current one.
    fn detach(&self, epoch: u64) {
        {
            let mut data = self.data.lock().unwrap();
            if !data.attached || data.epoch != epoch {
                return;
            }
            data.attached = false;
            data.interaction = Interaction::NotInteracting;
            data.quitting = false;
            data.suppress_next = false;
            data.start_continue = false;
            data.input_request = None;
        }

        if let Some(writer) = self.writer.lock().unwrap().take() {
            writer.close();
        }

        self.abandoned.lock().unwrap().clear();
        let pending = std::mem::take(&mut *self.pending.lock().unwrap());
        for (_, pending) in pending {
            if let Reply::Waiter(tx) = pending.reply {
                _ = tx.try_send(Err(Error::Disconnected));
            }
        }

        info!(target: "session", "detached from agent");
        self.relay.publish(Event::ClearInteraction);
    }

    fn dispatch_frame(&self, frame: &[u8]) {
        trace!(target: "session", "<- {}", String::from_utf8_lossy(frame));
        match Record::decode(frame) {
            Ok(Record::Response { id, outcome }) => self.route_response(id, outcome),
            Ok(Record::Notification {
                method,
                args,
                kwargs,
            }) => self.on_agent_call(None, &method, args, kwargs),
            Ok(Record::Request {
                id,
                method,
                args,
                kwargs,
            }) => self.on_agent_call(Some(id), &method, args, kwargs),
            Err(e) => self.on_malformed(e),
        }
    }

    fn route_response(&self, id: RequestId, outcome: Result<Value, RemoteError>) {
        let pending = self.pending.lock().unwrap().remove(&id);
        let Some(pending) = pending else {
            let abandoned = self.abandoned.lock().unwrap().remove(&id);
            match abandoned {
                Some(method) => {
                    debug!(target: "session", "late response to `{method}` ({id})");
                    muted_error!(self.settle(method, outcome), "late response:");
                }
                None => warn!(target: "session", "response to unknown request {id}"),
            }
            return;
        };

        let outcome = self.settle(pending.method, outcome);
        match pending.reply {
            Reply::Waiter(tx) => {
                _ = tx.try_send(outcome);
            }
            Reply::Detached => {
                if let Err(e) = outcome {
                    warn!(target: "session", "`{}` failed: {e}", pending.method);
                }
            }
        }
    }

    /// Apply the effect an answer to `method` has on the interaction and turn
    /// the answer into a command result.
    fn settle(&self, method: Method, outcome: Result<Value, RemoteError>) -> Result<Value, Error> {
        let outcome = match outcome {
            // jump rejections come back as a message instead of an error
            Ok(Value::String(message)) if method == Method::Jump => {
                Err(Error::Remote(RemoteError::new(message)))
            }
            Ok(value) => Ok(value),
            Err(e) => Err(Error::Remote(e)),
        };

        if outcome.is_ok() && method.resumes_execution() {
            self.clear_interaction();
        }
        outcome
    }

    /// A broken request of the agent is answered with an error. A broken
    /// response fails the request it names, anything else is only logged.
    fn on_malformed(&self, e: DecodeError) {
        warn!(target: "session", "drop frame: {e}");

        if let Some(id) = e.request_id {
            let err = RemoteError::new(format!("malformed request: {}", e.reason));
            weak_error!(
                self.send(&Record::error_response(id, err)),
                "reject malformed request:"
            );
            return;
        }

        let Some(id) = e.id else {
            return;
        };
        let pending = self.pending.lock().unwrap().remove(&id);
        match pending {
            Some(Pending { method, reply }) => {
                self.abandon(id, method);
                if let Reply::Waiter(tx) = reply {
                    _ = tx.try_send(Err(Error::Protocol(e)));
                }
            }
            None => debug!(target: "session", "malformed response to unknown request {id}"),
        }
    }

    fn on_agent_call(
        &self,
        id: Option<RequestId>,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) {
        let Ok(method) = Method::from_str(method) else {
            warn!(target: "session", "unknown method `{method}` from agent");
            if let Some(id) = id {
                let err = RemoteError::new(format!("unknown method `{method}`"));
                weak_error!(self.send(&Record::error_response(id, err)));
            }
            return;
        };

        match method {
            Method::Startup => return self.on_startup(id),
            Method::Readline => {
                match id {
                    Some(id) => self.on_readline(id, &args),
                    None => warn!(target: "session", "`readline` must be a request"),
                }
                return;
            }
            Method::Interaction => self.on_interaction(args, kwargs),
            Method::Write => {
                let text = args.first().map(text_of).unwrap_or_default();
                self.relay.publish(Event::Write(text));
            }
            Method::Exception => {
                let message = args.first().map(text_of).unwrap_or_default();
                warn!(target: "session", "exception in debugged program: {message}");
                self.data.lock().unwrap().last_exception = Some(message.clone());
                self.relay.publish(Event::Exception(message));
            }
            other => {
                warn!(target: "session", "unexpected `{other}` from agent");
                if let Some(id) = id {
                    let err = RemoteError::new(format!("`{other}` is not served by frontend"));
                    weak_error!(self.send(&Record::error_response(id, err)));
                }
                return;
            }
        }

        if let Some(id) = id {
            muted_error!(self.respond(id, Value::Null), "acknowledge agent call:");
        }
    }

    fn on_startup(&self, id: Option<RequestId>) {
        let breakpoints = self.breakpoints.lock().unwrap().all();
        info!(target: "session", "agent started, load {} breakpoint(s)", breakpoints.len());
        for brkpt in breakpoints {
            weak_error!(
                self.call_detached(Method::SetBreakpoint, brkpt.set_args()),
                "load breakpoint:"
            );
        }
        weak_error!(
            self.call_detached(Method::SetParams, vec![json!(self.config.params)]),
            "set interaction params:"
        );

        if let Some(id) = id {
            weak_error!(self.respond(id, Value::Null));
        }
        if self.config.run_without_pausing {
            self.data.lock().unwrap().start_continue = true;
        }
        weak_error!(self.notify(Method::Run, vec![]), "release agent:");
    }

    fn on_interaction(&self, args: Vec<Value>, kwargs: Map<String, Value>) {
        let mut args = args.into_iter();
        let file = args.next().map(|v| text_of(&v)).unwrap_or_default();
        let line = args
            .next()
            .and_then(|v| v.as_u64())
            .and_then(|line| u32::try_from(line).ok())
            .unwrap_or_default();
        let source = args.next().map(|v| text_of(&v)).unwrap_or_default();
        let context = match args.next() {
            Some(context) if kwargs.is_empty() => context,
            _ => Value::Object(kwargs),
        };

        let pseudo = is_pseudo_file(&file);
        let (mark, auto_continue) = {
            let mut data = self.data.lock().unwrap();
            data.interaction = Interaction::Interacting;
            data.location = (!pseudo).then(|| Location {
                file: file.clone(),
                line,
                source,
            });

            if data.start_continue {
                data.start_continue = false;
                (false, true)
            } else if data.suppress_next {
                data.suppress_next = false;
                (false, false)
            } else {
                (!pseudo, false)
            }
        };

        if auto_continue {
            debug!(target: "session", "continue over first interaction at {file}:{line}");
            weak_error!(self.call_detached(Method::Continue, vec![]), "start continue:");
        } else if mark {
            self.relay.publish(Event::MarkCurrentLine {
                file,
                line,
                context,
            });
        } else {
            debug!(target: "session", "interaction at {file}:{line} not shown");
        }
    }

    fn on_readline(&self, id: RequestId, args: &[Value]) {
        let prompt = args.first().map(text_of).unwrap_or_default();
        {
            let mut data = self.data.lock().unwrap();
            let previous = data.interaction;
            data.interaction = Interaction::BlockedOnInput;
            data.input_request = Some((id, previous));
        }
        self.relay.publish(Event::InputRequested(prompt));
    }
}

/// Read frames until the connection `epoch` is closed or replaced.
fn serve(shared: Arc<Shared>, mut reader: FrameReader<TcpStream>, epoch: u64) {
    let interval = shared.config.poll_interval;
    while shared.is_current(epoch) {
        match reader.poll() {
            Ok(true) => {}
            Ok(false) => {
                thread::sleep(interval);
                continue;
            }
            Err(e) => {
                warn!(target: "session", "poll agent connection: {e}");
                break;
            }
        }

        match reader.recv_bytes() {
            Ok(frame) => shared.dispatch_frame(&frame),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                info!(target: "session", "agent closed the connection");
                break;
            }
            Err(e) => {
                warn!(target: "session", "read from agent: {e}");
                break;
            }
        }
    }
    shared.detach(epoch);
}

/// Debugging session with a single agent.
///
/// Commands run synchronously in the calling thread, agent notifications are
/// handled by a background thread and published as [`Event`]s.
pub struct Session {
    shared: Arc<Shared>,
    /// Serializes foreground commands.
    command_lock: Mutex<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self::with_relay(config, Arc::new(EventRelay::new()))
    }

    pub fn with_relay(config: SessionConfig, relay: Arc<EventRelay>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                data: Mutex::default(),
                writer: Mutex::default(),
                pending: Mutex::default(),
                abandoned: Mutex::default(),
                next_id: AtomicU64::new(1),
                breakpoints: Mutex::default(),
                relay,
            }),
            command_lock: Mutex::default(),
            worker: Mutex::default(),
        }
    }

    // ------------------------------------ queries ------------------------------------------------

    pub fn events(&self) -> Arc<EventRelay> {
        self.shared.relay.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_attached(&self) -> bool {
        self.state() != SessionState::Detached
    }

    /// True if attached to an agent on another host.
    pub fn is_remote(&self) -> bool {
        let data = self.shared.data.lock().unwrap();
        data.attached && data.remote
    }

    pub fn location(&self) -> Option<Location> {
        self.shared.data.lock().unwrap().location.clone()
    }

    pub fn last_exception(&self) -> Option<String> {
        self.shared.data.lock().unwrap().last_exception.clone()
    }

    /// Fail with [`Error::RemoteException`] if the program raised an unhandled exception.
    pub fn check_exception(&self) -> Result<(), Error> {
        match self.last_exception() {
            Some(message) => Err(Error::RemoteException(message)),
            None => Ok(()),
        }
    }

    pub fn breakpoints(&self) -> Vec<Breakpoint> {
        self.shared.breakpoints.lock().unwrap().all()
    }

    // ------------------------------------ connection ---------------------------------------------

    /// Connect and authenticate to an agent, then start serving its notifications.
    pub fn attach(&self, connect: &ConnectConfig) -> Result<(), Error> {
        let _guard = self.command_lock.lock().unwrap();
        if self.is_attached() {
            return Err(Error::AlreadyAttached);
        }
        if let Some(worker) = self.worker.lock().unwrap().take() {
            _ = worker.join();
        }

        let conn = Connection::connect(connect.address(), connect.authkey.as_bytes())?;
        info!(target: "session", "attached to agent at {}", conn.peer_addr());
        let (mut reader, writer) = conn.split();
        reader.set_recv_timeout(Some(self.shared.config.response_timeout))?;
        writer.set_send_timeout(Some(self.shared.config.response_timeout))?;

        *self.shared.writer.lock().unwrap() = Some(writer);
        let epoch = {
            let mut data = self.shared.data.lock().unwrap();
            let epoch = data.epoch + 1;
            *data = SessionData {
                epoch,
                attached: true,
                remote: connect.is_remote(),
                ..SessionData::default()
            };
            data.epoch
        };

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("qdb-session".to_string())
            .spawn(move || serve(shared, reader, epoch));
        match spawned {
            Ok(worker) => {
                *self.worker.lock().unwrap() = Some(worker);
                Ok(())
            }
            Err(e) => {
                self.shared.detach(epoch);
                Err(e.into())
            }
        }
    }

    /// Like [`Session::attach`] but retry while the agent is not reachable,
    /// pausing between tries according to the attach retry policy.
    pub fn attach_with_retry(&self, connect: &ConnectConfig) -> Result<(), Error> {
        let policy = self.shared.config.attach_retry;
        let mut delays = policy.delays();
        loop {
            match self.attach(connect) {
                Err(e @ Error::Connect(_)) => match delays.next() {
                    Some(delay) => {
                        debug!(target: "session", "attach failed ({e}), retry in {delay:?}");
                        thread::sleep(delay);
                    }
                    None => {
                        return Err(Error::AttachExhausted {
                            attempts: policy.attempts,
                            last: Box::new(e),
                        })
                    }
                },
                res => return res,
            }
        }
    }

    /// Close the agent connection. Does nothing if already detached.
    pub fn detach(&self) {
        let epoch = self.shared.data.lock().unwrap().epoch;
        self.shared.detach(epoch);
        if let Some(worker) = self.worker.lock().unwrap().take() {
            _ = worker.join();
        }
    }

    // ------------------------------------ interaction commands -----------------------------------

    fn interacting_call(&self, method: Method, args: Vec<Value>) -> Result<Value, Error> {
        let _guard = self.command_lock.lock().unwrap();
        self.expect_interacting(method)?;
        self.shared.call(method, args)
    }

    fn expect_interacting(&self, method: Method) -> Result<(), Error> {
        let err = match self.state() {
            SessionState::Interacting => return Ok(()),
            SessionState::Detached => Error::NotAttached,
            SessionState::Running | SessionState::BlockedOnInput => Error::NotInteracting,
        };
        warn!(target: "session", "`{method}` rejected: {err}");
        Err(err)
    }

    /// Execute until the next line, entering called functions.
    pub fn step(&self) -> Result<(), Error> {
        self.interacting_call(Method::Step, vec![]).map(drop)
    }

    /// Execute until the next line of the current function.
    pub fn next(&self) -> Result<(), Error> {
        self.interacting_call(Method::Next, vec![]).map(drop)
    }

    /// Execute until the current function returns.
    pub fn step_return(&self) -> Result<(), Error> {
        self.interacting_call(Method::StepReturn, vec![]).map(drop)
    }

    /// Execute until a breakpoint is hit, the program ends or is interrupted.
    pub fn continue_execution(&self) -> Result<(), Error> {
        self.interacting_call(Method::Continue, vec![]).map(drop)
    }

    /// Continue until `line` of `file` is reached (or any other stop happens).
    pub fn continue_to(&self, file: &str, line: u32) -> Result<(), Error> {
        let _guard = self.command_lock.lock().unwrap();
        self.expect_interacting(Method::Continue)?;
        let brkpt = Breakpoint::new(file, line).temporary();
        self.shared.call(Method::SetBreakpoint, brkpt.set_args())?;
        self.shared.call(Method::Continue, vec![]).map(drop)
    }

    /// Set the next line to execute in the current frame.
    pub fn jump(&self, line: u32) -> Result<(), Error> {
        self.interacting_call(Method::Jump, vec![json!(line)]).map(drop)
    }

    /// Execute a statement in the current frame.
    pub fn exec(&self, statement: &str) -> Result<Value, Error> {
        self.interacting_call(Method::Exec, vec![json!(statement)])
    }

    /// Evaluate an expression in the current frame.
    pub fn eval(&self, expression: &str) -> Result<Value, Error> {
        self.interacting_call(Method::Eval, vec![json!(expression)])
    }

    pub fn call_stack(&self) -> Result<Value, Error> {
        self.interacting_call(Method::Where, vec![])
    }

    pub fn environment(&self) -> Result<Value, Error> {
        self.interacting_call(Method::Environment, vec![])
    }

    // ------------------------------------ forced commands ----------------------------------------

    /// Run a command that needs the program stopped, stopping a running
    /// program first and resuming it afterwards.
    fn forced<T>(&self, command: impl FnOnce(&Shared) -> Result<T, Error>) -> Result<T, Error> {
        let interrupted = match self.state() {
            SessionState::Detached => return Err(Error::NotAttached),
            SessionState::BlockedOnInput => return Err(Error::WaitingForInput),
            SessionState::Interacting => false,
            SessionState::Running => {
                self.interrupt_and_wait()?;
                true
            }
        };

        let result = command(&self.shared);

        let resume = interrupted && {
            let data = self.shared.data.lock().unwrap();
            data.attached && !data.quitting && data.interaction == Interaction::Interacting
        };
        if resume {
            weak_error!(
                self.shared.call(Method::Continue, vec![]),
                "resume after forced command:"
            );
        }
        result
    }

    fn interrupt_and_wait(&self) -> Result<(), Error> {
        let reset_suppress = || self.shared.data.lock().unwrap().suppress_next = false;

        self.shared.data.lock().unwrap().suppress_next = true;
        if let Err(e) = self.shared.notify(Method::Interrupt, vec![]) {
            reset_suppress();
            return Err(e);
        }

        let mut delays = self.shared.config.force_wait.delays();
        loop {
            match self.state() {
                SessionState::Interacting => return Ok(()),
                SessionState::Detached => return Err(Error::Disconnected),
                SessionState::BlockedOnInput => {
                    reset_suppress();
                    return Err(Error::WaitingForInput);
                }
                SessionState::Running => {}
            }
            match delays.next() {
                Some(delay) => thread::sleep(delay),
                None => {
                    reset_suppress();
                    warn!(target: "session", "program did not stop after interrupt");
                    return Err(Error::Busy);
                }
            }
        }
    }

    /// Register a breakpoint, and set it in the agent if attached.
    ///
    /// Temporary breakpoints are not kept for later sessions.
    pub fn set_breakpoint(&self, brkpt: Breakpoint) -> Result<(), Error> {
        let _guard = self.command_lock.lock().unwrap();
        if !brkpt.is_temporary() {
            self.shared.breakpoints.lock().unwrap().add(brkpt.clone());
        }
        if !self.is_attached() {
            return Ok(());
        }
        self.forced(|shared| shared.call(Method::SetBreakpoint, brkpt.set_args()))
            .map(drop)
    }

    pub fn clear_breakpoint(&self, brkpt: &Breakpoint) -> Result<(), Error> {
        let _guard = self.command_lock.lock().unwrap();
        let removed = self.shared.breakpoints.lock().unwrap().remove(brkpt);
        if !self.is_attached() {
            return removed.map(drop);
        }
        self.forced(|shared| shared.call(Method::ClearBreakpoint, brkpt.clear_args()))
            .map(drop)
    }

    pub fn clear_file_breakpoints(&self, file: &str) -> Result<(), Error> {
        let _guard = self.command_lock.lock().unwrap();
        self.shared.breakpoints.lock().unwrap().remove_file(file);
        if !self.is_attached() {
            return Ok(());
        }
        let file = canonicalize(file);
        self.forced(|shared| shared.call(Method::ClearFileBreakpoints, vec![json!(file)]))
            .map(drop)
    }

    /// Terminate the debugged program and detach.
    pub fn quit(&self) -> Result<(), Error> {
        let _guard = self.command_lock.lock().unwrap();
        let epoch = {
            let mut data = self.shared.data.lock().unwrap();
            if !data.attached {
                return Err(Error::NotAttached);
            }
            data.quitting = true;
            data.epoch
        };

        match self.forced(|shared| shared.call(Method::Quit, vec![])) {
            Ok(_) | Err(Error::Disconnected) => {
                self.shared.detach(epoch);
                Ok(())
            }
            Err(e) => {
                self.shared.data.lock().unwrap().quitting = false;
                Err(e)
            }
        }
    }

    // ------------------------------------ misc ---------------------------------------------------

    /// Ask a running program to stop at the next line.
    pub fn interrupt(&self) -> Result<(), Error> {
        match self.state() {
            SessionState::Detached => Err(Error::NotAttached),
            SessionState::BlockedOnInput => Err(Error::WaitingForInput),
            SessionState::Interacting => Ok(()),
            SessionState::Running => self.shared.notify(Method::Interrupt, vec![]),
        }
    }

    /// Answer the pending `readline` request of the program.
    pub fn provide_input(&self, text: &str) -> Result<(), Error> {
        let (id, previous) = {
            let mut data = self.shared.data.lock().unwrap();
            if !data.attached {
                return Err(Error::NotAttached);
            }
            let Some((id, previous)) = data.input_request.take() else {
                return Err(Error::NotInteracting);
            };
            data.interaction = previous;
            (id, previous)
        };
        debug!(target: "session", "input provided, back to {previous:?}");
        self.shared.respond(id, json!(text))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.detach();
    }
}
