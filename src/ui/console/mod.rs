use crate::debugger::{Breakpoint, ConnectConfig, Error, Session, SessionConfig, SessionState};
use crate::ui::command::{Command, CommandError};
use crate::ui::console::help::HELP;
use crate::ui::console::hook::TerminalHook;
use crate::ui::console::print::style::{ErrorView, FilePathView, KeywordView, LineView};
use crate::ui::console::print::ExternalPrinter;
use crate::weak_error;
use itertools::Itertools;
use log::warn;
use rustyline::error::ReadlineError;
use rustyline::history::MemHistory;
use rustyline::{Config, Editor};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::thread;
use std::time::Duration;

pub mod help;
pub mod hook;
pub mod print;

const WELCOME_TEXT: &str = "qdb frontend, type `help` for the list of commands";
const PROMPT: &str = "(qdb) ";

/// How long the event printer waits for an event before checking for shutdown.
const EVENT_WAIT: Duration = Duration::from_millis(100);

pub type QdbEditor = Editor<(), MemHistory>;

pub static LOGGER_ONCE: Once = Once::new();

pub struct AppBuilder {
    connect: ConnectConfig,
    config: SessionConfig,
}

impl AppBuilder {
    pub fn new(connect: ConnectConfig, config: SessionConfig) -> Self {
        Self { connect, config }
    }

    pub fn build(self) -> anyhow::Result<TerminalApplication> {
        let editor = QdbEditor::with_history(Config::default(), MemHistory::new())?;
        Ok(TerminalApplication {
            session: Session::new(self.config),
            connect: self.connect,
            editor,
        })
    }
}

pub struct TerminalApplication {
    session: Session,
    connect: ConnectConfig,
    editor: QdbEditor,
}

/// Render a value returned by the agent.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

fn render_call_stack(stack: &Value) -> String {
    let Value::Array(frames) = stack else {
        return render(stack);
    };
    frames
        .iter()
        .enumerate()
        .map(|(num, frame)| match frame {
            Value::Array(parts) => format!("#{num} {}", parts.iter().map(render).join(" ")),
            other => format!("#{num} {}", render(other)),
        })
        .join("\n")
}

fn render_environment(env: &Value) -> String {
    let Value::Object(scopes) = env else {
        return render(env);
    };
    scopes
        .iter()
        .map(|(scope, vars)| {
            let vars = match vars {
                Value::Object(vars) => vars
                    .iter()
                    .map(|(name, value)| format!("  {} = {}", KeywordView::from(name), render(value)))
                    .join("\n"),
                other => format!("  {}", render(other)),
            };
            format!("{scope}:\n{vars}")
        })
        .join("\n")
}

impl TerminalApplication {
    pub fn run(mut self) -> anyhow::Result<()> {
        LOGGER_ONCE.call_once(|| {
            env_logger::init();
        });

        println!("{WELCOME_TEXT}");

        let cancel = Arc::new(AtomicBool::new(false));
        let event_printer = {
            let relay = self.session.events();
            let mut hook = TerminalHook::new(self.external_printer());
            let cancel = cancel.clone();
            thread::spawn(move || {
                while !cancel.load(Ordering::SeqCst) {
                    if let Some(event) = relay.recv_timeout(EVENT_WAIT) {
                        event.deliver(&mut hook);
                    }
                }
                relay.dispatch(&mut hook);
            })
        };
        let printer = self.external_printer();

        if let Err(e) = self.attach(&printer) {
            printer.println(ErrorView::from(e));
        }

        loop {
            match self.editor.readline(PROMPT) {
                Ok(input) => {
                    if input.trim().is_empty() {
                        continue;
                    }
                    _ = self.editor.add_history_entry(&input);

                    if self.session.state() == SessionState::BlockedOnInput {
                        weak_error!(self.session.provide_input(&input), "provide input:");
                        continue;
                    }

                    match Command::parse(&input) {
                        Ok(Command::Quit) => {
                            if self.session.is_attached() {
                                weak_error!(self.session.quit(), "quit:");
                            }
                            break;
                        }
                        Ok(cmd) => {
                            if let Err(e) = self.handle_command(cmd, &printer) {
                                printer.println(ErrorView::from(&e));
                                if e.is_fatal() {
                                    printer.println("session detached, use `attach` to reconnect");
                                }
                            }
                        }
                        Err(CommandError::Empty) => {}
                        Err(e) => printer.println(ErrorView::from(e)),
                    }
                }
                Err(ReadlineError::Interrupted) => match self.session.state() {
                    SessionState::Running => {
                        weak_error!(self.session.interrupt(), "interrupt:");
                    }
                    _ => printer.println("use `quit` or Ctrl-D to exit"),
                },
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    println!("error: {err:#}");
                    break;
                }
            }
        }

        self.session.detach();
        cancel.store(true, Ordering::SeqCst);
        _ = event_printer.join();
        Ok(())
    }

    /// Printer that keeps the prompt intact, plain stdout if the terminal
    /// does not support it.
    fn external_printer(&mut self) -> ExternalPrinter {
        ExternalPrinter::new_for_editor(&mut self.editor).unwrap_or_else(|e| {
            warn!(target: "console", "external printer unavailable, fall back to stdout: {e}");
            ExternalPrinter::stdout()
        })
    }

    fn attach(&self, printer: &ExternalPrinter) -> Result<(), Error> {
        printer.println(format!(
            "attaching to {}:{}",
            self.connect.host, self.connect.port
        ));
        self.session.attach_with_retry(&self.connect)?;
        if self.session.is_remote() {
            printer.println("attached to a remote agent, source files may differ");
        } else {
            printer.println("attached");
        }
        Ok(())
    }

    fn handle_command(&self, cmd: Command, printer: &ExternalPrinter) -> Result<(), Error> {
        match cmd {
            Command::Step => self.session.step()?,
            Command::Next => self.session.next()?,
            Command::Return => self.session.step_return()?,
            Command::Continue(None) => self.session.continue_execution()?,
            Command::Continue(Some((file, line))) => self.session.continue_to(&file, line)?,
            Command::Jump(line) => self.session.jump(line)?,
            Command::Break {
                file,
                line,
                temporary,
                condition,
            } => {
                let brkpt = Breakpoint::build(&file, Some(line), temporary, condition);
                let text = brkpt.to_string();
                self.session.set_breakpoint(brkpt)?;
                printer.println(text);
            }
            Command::Clear {
                file,
                line: Some(line),
            } => self
                .session
                .clear_breakpoint(&Breakpoint::new(&file, line))?,
            Command::Clear { file, line: None } => self.session.clear_file_breakpoints(&file)?,
            Command::Breakpoints => {
                let breakpoints = self.session.breakpoints();
                if breakpoints.is_empty() {
                    printer.println("no breakpoints");
                } else {
                    printer.println(
                        breakpoints
                            .iter()
                            .enumerate()
                            .map(|(num, brkpt)| format!("{num}: {brkpt}"))
                            .join("\n"),
                    );
                }
            }
            Command::Eval(expression) => printer.println(render(&self.session.eval(&expression)?)),
            Command::Exec(statement) => {
                let result = self.session.exec(&statement)?;
                if !result.is_null() {
                    printer.println(render(&result));
                }
            }
            Command::Where => printer.println(render_call_stack(&self.session.call_stack()?)),
            Command::Environment => {
                printer.println(render_environment(&self.session.environment()?))
            }
            Command::Interrupt => self.session.interrupt()?,
            Command::Attach => self.attach(printer)?,
            Command::Detach => self.session.detach(),
            Command::State => {
                printer.println(KeywordView::from(self.session.state()));
                if let Some(location) = self.session.location() {
                    printer.println(format!(
                        "{}:{} {}",
                        FilePathView::from(&location.file),
                        LineView::from(location.line),
                        location.source.trim()
                    ));
                }
                if let Some(exception) = self.session.last_exception() {
                    printer.println(format!("{} {exception}", ErrorView::from("last exception:")));
                }
            }
            Command::Help => printer.println(HELP),
            Command::Quit => self.session.quit()?,
        }
        Ok(())
    }
}
