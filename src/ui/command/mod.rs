//! Commands a user issues to a debugging session from the console.
//!
//! A command names an action and its arguments, [`parser`] turns an input
//! line into one.

pub mod parser;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("malformed command: {0}")]
    Parsing(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Step,
    Next,
    Return,
    /// Continue, optionally until a `FILE:LINE` is reached.
    Continue(Option<(String, u32)>),
    Jump(u32),
    Break {
        file: String,
        line: u32,
        temporary: bool,
        condition: Option<String>,
    },
    /// Remove a breakpoint, or every breakpoint of a file if no line given.
    Clear {
        file: String,
        line: Option<u32>,
    },
    Breakpoints,
    Eval(String),
    Exec(String),
    Where,
    Environment,
    Interrupt,
    Attach,
    Detach,
    State,
    Quit,
    Help,
}
