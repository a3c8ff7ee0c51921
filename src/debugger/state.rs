use strum_macros::Display;

/// Session state as seen by a consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SessionState {
    /// No agent connection.
    Detached,
    /// Attached, the program runs.
    Running,
    /// The program is stopped at a line and accepts commands.
    Interacting,
    /// The program waits for a line of input from the user.
    BlockedOnInput,
}

/// Interaction state of an attached session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(super) enum Interaction {
    #[default]
    NotInteracting,
    Interacting,
    BlockedOnInput,
}

/// Place where the program stopped last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    /// Text of the source line as reported by the agent.
    pub source: String,
}
