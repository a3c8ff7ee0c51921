use crate::rpc::{ConnectionError, DecodeError, RemoteError};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --------------------------------- connection errors -----------------------------------------
    #[error("connect to agent: {0}")]
    Connect(ConnectionError),
    #[error("authentication failed: {0}")]
    Auth(ConnectionError),
    #[error("agent not reachable after {attempts} attempts: {last}")]
    AttachExhausted {
        attempts: u32,
        last: Box<Error>,
    },
    #[error("session already attached")]
    AlreadyAttached,
    #[error("session not attached")]
    NotAttached,
    #[error("connection to agent lost")]
    Disconnected,

    // --------------------------------- protocol errors -------------------------------------------
    #[error("protocol: {0}")]
    Protocol(#[from] DecodeError),
    #[error("encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("no response to `{method}` within {timeout:?}")]
    ResponseTimeout {
        method: &'static str,
        timeout: Duration,
    },

    // --------------------------------- state errors ----------------------------------------------
    #[error("program is not stopped at an interaction")]
    NotInteracting,
    #[error("program is busy and did not stop in time")]
    Busy,
    #[error("program is waiting for input")]
    WaitingForInput,

    // --------------------------------- remote errors ---------------------------------------------
    #[error("agent error: {0}")]
    Remote(#[from] RemoteError),
    #[error("exception in debugged program: {0}")]
    RemoteException(String),

    // --------------------------------- breakpoint errors -----------------------------------------
    #[error("breakpoint not found: {0}")]
    BreakpointNotFound(String),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}

impl From<ConnectionError> for Error {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::Auth(_) => Error::Auth(e),
            _ => Error::Connect(e),
        }
    }
}

impl Error {
    /// Return a hint to an interface - keep using the session after error or attach again.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::AlreadyAttached => false,
            Error::Protocol(_) => false,
            Error::Encode(_) => false,
            Error::ResponseTimeout { .. } => false,
            Error::NotInteracting => false,
            Error::Busy => false,
            Error::WaitingForInput => false,
            Error::Remote(_) => false,
            Error::RemoteException(_) => false,
            Error::BreakpointNotFound(_) => false,

            // session is detached
            Error::Connect(_) => true,
            Error::Auth(_) => true,
            Error::AttachExhausted { .. } => true,
            Error::NotAttached => true,
            Error::Disconnected => true,
            Error::IO(_) => true,
        }
    }
}

#[macro_export]
macro_rules! _error {
    ($log_fn: path, $res: expr) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "session", "{:#}", e);
                None
            }
        }
    };
    ($log_fn: path, $res: expr, $msg: tt) => {
        match $res {
            Ok(value) => Some(value),
            Err(e) => {
                $log_fn!(target: "session", concat!($msg, " {:#}"), e);
                None
            }
        }
    };
}

/// Transforms `Result` into `Option` and logs an error if it occurs.
#[macro_export]
macro_rules! weak_error {
    ($res: expr) => {
        $crate::_error!(log::warn, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::warn, $res, $msg)
    };
}

/// Transforms `Result` into `Option` and put error into debug logs if it occurs.
#[macro_export]
macro_rules! muted_error {
    ($res: expr) => {
        $crate::_error!(log::debug, $res)
    };
    ($res: expr, $msg: tt) => {
        $crate::_error!(log::debug, $res, $msg)
    };
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rpc::auth::AuthError;

    #[test]
    fn test_connection_error_kind() {
        let err: Error = ConnectionError::Auth(AuthError::WrongDigest).into();
        assert!(matches!(err, Error::Auth(_)));
        assert!(err.is_fatal());

        let io = std::io::Error::from(std::io::ErrorKind::ConnectionRefused);
        let err: Error = ConnectionError::Connect {
            addr: "127.0.0.1:6000".to_string(),
            source: io,
        }
        .into();
        assert!(matches!(err, Error::Connect(_)));
    }

    #[test]
    fn test_state_errors_are_recoverable() {
        assert!(!Error::NotInteracting.is_fatal());
        assert!(!Error::Busy.is_fatal());
        assert!(!Error::Remote(RemoteError::new("bad")).is_fatal());
        assert!(Error::Disconnected.is_fatal());
    }

    #[test]
    fn test_weak_error_to_option() {
        let ok: Result<u32, Error> = Ok(1);
        assert_eq!(weak_error!(ok), Some(1));
        let err: Result<u32, Error> = Err(Error::Busy);
        assert_eq!(muted_error!(err, "ignored:"), None);
    }
}
