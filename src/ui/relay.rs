//! Queue of session events between the session background thread and a UI.

use serde_json::Value;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Mutex;
use std::time::Duration;
use strum_macros::IntoStaticStr;

/// Something a UI should react to.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Event {
    /// Output of the debugged program.
    Write(String),
    /// The program stopped at a line.
    MarkCurrentLine {
        file: String,
        line: u32,
        /// Call stack, environment and other context the agent attached.
        context: Value,
    },
    /// The program left the last interaction (resumed or detached).
    ClearInteraction,
    /// Unhandled exception in the debugged program.
    Exception(String),
    /// The program waits for a line of input.
    InputRequested(String),
}

impl Event {
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Hand the event to the matching hook method.
    pub fn deliver(self, hook: &mut impl EventHook) {
        match self {
            Event::Write(text) => hook.on_write(&text),
            Event::MarkCurrentLine {
                file,
                line,
                context,
            } => hook.on_mark_current_line(&file, line, &context),
            Event::ClearInteraction => hook.on_clear_interaction(),
            Event::Exception(message) => hook.on_exception(&message),
            Event::InputRequested(prompt) => hook.on_input_requested(&prompt),
        }
    }
}

/// Typed receiver of relayed events.
pub trait EventHook {
    fn on_write(&mut self, text: &str);
    fn on_mark_current_line(&mut self, file: &str, line: u32, context: &Value);
    fn on_clear_interaction(&mut self);
    fn on_exception(&mut self, message: &str);
    fn on_input_requested(&mut self, prompt: &str);
}

/// Unbounded FIFO, publishing never blocks.
pub struct EventRelay {
    tx: Sender<Event>,
    rx: Mutex<Receiver<Event>>,
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRelay {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn publish(&self, event: Event) {
        log::debug!(target: "session", "event: {}", event.name());
        // receiver lives as long as the relay
        _ = self.tx.send(event);
    }

    /// Take all queued events.
    pub fn drain(&self) -> Vec<Event> {
        self.rx.lock().unwrap().try_iter().collect()
    }

    /// Wait for the next event at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        match self.rx.lock().unwrap().recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Deliver all queued events to a hook, return the number of delivered events.
    pub fn dispatch(&self, hook: &mut impl EventHook) -> usize {
        let events = self.drain();
        let count = events.len();
        events.into_iter().for_each(|event| event.deliver(hook));
        count
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
    }

    impl EventHook for Recorder {
        fn on_write(&mut self, text: &str) {
            self.log.push(format!("write {text}"));
        }

        fn on_mark_current_line(&mut self, file: &str, line: u32, _: &Value) {
            self.log.push(format!("mark {file}:{line}"));
        }

        fn on_clear_interaction(&mut self) {
            self.log.push("clear".to_string());
        }

        fn on_exception(&mut self, message: &str) {
            self.log.push(format!("exception {message}"));
        }

        fn on_input_requested(&mut self, prompt: &str) {
            self.log.push(format!("input {prompt}"));
        }
    }

    #[test]
    fn test_fifo_across_threads() {
        let relay = Arc::new(EventRelay::new());
        let publisher = {
            let relay = relay.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    relay.publish(Event::Write(i.to_string()));
                }
            })
        };
        publisher.join().unwrap();

        let texts: Vec<_> = relay
            .drain()
            .into_iter()
            .map(|e| match e {
                Event::Write(text) => text,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        let expected: Vec<_> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(texts, expected);
        assert!(relay.drain().is_empty());
    }

    #[test]
    fn test_dispatch_to_hook() {
        let relay = EventRelay::new();
        relay.publish(Event::MarkCurrentLine {
            file: "/tmp/a.py".to_string(),
            line: 3,
            context: json!({}),
        });
        relay.publish(Event::Write("hi".to_string()));
        relay.publish(Event::ClearInteraction);
        relay.publish(Event::InputRequested("name? ".to_string()));
        relay.publish(Event::Exception("ZeroDivisionError".to_string()));

        let mut hook = Recorder::default();
        assert_eq!(relay.dispatch(&mut hook), 5);
        assert_eq!(
            hook.log,
            vec![
                "mark /tmp/a.py:3",
                "write hi",
                "clear",
                "input name? ",
                "exception ZeroDivisionError"
            ]
        );
    }

    #[test]
    fn test_recv_timeout() {
        let relay = EventRelay::new();
        assert_eq!(relay.recv_timeout(Duration::from_millis(10)), None);
        relay.publish(Event::ClearInteraction);
        assert_eq!(
            relay.recv_timeout(Duration::from_millis(10)),
            Some(Event::ClearInteraction)
        );
        assert_eq!(Event::ClearInteraction.name(), "clear-interaction");
    }
}
