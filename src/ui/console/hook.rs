use crate::ui::console::print::style::{ErrorView, FilePathView, ImportantView, LineView};
use crate::ui::console::print::ExternalPrinter;
use crate::ui::relay::EventHook;
use serde_json::Value;

/// Prints session events to the terminal.
pub struct TerminalHook {
    printer: ExternalPrinter,
}

impl TerminalHook {
    pub fn new(printer: ExternalPrinter) -> Self {
        Self { printer }
    }
}

impl EventHook for TerminalHook {
    fn on_write(&mut self, text: &str) {
        self.printer.print(text);
    }

    fn on_mark_current_line(&mut self, file: &str, line: u32, context: &Value) {
        self.printer.println(format!(
            "> {}:{}",
            FilePathView::from(file),
            LineView::from(line)
        ));
        if let Some(Value::Array(stack)) = context.get("call_stack") {
            log::debug!(target: "console", "call stack depth: {}", stack.len());
        }
    }

    fn on_clear_interaction(&mut self) {
        log::debug!(target: "console", "program resumed");
    }

    fn on_exception(&mut self, message: &str) {
        self.printer
            .println(format!("{} {}", ErrorView::from("exception:"), message));
    }

    fn on_input_requested(&mut self, prompt: &str) {
        self.printer.println(format!(
            "{} {prompt}",
            ImportantView::from("program waits for input:")
        ));
    }
}
