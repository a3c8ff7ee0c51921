use crate::ui::console::QdbEditor;
use rustyline::ExternalPrinter as RLExternalPrinter;
use std::cell::RefCell;
use std::fmt::Display;

/// [ExternalPrinter] prints messages above the prompt line without breaking
/// user input. Falls back to stdout if no line editor printer is available.
pub struct ExternalPrinter {
    printer: Option<RefCell<Box<dyn RLExternalPrinter>>>,
}

unsafe impl Send for ExternalPrinter {}

impl ExternalPrinter {
    pub fn new_for_editor(editor: &mut QdbEditor) -> rustyline::Result<Self> {
        let external_p = editor.create_external_printer()?;
        Ok(Self {
            printer: Some(RefCell::new(Box::new(external_p))),
        })
    }

    /// Printer writing straight to stdout.
    pub fn stdout() -> Self {
        Self { printer: None }
    }

    pub fn print(&self, msg: impl Display) {
        let msg = msg.to_string();
        match &self.printer {
            None => print!("{msg}"),
            Some(printer) => {
                if let Err(e) = printer.borrow_mut().print(msg.clone()) {
                    log::debug!(target: "console", "external printer: {e}");
                    print!("{msg}");
                }
            }
        }
    }

    pub fn println(&self, msg: impl Display) {
        self.print(format!("{msg}\n"))
    }
}

pub mod style {
    use crossterm::style::{Color, Stylize};
    use std::fmt::{Display, Formatter};

    pub const UNKNOWN_PLACEHOLDER: &str = "???";

    struct View<T: Display> {
        inner: Option<T>,
        color: Color,
    }

    impl<T: Display> Display for View<T> {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            let text = self
                .inner
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());
            f.write_fmt(format_args!("{}", text.with(self.color)))
        }
    }

    /// Declare a view for data of the same kind (file paths, keywords, etc.).
    macro_rules! view_struct {
        ($name: ident, $color: expr) => {
            pub struct $name<T: Display>(View<T>);

            impl<T: Display> From<T> for $name<T> {
                fn from(value: T) -> Self {
                    Self(View {
                        inner: Some(value),
                        color: $color,
                    })
                }
            }

            impl<T: Display> From<Option<T>> for $name<T> {
                fn from(value: Option<T>) -> Self {
                    Self(View {
                        inner: value,
                        color: $color,
                    })
                }
            }

            impl<T: Display> Display for $name<T> {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    self.0.fmt(f)
                }
            }
        };
    }

    view_struct!(FilePathView, Color::Green);
    view_struct!(LineView, Color::Blue);
    view_struct!(KeywordView, Color::Magenta);
    view_struct!(ErrorView, Color::DarkRed);
    view_struct!(ImportantView, Color::Yellow);
}
