//! An embeddable scripting console window for egui applications
//!
//! This crate provides a console widget that evaluates Koto code against live
//! objects of the running application. The host seeds the namespace with its
//! own objects, toggles the console from a menu or shortcut, and the user
//! evaluates expressions and statements against them in place; no external
//! debugger, no second process. Evaluation is synchronous on the UI thread by
//! design, so scripts can drive host objects without cross-thread marshaling.
//!
//! User-code failures are contained: errors are formatted into the console's
//! own output, never propagated to the host.

#![warn(missing_docs)]

pub mod completion;
pub mod console;
pub mod runtime;
pub mod script_console;

pub use crate::completion::{complete, Completion, NamespaceView};
pub use crate::console::ConsoleBuilder;
pub use crate::console::ConsoleEvent;
pub use crate::console::ConsoleWindow;
pub use crate::console::KeyBindings;
pub use crate::console::StyledText;
pub use crate::console::TerminalTheme;
pub use crate::console::TextStyle;
pub use crate::runtime::{ConsoleCommand, ConsoleError, EvalOutcome, EvalRuntime, LAST_RESULT_NAME};
pub use crate::script_console::ScriptConsole;
