//! The embeddable console unit: widget + runtime + visibility

use koto_runtime::KValue;

use crate::completion::{complete, longest_common_prefix};
use crate::runtime::{ConsoleCommand, ConsoleError, EvalRuntime};
use crate::{ConsoleBuilder, ConsoleEvent, ConsoleWindow};

/// An embeddable scripting console bound to a Koto runtime
///
/// The host constructs one instance, binds its live objects into the
/// namespace, draws the console every frame and toggles it from its own menu
/// or shortcut handling. Submitted fragments are evaluated synchronously on
/// the UI thread so scripts can drive host objects directly; a long-running
/// fragment blocks the UI until it returns. Hiding the console preserves
/// namespace, history and scrollback for the rest of the session.
pub struct ScriptConsole {
    console: ConsoleWindow,
    runtime: EvalRuntime,
    visible: bool,
    title: String,
}

impl Default for ScriptConsole {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptConsole {
    /// Create a console with an empty namespace and default settings
    pub fn new() -> Self {
        Self::from_builder(ConsoleBuilder::new())
    }

    /// Create a console from a configured [`ConsoleBuilder`]
    pub fn from_builder(builder: ConsoleBuilder) -> Self {
        let mut console = builder.build();
        console.write_info("Scripting console. Koto code is evaluated as you enter it.");
        console.write("Tab completes, Up/Down recall history, Ctrl+W hides the console.");

        Self {
            console,
            runtime: EvalRuntime::new(),
            visible: true,
            title: "Console".to_string(),
        }
    }

    /// Create a console whose namespace is seeded from `bindings`
    /// # Arguments
    /// * `bindings` - (name, object) pairs to expose to user code
    ///
    /// Fails if any name is not a valid identifier; that is a programming
    /// error in the embedding host.
    pub fn with_bindings<I, N>(bindings: I) -> Result<Self, ConsoleError>
    where
        I: IntoIterator<Item = (N, KValue)>,
        N: AsRef<str>,
    {
        let mut this = Self::new();
        for (name, value) in bindings {
            this.bind(name.as_ref(), value)?;
        }
        Ok(this)
    }

    /// Insert a host object into the namespace
    pub fn bind(&mut self, name: &str, value: impl Into<KValue>) -> Result<(), ConsoleError> {
        self.runtime.bind(name, value)
    }

    /// Set the title of the floating window
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Show the console
    pub fn show(&mut self) {
        self.visible = true;
    }

    /// Hide the console, preserving namespace, history and scrollback
    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Toggle console visibility
    pub fn toggle_visibility(&mut self) {
        self.visible = !self.visible;
    }

    /// Check if the console is visible
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Draw the console as a floating window
    pub fn draw_window(&mut self, ctx: &egui::Context) -> ConsoleEvent {
        if !self.visible {
            return ConsoleEvent::None;
        }

        let mut event = ConsoleEvent::None;
        let title = self.title.clone();
        egui::Window::new(title)
            .default_width(800.0)
            .default_height(400.0)
            .resizable(true)
            .show(ctx, |ui| {
                event = self.draw_inline(ui);
            });

        event
    }

    /// Draw the console inline in the current UI
    pub fn draw_inline(&mut self, ui: &mut egui::Ui) -> ConsoleEvent {
        let event = self.console.draw(ui);

        match event.clone() {
            ConsoleEvent::Submitted(code) => self.submit(&code),
            ConsoleEvent::CompletionRequested(line) => self.complete_input(&line),
            ConsoleEvent::CloseRequested => self.hide(),
            ConsoleEvent::None => {}
        }

        event
    }

    /// Draw the console as a bottom panel
    pub fn draw_bottom_panel(&mut self, ctx: &egui::Context) -> ConsoleEvent {
        if !self.visible {
            return ConsoleEvent::None;
        }

        let mut event = ConsoleEvent::None;
        egui::TopBottomPanel::bottom("script_console_panel")
            .default_height(200.0)
            .resizable(true)
            .show(ctx, |ui| {
                event = self.draw_inline(ui);
            });

        event
    }

    /// Evaluate a submitted fragment and write the outcome to the buffer
    ///
    /// Also used by hosts that want to run code programmatically (e.g. a
    /// startup script); output lands in the console like a typed submission.
    pub fn submit(&mut self, code: &str) {
        if code.trim().is_empty() {
            self.console.prompt();
            return;
        }

        let outcome = self.runtime.eval(code);

        for line in &outcome.printed {
            self.console.write(line);
        }
        for command in outcome.commands {
            match command {
                ConsoleCommand::Clear => self.console.clear(),
                ConsoleCommand::WriteLine { text, style } => match style.as_str() {
                    "error" => self.console.write_error(text),
                    "success" => self.console.write_success(text),
                    "warning" => self.console.write_warning(text),
                    "info" => self.console.write_info(text),
                    _ => self.console.write(&text),
                },
            }
        }
        if let Some(value) = &outcome.value {
            self.console.write(value);
        }
        if let Some(error) = &outcome.error {
            self.console.write_error(error);
        }

        self.console.prompt();
    }

    // Tab pressed: one candidate is inserted outright, several first extend
    // the input by their common prefix, otherwise the list is shown.
    fn complete_input(&mut self, line: &str) {
        let completion = complete(&self.runtime, line);
        match completion.candidates.as_slice() {
            [] => {}
            [only] => {
                let suffix = only[completion.prefix.len()..].to_string();
                self.console.accept_completion(&suffix);
            }
            candidates => {
                let common = longest_common_prefix(candidates);
                if common.len() > completion.prefix.len() {
                    let suffix = common[completion.prefix.len()..].to_string();
                    self.console.accept_completion(&suffix);
                } else {
                    self.console.show_completion_candidates(line, candidates);
                }
            }
        }
    }

    /// Get access to the underlying console for advanced operations
    pub fn console_mut(&mut self) -> &mut ConsoleWindow {
        &mut self.console
    }

    /// Get read-only access to the underlying console
    pub fn console(&self) -> &ConsoleWindow {
        &self.console
    }

    /// Get access to the underlying runtime
    pub fn runtime_mut(&mut self) -> &mut EvalRuntime {
        &mut self.runtime
    }

    /// Get read-only access to the underlying runtime
    pub fn runtime(&self) -> &EvalRuntime {
        &self.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use koto_runtime::{CallContext, KMap};

    fn console_with_window() -> ScriptConsole {
        let window = KMap::new();
        window.add_fn("show", |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            Ok(KValue::Bool(true))
        });
        window.add_fn("hide", |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            Ok(KValue::Bool(false))
        });
        ScriptConsole::with_bindings([("window", KValue::Map(window))]).unwrap()
    }

    #[test]
    fn submitted_expression_writes_its_value() {
        let mut console = ScriptConsole::new();
        console.submit("2 + 2");
        assert!(console.console().text.contains("\n4\n"));
        assert!(console.console().text.ends_with(">> "));
    }

    #[test]
    fn submitted_error_is_written_in_error_style() {
        let mut console = ScriptConsole::new();
        console.submit("no_such_function()");
        let text = &console.console().text;
        let (range, style) = console
            .console()
            .styled_segments
            .iter()
            .rev()
            .find(|(_, style)| *style == crate::TextStyle::Error)
            .expect("an error segment");
        assert!(!text[range.clone()].is_empty());
        assert_eq!(*style, crate::TextStyle::Error);
        // session continues: the next submission still evaluates
        console.submit("1 + 1");
        assert!(console.console().text.contains("\n2\n"));
    }

    #[test]
    fn printed_output_is_written_before_the_result() {
        let mut console = ScriptConsole::new();
        console.submit("print 'side effect'\n40 + 2");
        let text = &console.console().text;
        let printed = text.find("side effect").expect("printed line");
        let result = text.rfind("42").expect("result line");
        assert!(printed < result);
    }

    #[test]
    fn console_clear_command_empties_the_buffer() {
        let mut console = ScriptConsole::new();
        console.submit("1 + 1");
        console.submit("console.clear()");
        // only the output written after the clear survives
        assert!(!console.console().text.contains("\n2\n"));
        assert!(console.console().text.ends_with(">> "));
    }

    #[test]
    fn blank_submission_just_reprompts() {
        let mut console = ScriptConsole::new();
        let before = console.console().text.clone();
        console.submit("   ");
        assert_eq!(console.console().text, format!("{before}\n>> "));
    }

    #[test]
    fn invalid_binding_is_a_construction_error() {
        let result = ScriptConsole::with_bindings([("not a name", KValue::Null)]);
        assert!(matches!(result, Err(ConsoleError::InvalidName(_))));
    }

    #[test]
    fn single_candidate_is_inserted_directly() {
        let mut console = console_with_window();
        console.console_mut().prompt();
        console.console_mut().text.push_str("wind");
        console.complete_input("wind");
        assert_eq!(console.console().get_last_line(), "window");
    }

    #[test]
    fn attribute_candidates_share_no_prefix_so_they_are_listed() {
        let mut console = console_with_window();
        console.console_mut().prompt();
        console.console_mut().text.push_str("window.");
        console.complete_input("window.");
        let text = &console.console().text;
        assert!(text.contains("hide    show"));
        assert_eq!(console.console().get_last_line(), "window.");
    }

    #[test]
    fn common_prefix_is_inserted_before_listing() {
        let mut console = ScriptConsole::new();
        let map = KMap::new();
        map.add_fn("show_all", |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            Ok(KValue::Null)
        });
        map.add_fn("show_one", |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            Ok(KValue::Null)
        });
        console.bind("window", KValue::Map(map)).unwrap();

        console.console_mut().prompt();
        console.console_mut().text.push_str("window.s");
        console.complete_input("window.s");
        assert_eq!(console.console().get_last_line(), "window.show_");
    }

    #[test]
    fn no_candidates_leaves_the_input_untouched() {
        let mut console = console_with_window();
        console.console_mut().prompt();
        console.console_mut().text.push_str("zzz");
        console.complete_input("zzz");
        assert_eq!(console.console().get_last_line(), "zzz");
    }

    #[test]
    fn hide_and_show_preserve_session_state() {
        let mut console = console_with_window();
        console.submit("a = 41");
        console.hide();
        assert!(!console.is_visible());
        console.show();
        assert!(console.is_visible());
        console.submit("a + 1");
        assert!(console.console().text.contains("\n42\n"));
    }
}
