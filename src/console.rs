//! The terminal-style console widget
//!
//! One text buffer holds scrollback, prompt and input line; key handling
//! turns Enter/Tab/close presses into [`ConsoleEvent`]s for the embedding
//! layer to act on.

use std::collections::VecDeque;
use std::ops::Range;
use std::str::Lines;
use std::sync::atomic::AtomicU16;

use egui::text::LayoutJob;
use egui::{Align, Color32, Context, Event, EventFilter, FontId, Id, Key, Modifiers, TextEdit, TextFormat, Ui};
use itertools::Itertools;

static INSTANCE_COUNT: AtomicU16 = AtomicU16::new(0);

/// Events that can be returned from the console window
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// The user submitted the current input line for evaluation
    Submitted(String),
    /// The user asked for completion of the current input line
    CompletionRequested(String),
    /// The user pressed the close shortcut
    CloseRequested,
    /// No event
    None,
}

/// Text style for styled output
#[derive(Debug, Clone, PartialEq)]
pub enum TextStyle {
    /// Normal text style
    Normal,
    /// Error text style
    Error,
    /// Success text style
    Success,
    /// Warning text style
    Warning,
    /// Info text style
    Info,
    /// Custom color text style
    Custom(Color32),
}

impl TextStyle {
    fn resolve(&self, theme: &TerminalTheme) -> Color32 {
        match self {
            TextStyle::Normal => theme.foreground,
            TextStyle::Error => theme.error,
            TextStyle::Success => theme.success,
            TextStyle::Warning => theme.warning,
            TextStyle::Info => theme.info,
            TextStyle::Custom(color) => *color,
        }
    }
}

/// A segment of text with a style
#[derive(Debug, Clone)]
pub struct StyledText {
    /// The text content
    pub text: String,
    /// The style to apply to the text
    pub style: TextStyle,
}

impl StyledText {
    /// Create a styled segment
    pub fn new(text: String, style: TextStyle) -> Self {
        Self { text, style }
    }

    /// Normal style segment
    pub fn normal(text: String) -> Self {
        Self { text, style: TextStyle::Normal }
    }

    /// Error style segment
    pub fn error(text: String) -> Self {
        Self { text, style: TextStyle::Error }
    }

    /// Success style segment
    pub fn success(text: String) -> Self {
        Self { text, style: TextStyle::Success }
    }

    /// Warning style segment
    pub fn warning(text: String) -> Self {
        Self { text, style: TextStyle::Warning }
    }

    /// Info style segment
    pub fn info(text: String) -> Self {
        Self { text, style: TextStyle::Info }
    }

    /// Custom color segment
    pub fn custom(text: String, color: Color32) -> Self {
        Self { text, style: TextStyle::Custom(color) }
    }
}

/// Theme for the terminal
#[derive(Debug, Clone)]
pub struct TerminalTheme {
    /// Background color
    pub background: Color32,
    /// Foreground color
    pub foreground: Color32,
    /// Selection color
    pub selection: Color32,
    /// Cursor color
    pub cursor: Color32,
    /// Error text color
    pub error: Color32,
    /// Success text color
    pub success: Color32,
    /// Warning text color
    pub warning: Color32,
    /// Info text color
    pub info: Color32,
    /// Prompt color
    pub prompt: Color32,
}

impl Default for TerminalTheme {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(30, 30, 30),
            foreground: Color32::from_rgb(220, 220, 220),
            selection: Color32::from_rgb(70, 70, 70),
            cursor: Color32::from_rgb(255, 255, 255),
            error: Color32::from_rgb(255, 85, 85),
            success: Color32::from_rgb(80, 250, 123),
            warning: Color32::from_rgb(255, 184, 108),
            info: Color32::from_rgb(139, 233, 253),
            prompt: Color32::from_rgb(189, 147, 249),
        }
    }
}

/// Rebindable keyboard shortcuts for the console
///
/// Defaults: Enter executes, Tab completes, Ctrl+W (⌘W on macOS) closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBindings {
    /// Submit the current input line for evaluation
    pub execute: (Modifiers, Key),
    /// Request completion of the current input line
    pub complete: (Modifiers, Key),
    /// Hide the console
    pub close: (Modifiers, Key),
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            execute: (Modifiers::NONE, Key::Enter),
            complete: (Modifiers::NONE, Key::Tab),
            close: (Modifiers::COMMAND, Key::W),
        }
    }
}

/// Console Window
///
/// A terminal-style widget: one text buffer holding the scrollback, the
/// prompt, and the current input line. The caret is confined to the input
/// line; everything above it is read-only history.
pub struct ConsoleWindow {
    pub(crate) text: String,
    pub(crate) force_cursor_to_end: bool,
    history_size: usize,
    pub(crate) scrollback_size: usize,
    command_history: VecDeque<String>,
    history_cursor: Option<usize>,
    // parked input line while the user browses history
    pending_entry: Option<String>,
    pub(crate) prompt: String,
    prompt_len: usize,
    id: Id,
    init_done: bool,
    bindings: KeyBindings,

    // styled output
    pub(crate) styled_segments: Vec<(Range<usize>, TextStyle)>,
    pub(crate) theme: TerminalTheme,
}

impl ConsoleWindow {
    pub(crate) fn new(prompt: &str) -> Self {
        Self {
            text: String::new(),
            force_cursor_to_end: false,
            command_history: VecDeque::new(),
            history_cursor: None,
            pending_entry: None,
            history_size: 100,
            scrollback_size: 1000,
            prompt: prompt.to_string(),
            prompt_len: prompt.chars().count(),
            id: Id::new(format!(
                "console_text_{}",
                INSTANCE_COUNT.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            )),
            init_done: false,
            bindings: KeyBindings::default(),
            styled_segments: Vec::new(),
            theme: TerminalTheme::default(),
        }
    }

    /// Draw the console window
    /// # Arguments
    /// * `ui` - the egui Ui context
    ///
    /// # Returns
    /// * `ConsoleEvent` - the event that was generated by the console
    ///
    pub fn draw(&mut self, ui: &mut Ui) -> ConsoleEvent {
        if !self.init_done {
            self.init_done = true;
            self.draw_prompt();
        }
        // do we need to handle keyboard events?
        let event = if ui.ctx().memory(|mem| mem.has_focus(self.id)) {
            self.handle_kb(ui.ctx())
        } else {
            ConsoleEvent::None
        };

        self.ui(ui);

        // claim escape, arrows and tab while focused; tab drives completion
        let event_filter = EventFilter {
            escape: true,
            horizontal_arrows: true,
            vertical_arrows: true,
            tab: true,
        };
        if ui.ctx().memory(|mem| mem.has_focus(self.id)) {
            ui.ctx()
                .memory_mut(|mem| mem.set_focus_lock_filter(self.id, event_filter));
        }

        event
    }

    /// Write a line to the console
    /// # Arguments
    /// * `data` - the string to write
    ///
    /// Note that you can call this without the user having typed anything.
    ///
    pub fn write(&mut self, data: &str) {
        self.start_line();
        self.text.push_str(data);
        self.truncate_scroll_back();
        self.force_cursor_to_end = true;
    }

    /// Write text with a specific style
    pub fn write_styled(&mut self, styled_text: StyledText) {
        self.start_line();
        let start = self.text.len();
        self.text.push_str(&styled_text.text);
        self.styled_segments.push((start..self.text.len(), styled_text.style));
        self.truncate_scroll_back();
        self.force_cursor_to_end = true;
    }

    /// Write text with error style
    pub fn write_error(&mut self, text: impl Into<String>) {
        self.write_styled(StyledText::error(text.into()));
    }

    /// Write text with success style
    pub fn write_success(&mut self, text: impl Into<String>) {
        self.write_styled(StyledText::success(text.into()));
    }

    /// Write text with warning style
    pub fn write_warning(&mut self, text: impl Into<String>) {
        self.write_styled(StyledText::warning(text.into()));
    }

    /// Write text with info style
    pub fn write_info(&mut self, text: impl Into<String>) {
        self.write_styled(StyledText::info(text.into()));
    }

    /// Set the theme for the console
    pub fn set_theme(&mut self, theme: TerminalTheme) {
        self.theme = theme;
    }

    /// Loads the history from an iterator of strings
    /// # Arguments
    /// * `history` - an iterator of strings
    ///
    ///
    pub fn load_history(&mut self, history: Lines<'_>) {
        self.command_history = history.into_iter().map(|s| s.to_string()).collect();
        self.history_cursor = None;
        self.pending_entry = None;
    }

    /// Get the history of the console
    /// # Returns
    /// * `VecDeque<String>` - the history of the console
    ///
    ///
    pub fn get_history(&self) -> VecDeque<String> {
        self.command_history.clone()
    }

    /// Clear the history of the console
    ///
    pub fn clear_history(&mut self) {
        self.command_history.clear();
        self.history_cursor = None;
        self.pending_entry = None;
    }

    /// Clear the console
    pub fn clear(&mut self) {
        self.text.clear();
        self.styled_segments.clear();
        self.force_cursor_to_end = false;
    }

    /// Prompt the user for input
    pub fn prompt(&mut self) {
        self.draw_prompt();
    }

    /// Append the remainder of an accepted completion candidate to the input
    pub fn accept_completion(&mut self, suffix: &str) {
        self.text.push_str(suffix);
        self.force_cursor_to_end = true;
    }

    /// List completion candidates, then redraw the prompt and the input line
    /// # Arguments
    /// * `line` - the input line being completed
    /// * `candidates` - the candidate names to list
    ///
    pub fn show_completion_candidates(&mut self, line: &str, candidates: &[String]) {
        let listing = candidates.iter().join("    ");
        self.write(&listing);
        self.draw_prompt();
        self.text.push_str(line);
        self.force_cursor_to_end = true;
    }

    fn cursor_at_end(&self) -> egui::text::CCursorRange {
        egui::text::CCursorRange::one(egui::text::CCursor::new(self.text.chars().count()))
    }

    fn start_line(&mut self) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
    }

    fn ui(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::both().show(ui, |ui| {
            ui.style_mut().visuals.extreme_bg_color = self.theme.background;
            ui.style_mut().visuals.code_bg_color = self.theme.background;

            ui.add_sized(ui.available_size(), |ui: &mut Ui| {
                ui.style_mut().visuals.extreme_bg_color = self.theme.background;
                ui.style_mut().visuals.code_bg_color = self.theme.background;
                ui.style_mut().visuals.selection.bg_fill = self.theme.selection;
                ui.style_mut().visuals.selection.stroke.color = self.theme.cursor;

                // paint the styled segments; untagged spans use the theme
                // foreground
                let font_id = egui::TextStyle::Monospace.resolve(ui.style());
                let segments = self.styled_segments.clone();
                let theme = self.theme.clone();
                let mut layouter = move |ui: &Ui, text: &str, wrap_width: f32| {
                    let job = layout_styled(text, &segments, &theme, &font_id, wrap_width);
                    ui.fonts(|fonts| fonts.layout_job(job))
                };

                let widget = egui::TextEdit::multiline(&mut self.text)
                    .font(egui::TextStyle::Monospace)
                    .frame(false)
                    .code_editor()
                    .lock_focus(true)
                    .desired_width(f32::INFINITY)
                    .layouter(&mut layouter)
                    .id(self.id);
                let output = widget.show(ui);
                let mut new_cursor: Option<egui::text::CCursorRange> = None;

                // fix up cursor position; scroll or mouse moves can leave the
                // caret inside the scrollback or the prompt
                if let Some(cursor) = output.state.cursor.char_range() {
                    if cursor.primary.index < self.last_line_char_offset() + self.prompt_len {
                        new_cursor = Some(self.cursor_at_end());
                    }
                }

                // we need a new line (user pressed enter)
                if self.force_cursor_to_end {
                    new_cursor = Some(self.cursor_at_end());
                    self.force_cursor_to_end = false;
                }

                if new_cursor.is_some() {
                    let text_edit_id = output.response.id;
                    if let Some(mut state) = TextEdit::load_state(ui.ctx(), text_edit_id) {
                        state.cursor.set_char_range(new_cursor);
                        state.store(ui.ctx(), text_edit_id);
                    }
                    ui.scroll_to_cursor(Some(Align::BOTTOM));
                }
                output.response
            });
        });
    }

    pub(crate) fn get_last_line(&self) -> &str {
        self.text
            .lines()
            .last()
            .unwrap_or("")
            .strip_prefix(&self.prompt)
            .unwrap_or("")
    }

    fn truncate_scroll_back(&mut self) {
        let line_count = self.text.lines().count();
        if line_count <= self.scrollback_size {
            return;
        }
        let mut cut = 0;
        for _ in 0..(line_count - self.scrollback_size) {
            match self.text[cut..].find('\n') {
                Some(nl) => cut += nl + 1,
                None => break,
            }
        }
        if cut == 0 {
            return;
        }
        self.text.drain(..cut);
        self.styled_segments.retain_mut(|(range, _)| {
            if range.end <= cut {
                return false;
            }
            range.start = range.start.max(cut) - cut;
            range.end -= cut;
            true
        });
    }

    fn consume_key(ctx: &Context, modifiers: Modifiers, logical_key: Key) {
        ctx.input_mut(|inp| inp.consume_key(modifiers, logical_key));
    }

    fn handle_key(&mut self, key: &Key, modifiers: Modifiers, cursor: usize) -> (bool, ConsoleEvent) {
        // return value is (consume_key, event)

        if modifiers.matches_logically(self.bindings.execute.0) && *key == self.bindings.execute.1 {
            let line = self.get_last_line().to_string();
            if !line.trim().is_empty() {
                if self.command_history.len() >= self.history_size {
                    self.command_history.pop_front();
                }
                self.command_history.push_back(line.clone());
            }
            self.history_cursor = None;
            self.pending_entry = None;
            self.force_cursor_to_end = true;
            self.truncate_scroll_back();
            return (true, ConsoleEvent::Submitted(line));
        }
        if modifiers.matches_logically(self.bindings.close.0) && *key == self.bindings.close.1 {
            return (true, ConsoleEvent::CloseRequested);
        }
        if modifiers.matches_logically(self.bindings.complete.0) && *key == self.bindings.complete.1 {
            return (true, ConsoleEvent::CompletionRequested(self.get_last_line().to_string()));
        }

        match (modifiers, key) {
            (Modifiers::NONE, Key::ArrowUp) => {
                if self.command_history.is_empty() {
                    return (true, ConsoleEvent::None);
                }
                if self.history_cursor.is_none() {
                    // park the in-progress line for the trip through history
                    self.pending_entry = Some(self.get_last_line().to_string());
                }
                self.history_back();
                (true, ConsoleEvent::None)
            }
            (Modifiers::NONE, Key::ArrowDown) => {
                self.history_forward();
                (true, ConsoleEvent::None)
            }
            (Modifiers::NONE, Key::ArrowLeft) | (Modifiers::NONE, Key::Backspace) => {
                // dont allow motion (or deleting) into the prompt
                if cursor < self.last_line_char_offset() + self.prompt_len + 1 {
                    return (true, ConsoleEvent::None);
                }
                (false, ConsoleEvent::None)
            }
            (Modifiers::NONE, Key::Escape) => {
                if self.history_cursor.take().is_some() {
                    let restored = self.pending_entry.take().unwrap_or_default();
                    self.replace_input(&restored);
                }
                (true, ConsoleEvent::None)
            }
            _ => (false, ConsoleEvent::None),
        }
    }

    // swap the text after the prompt for `new_input`
    fn replace_input(&mut self, new_input: &str) {
        let last_len = self.get_last_line().len();
        let keep = self.text.len() - last_len;
        self.text.truncate(keep);
        self.text.push_str(new_input);
        self.force_cursor_to_end = true;
    }

    fn history_back(&mut self) {
        let hc = match self.history_cursor {
            Some(hc) => hc,
            None => self.command_history.len(),
        };
        if hc == 0 {
            return; // at the oldest entry already
        }
        self.history_cursor = Some(hc - 1);
        let entry = self.command_history[hc - 1].clone();
        self.replace_input(&entry);
    }

    fn history_forward(&mut self) {
        if let Some(hc) = self.history_cursor {
            if hc + 1 < self.command_history.len() {
                self.history_cursor = Some(hc + 1);
                let entry = self.command_history[hc + 1].clone();
                self.replace_input(&entry);
            } else {
                // walked past the newest entry; restore the parked line
                self.history_cursor = None;
                let restored = self.pending_entry.take().unwrap_or_default();
                self.replace_input(&restored);
            }
        }
    }

    fn last_line_offset(&self) -> usize {
        // byte offset in buffer of start of last line
        self.text.rfind('\n').map_or(0, |off| off + 1)
    }

    fn last_line_char_offset(&self) -> usize {
        self.text[..self.last_line_offset()].chars().count()
    }

    fn draw_prompt(&mut self) {
        self.start_line();
        let start = self.text.len();
        let prompt = self.prompt.clone();
        self.text.push_str(&prompt);
        self.styled_segments
            .push((start..self.text.len(), TextStyle::Custom(self.theme.prompt)));
        self.force_cursor_to_end = true;
    }

    fn handle_kb(&mut self, ctx: &egui::Context) -> ConsoleEvent {
        // process all the key events in the queue
        // if they are meaningful to the console then use them and consume them
        // otherwise pass along to the textedit widget

        // current cursor position
        let cursor = if let Some(state) = egui::TextEdit::load_state(ctx, self.id) {
            state.cursor.char_range().map_or(0, |range| range.primary.index)
        } else {
            0
        };

        // a list of keys to consume
        let mut kill_list = vec![];
        let mut event = ConsoleEvent::None;
        ctx.input(|input| {
            for input_event in &input.events {
                if let Event::Key {
                    key,
                    physical_key: _,
                    pressed,
                    modifiers,
                    repeat: _,
                } = input_event
                {
                    if *pressed {
                        let (kill, msg) = self.handle_key(key, *modifiers, cursor);
                        if kill {
                            kill_list.push((*modifiers, *key));
                        }
                        if !matches!(msg, ConsoleEvent::None) {
                            event = msg;
                            break;
                        }
                    }
                }
            }
        });

        // consume the keys we used
        for (modifiers, key) in kill_list {
            Self::consume_key(ctx, modifiers, key);
        }

        event
    }
}

fn layout_styled(
    text: &str,
    segments: &[(Range<usize>, TextStyle)],
    theme: &TerminalTheme,
    font_id: &FontId,
    wrap_width: f32,
) -> LayoutJob {
    let plain = TextFormat {
        font_id: font_id.clone(),
        color: theme.foreground,
        ..Default::default()
    };
    let mut job = LayoutJob::default();
    let mut pos = 0;
    for (range, style) in segments {
        let start = floor_char_boundary(text, range.start.min(text.len()));
        let end = floor_char_boundary(text, range.end.min(text.len()));
        if start < pos || start >= end {
            continue;
        }
        if start > pos {
            job.append(&text[pos..start], 0.0, plain.clone());
        }
        job.append(
            &text[start..end],
            0.0,
            TextFormat {
                font_id: font_id.clone(),
                color: style.resolve(theme),
                ..Default::default()
            },
        );
        pos = end;
    }
    if pos < text.len() {
        job.append(&text[pos..], 0.0, plain);
    }
    job.wrap.max_width = wrap_width;
    job
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// A builder for the console window
///
pub struct ConsoleBuilder {
    prompt: String,
    history_size: usize,
    scrollback_size: usize,
    theme: TerminalTheme,
    key_bindings: KeyBindings,
}

impl Default for ConsoleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleBuilder {
    /// Create a new console builder
    /// # Returns
    /// * `ConsoleBuilder` - the console builder
    ///
    pub fn new() -> Self {
        Self {
            prompt: ">> ".to_string(),
            history_size: 100,
            scrollback_size: 1000,
            theme: TerminalTheme::default(),
            key_bindings: KeyBindings::default(),
        }
    }

    /// Set the prompt for the console
    /// # Arguments
    /// * `prompt` - the prompt string
    ///
    /// # Returns
    /// * `ConsoleBuilder` - the console builder
    ///
    pub fn prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }

    /// Set the history size for the console
    /// # Arguments
    /// * `size` - the size of the history
    ///
    /// # Returns
    /// * `ConsoleBuilder` - the console builder
    ///
    pub fn history_size(mut self, size: usize) -> Self {
        self.history_size = size;
        self
    }

    /// Set the scrollback size for the console
    /// # Arguments
    /// * `size` - the size of the scrollback
    ///
    /// # Returns
    /// * `ConsoleBuilder` - the console builder
    ///
    pub fn scrollback_size(mut self, size: usize) -> Self {
        self.scrollback_size = size;
        self
    }

    /// Set the theme for the console
    pub fn theme(mut self, theme: TerminalTheme) -> Self {
        self.theme = theme;
        self
    }

    /// Set the keyboard shortcuts for execute, complete and close
    pub fn key_bindings(mut self, bindings: KeyBindings) -> Self {
        self.key_bindings = bindings;
        self
    }

    /// Build the console window
    /// # Returns
    /// * `ConsoleWindow` - the console window
    ///
    ///
    pub fn build(self) -> ConsoleWindow {
        let mut cons = ConsoleWindow::new(&self.prompt);
        cons.history_size = self.history_size;
        cons.scrollback_size = self.scrollback_size;
        cons.theme = self.theme;
        cons.bindings = self.key_bindings;
        cons
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn console() -> ConsoleWindow {
        let mut cons = ConsoleBuilder::new().prompt(">> ").build();
        cons.init_done = true;
        cons.draw_prompt();
        cons
    }

    fn submit(cons: &mut ConsoleWindow, line: &str) -> ConsoleEvent {
        cons.text.push_str(line);
        let (consumed, event) = cons.handle_key(&Key::Enter, Modifiers::NONE, 0);
        assert!(consumed);
        cons.prompt();
        event
    }

    fn press(cons: &mut ConsoleWindow, key: Key) {
        let cursor = cons.text.chars().count();
        cons.handle_key(&key, Modifiers::NONE, cursor);
    }

    #[test]
    fn submitted_line_is_returned_and_recorded() {
        let mut cons = console();
        let event = submit(&mut cons, "1 + 1");
        assert_eq!(event, ConsoleEvent::Submitted("1 + 1".to_string()));
        assert_eq!(cons.get_history(), vec!["1 + 1".to_string()]);
    }

    #[test]
    fn blank_submissions_are_not_recorded() {
        let mut cons = console();
        let event = submit(&mut cons, "   ");
        assert_eq!(event, ConsoleEvent::Submitted("   ".to_string()));
        assert!(cons.get_history().is_empty());
    }

    #[test]
    fn history_cap_drops_oldest_entries() {
        let mut cons = ConsoleBuilder::new().history_size(2).build();
        cons.init_done = true;
        cons.draw_prompt();
        for line in ["a", "b", "c"] {
            submit(&mut cons, line);
        }
        assert_eq!(cons.get_history(), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn history_recall_walks_previous_and_next() {
        let mut cons = console();
        submit(&mut cons, "a = 1");
        submit(&mut cons, "a + 1");

        press(&mut cons, Key::ArrowUp);
        assert_eq!(cons.get_last_line(), "a + 1");
        press(&mut cons, Key::ArrowUp);
        assert_eq!(cons.get_last_line(), "a = 1");
        press(&mut cons, Key::ArrowDown);
        assert_eq!(cons.get_last_line(), "a + 1");
    }

    #[test]
    fn recall_stops_at_oldest_entry() {
        let mut cons = console();
        submit(&mut cons, "only");
        press(&mut cons, Key::ArrowUp);
        press(&mut cons, Key::ArrowUp);
        assert_eq!(cons.get_last_line(), "only");
    }

    #[test]
    fn recall_preserves_in_progress_entry() {
        let mut cons = console();
        submit(&mut cons, "first");
        cons.text.push_str("draft");

        press(&mut cons, Key::ArrowUp);
        assert_eq!(cons.get_last_line(), "first");
        press(&mut cons, Key::ArrowDown);
        assert_eq!(cons.get_last_line(), "draft");
    }

    #[test]
    fn recall_does_not_mutate_history() {
        let mut cons = console();
        submit(&mut cons, "original");
        press(&mut cons, Key::ArrowUp);
        cons.text.push_str(" edited");
        let (_, event) = cons.handle_key(&Key::Enter, Modifiers::NONE, 0);
        assert_eq!(event, ConsoleEvent::Submitted("original edited".to_string()));
        assert_eq!(
            cons.get_history(),
            vec!["original".to_string(), "original edited".to_string()]
        );
    }

    #[test]
    fn escape_cancels_recall_and_restores_draft() {
        let mut cons = console();
        submit(&mut cons, "first");
        cons.text.push_str("draft");
        press(&mut cons, Key::ArrowUp);
        assert_eq!(cons.get_last_line(), "first");
        press(&mut cons, Key::Escape);
        assert_eq!(cons.get_last_line(), "draft");
    }

    #[test]
    fn close_binding_emits_close_requested() {
        let mut cons = console();
        let (consumed, event) = cons.handle_key(&Key::W, Modifiers::COMMAND, 0);
        assert!(consumed);
        assert_eq!(event, ConsoleEvent::CloseRequested);
    }

    #[test]
    fn tab_requests_completion_with_current_line() {
        let mut cons = console();
        cons.text.push_str("wind");
        let (consumed, event) = cons.handle_key(&Key::Tab, Modifiers::NONE, 0);
        assert!(consumed);
        assert_eq!(event, ConsoleEvent::CompletionRequested("wind".to_string()));
    }

    #[test]
    fn rebound_execute_key_is_honored() {
        let mut cons = ConsoleBuilder::new()
            .key_bindings(KeyBindings {
                execute: (Modifiers::COMMAND, Key::Enter),
                ..KeyBindings::default()
            })
            .build();
        cons.init_done = true;
        cons.draw_prompt();
        cons.text.push_str("x");

        let (_, event) = cons.handle_key(&Key::Enter, Modifiers::NONE, 0);
        assert_eq!(event, ConsoleEvent::None);
        let (_, event) = cons.handle_key(&Key::Enter, Modifiers::COMMAND, 0);
        assert_eq!(event, ConsoleEvent::Submitted("x".to_string()));
    }

    #[test]
    fn write_appends_on_a_fresh_line() {
        let mut cons = console();
        cons.text.push_str("1 + 1");
        cons.write("2");
        assert!(cons.text.ends_with(">> 1 + 1\n2"));
    }

    #[test]
    fn accept_completion_appends_suffix() {
        let mut cons = console();
        cons.text.push_str("wind");
        cons.accept_completion("ow");
        assert_eq!(cons.get_last_line(), "window");
    }

    #[test]
    fn candidate_listing_redraws_prompt_and_input() {
        let mut cons = console();
        cons.text.push_str("wi");
        cons.show_completion_candidates("wi", &["window".to_string(), "winner".to_string()]);
        assert!(cons.text.contains("window    winner"));
        assert_eq!(cons.get_last_line(), "wi");
    }

    #[test]
    fn scrollback_truncation_drops_oldest_lines_and_shifts_segments() {
        let mut cons = ConsoleBuilder::new().scrollback_size(3).build();
        cons.init_done = true;
        for i in 0..6 {
            cons.write_styled(StyledText::info(format!("line {i}")));
        }
        assert_eq!(cons.text.lines().count(), 3);
        assert!(cons.text.starts_with("line 3"));
        for (range, _) in &cons.styled_segments {
            assert!(range.end <= cons.text.len());
            assert!(cons.text.is_char_boundary(range.start));
        }
        assert_eq!(cons.styled_segments.len(), 3);
        assert_eq!(&cons.text[cons.styled_segments[0].0.clone()], "line 3");
    }

    #[test]
    fn loaded_history_is_recallable_and_clearable() {
        let mut cons = console();
        cons.load_history("first\nsecond".lines());
        assert_eq!(cons.get_history(), vec!["first".to_string(), "second".to_string()]);

        press(&mut cons, Key::ArrowUp);
        assert_eq!(cons.get_last_line(), "second");

        cons.clear_history();
        assert!(cons.get_history().is_empty());
    }

    #[test]
    fn clear_resets_buffer_and_segments() {
        let mut cons = console();
        cons.write_error("boom");
        cons.clear();
        assert!(cons.text.is_empty());
        assert!(cons.styled_segments.is_empty());
    }

    #[test]
    fn layout_colors_styled_segments() {
        let theme = TerminalTheme::default();
        let text = "plain\nerror";
        let segments = vec![(6..11, TextStyle::Error)];
        let job = layout_styled(text, &segments, &theme, &FontId::monospace(12.0), f32::INFINITY);
        assert_eq!(job.sections.len(), 2);
        assert_eq!(job.sections[0].format.color, theme.foreground);
        assert_eq!(job.sections[1].format.color, theme.error);
        assert_eq!(job.text, text);
    }
}
