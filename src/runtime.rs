//! The embedded Koto interpreter and session namespace
//!
//! Evaluation is synchronous on the calling thread; user-code failures are
//! captured into [`EvalOutcome`] rather than returned as errors.

use std::sync::{Arc, Mutex};

use koto::{CompileArgs, Koto, KotoSettings};
use koto_runtime::{CallContext, KMap, KValue};
use thiserror::Error;

/// The namespace name the most recent non-null result is bound to
///
/// Koto reserves `_` as a wildcard, so the conventional REPL name is not
/// available; `ans` is used instead.
pub const LAST_RESULT_NAME: &str = "ans";

// Reserved words, rejected as binding names.
const KOTO_KEYWORDS: &[&str] = &[
    "and", "break", "catch", "continue", "debug", "else", "export", "false", "finally", "for",
    "from", "if", "import", "in", "loop", "match", "not", "null", "or", "return", "self", "switch",
    "then", "throw", "true", "try", "until", "while", "yield",
];

/// Errors surfaced to the embedding host
///
/// User-code evaluation failures are not errors at this level; they are
/// captured into [`EvalOutcome::error`] and the session continues.
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// The host tried to bind a name that is not a Koto identifier
    #[error("invalid binding name '{0}': not a Koto identifier")]
    InvalidName(String),
}

/// Commands user scripts can send to the console widget
#[derive(Debug, Clone)]
pub enum ConsoleCommand {
    /// Write a styled line to the console buffer
    WriteLine {
        /// The text to write
        text: String,
        /// One of "info", "success", "warning", "error", or "" for plain text
        style: String,
    },
    /// Clear the console buffer
    Clear,
}

/// Output captured while a fragment runs
#[derive(Debug, Default)]
struct ConsoleContext {
    output: Vec<String>,
    commands: Vec<ConsoleCommand>,
}

/// The result of evaluating one submitted fragment
#[derive(Debug, Default)]
pub struct EvalOutcome {
    /// Lines captured from `print` and the `console` module, in emission order
    pub printed: Vec<String>,
    /// Rendering of the fragment's result, when it was non-null
    pub value: Option<String>,
    /// Formatted error report when compilation or execution failed
    pub error: Option<String>,
    /// Widget commands issued by user code
    pub commands: Vec<ConsoleCommand>,
}

/// The embedded Koto interpreter plus the session namespace
///
/// Top-level assignments in submitted fragments are exported, so the exports
/// map doubles as the session namespace: host bindings, user assignments and
/// the [`LAST_RESULT_NAME`] binding all live there and persist until the
/// runtime is dropped. Evaluation is synchronous on the calling thread.
pub struct EvalRuntime {
    koto: Koto,
    context: Arc<Mutex<ConsoleContext>>,
}

impl Default for EvalRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EvalRuntime {
    /// Create a runtime with an empty namespace
    pub fn new() -> Self {
        let context = Arc::new(Mutex::new(ConsoleContext::default()));

        let koto = Koto::with_settings(KotoSettings {
            ..Default::default()
        });

        // route print into the capture buffer
        {
            let context = context.clone();
            koto.prelude().add_fn("print", move |ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
                let line = join_args(ctx.args());
                context.lock().unwrap().output.push(line);
                Ok(KValue::Null)
            });
        }

        let console_module = create_console_module(context.clone());
        koto.prelude().insert("console", console_module);

        Self { koto, context }
    }

    /// Insert a host object into the namespace
    /// # Arguments
    /// * `name` - the identifier user code will refer to the object by
    /// * `value` - the object
    ///
    /// Rejecting a malformed name here is deliberate: it is a programming
    /// error in the embedding host, not a runtime condition to recover from.
    pub fn bind(&mut self, name: &str, value: impl Into<KValue>) -> Result<(), ConsoleError> {
        if !is_valid_identifier(name) {
            return Err(ConsoleError::InvalidName(name.to_string()));
        }
        self.koto.exports().insert(name, value);
        Ok(())
    }

    /// Evaluate a source fragment against the namespace
    ///
    /// Runs synchronously on the calling thread. A non-null result is
    /// rendered and bound to [`LAST_RESULT_NAME`]. Errors are captured into
    /// the outcome, never propagated; bindings made by earlier statements of
    /// a fragment that fails partway are retained.
    pub fn eval(&mut self, code: &str) -> EvalOutcome {
        {
            let mut context = self.context.lock().unwrap();
            context.output.clear();
            context.commands.clear();
        }

        let mut outcome = EvalOutcome::default();
        match self
            .koto
            .compile_and_run(CompileArgs::new(code).export_top_level_ids(true))
        {
            Ok(KValue::Null) => {}
            Ok(value) => {
                let rendered = self
                    .koto
                    .value_to_string(value.clone())
                    .unwrap_or_else(|_| render_value(&value));
                self.koto.exports().insert(LAST_RESULT_NAME, value);
                outcome.value = Some(rendered);
            }
            Err(err) => outcome.error = Some(err.to_string()),
        }

        // drain captured output even when the fragment failed partway
        let mut context = self.context.lock().unwrap();
        outcome.printed = std::mem::take(&mut context.output);
        outcome.commands = std::mem::take(&mut context.commands);
        outcome
    }

    /// Names resolvable at the root of the namespace
    ///
    /// Exports first (host bindings and user assignments), then the prelude.
    pub fn root_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .koto
            .exports()
            .data()
            .keys()
            .map(|key| key.to_string())
            .collect();
        names.extend(self.koto.prelude().data().keys().map(|key| key.to_string()));
        names
    }

    /// Attribute names reachable under a resolved dotted path
    ///
    /// Maps expose their own keys, in declaration order; primitive values
    /// expose the method names of their core-library module. An unresolvable
    /// path yields no candidates.
    pub fn attr_names(&self, path: &[String]) -> Vec<String> {
        match self.resolve_path(path) {
            Some(KValue::Map(map)) => map.data().keys().map(|key| key.to_string()).collect(),
            Some(value) => self.core_module_keys(&value),
            None => Vec::new(),
        }
    }

    fn resolve_path(&self, path: &[String]) -> Option<KValue> {
        let (first, rest) = path.split_first()?;
        let mut value = self
            .koto
            .exports()
            .get(first.as_str())
            .or_else(|| self.koto.prelude().get(first.as_str()))?;
        for segment in rest {
            value = match value {
                KValue::Map(map) => map.get(segment.as_str())?,
                _ => return None,
            };
        }
        Some(value)
    }

    fn core_module_keys(&self, value: &KValue) -> Vec<String> {
        let module = match value {
            KValue::Str(_) => "string",
            KValue::List(_) => "list",
            KValue::Tuple(_) => "tuple",
            KValue::Number(_) => "number",
            KValue::Range(_) => "range",
            KValue::Iterator(_) => "iterator",
            _ => return Vec::new(),
        };
        match self.koto.prelude().get(module) {
            Some(KValue::Map(map)) => map.data().keys().map(|key| key.to_string()).collect(),
            _ => Vec::new(),
        }
    }
}

impl crate::completion::NamespaceView for EvalRuntime {
    fn root_names(&self) -> Vec<String> {
        self.root_names()
    }

    fn attr_names(&self, path: &[String]) -> Vec<String> {
        self.attr_names(path)
    }
}

/// Create the `console` module user scripts use to talk to the widget
fn create_console_module(context: Arc<Mutex<ConsoleContext>>) -> KValue {
    let module = KMap::new();

    {
        let context = context.clone();
        module.add_fn("clear", move |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            context.lock().unwrap().commands.push(ConsoleCommand::Clear);
            Ok(KValue::Null)
        });
    }

    {
        let context = context.clone();
        module.add_fn("write", move |ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            let text = join_args(ctx.args());
            context.lock().unwrap().commands.push(ConsoleCommand::WriteLine {
                text,
                style: String::new(),
            });
            Ok(KValue::Null)
        });
    }

    for style in ["info", "success", "warning", "error"] {
        let context = context.clone();
        module.add_fn(style, move |ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            let text = join_args(ctx.args());
            context.lock().unwrap().commands.push(ConsoleCommand::WriteLine {
                text,
                style: style.to_string(),
            });
            Ok(KValue::Null)
        });
    }

    KValue::Map(module)
}

fn join_args(args: &[KValue]) -> String {
    args.iter().map(render_value).collect::<Vec<_>>().join(" ")
}

/// Convert a KValue to a display string without going through the vm
fn render_value(value: &KValue) -> String {
    match value {
        KValue::Null => "null".to_string(),
        KValue::Bool(b) => b.to_string(),
        KValue::Number(n) => n.to_string(),
        KValue::Str(s) => s.to_string(),
        KValue::List(list) => {
            let items: Vec<String> = list.data().iter().map(render_value).collect();
            format!("[{}]", items.join(", "))
        }
        KValue::Map(map) => {
            let items: Vec<String> = map
                .data()
                .iter()
                .map(|(key, value)| format!("{}: {}", key, render_value(value)))
                .collect();
            format!("{{{}}}", items.join(", "))
        }
        _ => format!("{value:?}"),
    }
}

fn is_valid_identifier(name: &str) -> bool {
    match name.chars().next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    if !name.chars().skip(1).all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    !KOTO_KEYWORDS.contains(&name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_map() -> KMap {
        let window = KMap::new();
        window.add_fn("show", |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            Ok(KValue::Bool(true))
        });
        window.add_fn("hide", |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            Ok(KValue::Bool(false))
        });
        window
    }

    #[test]
    fn expression_result_is_rendered_and_bound() {
        let mut rt = EvalRuntime::new();
        let outcome = rt.eval("2 + 2");
        assert_eq!(outcome.value.as_deref(), Some("4"));
        assert!(outcome.error.is_none());

        let outcome = rt.eval("ans");
        assert_eq!(outcome.value.as_deref(), Some("4"));
    }

    #[test]
    fn null_results_display_nothing() {
        let mut rt = EvalRuntime::new();
        let outcome = rt.eval("x = 5\nnull");
        assert_eq!(outcome.value, None);
        assert!(outcome.error.is_none());

        let outcome = rt.eval("x");
        assert_eq!(outcome.value.as_deref(), Some("5"));
    }

    #[test]
    fn assignments_persist_across_submissions() {
        let mut rt = EvalRuntime::new();
        rt.eval("a = 1");
        let outcome = rt.eval("a + 1");
        assert_eq!(outcome.value.as_deref(), Some("2"));
    }

    #[test]
    fn host_bindings_are_visible_to_user_code() {
        let mut rt = EvalRuntime::new();
        rt.bind("greeting", KValue::Str("hello".into())).unwrap();
        let outcome = rt.eval("greeting");
        assert!(outcome.value.unwrap().contains("hello"));
    }

    #[test]
    fn errors_are_captured_and_bindings_survive() {
        let mut rt = EvalRuntime::new();
        rt.eval("a = 1");
        let outcome = rt.eval("no_such_function()");
        assert!(outcome.error.is_some());

        let outcome = rt.eval("a");
        assert_eq!(outcome.value.as_deref(), Some("1"));
    }

    #[test]
    fn partial_side_effects_are_retained() {
        let mut rt = EvalRuntime::new();
        let outcome = rt.eval("b = 1\nthrow 'bang'");
        assert!(outcome.error.is_some());

        let outcome = rt.eval("b");
        assert_eq!(outcome.value.as_deref(), Some("1"));
    }

    #[test]
    fn last_result_is_not_clobbered_by_failures() {
        let mut rt = EvalRuntime::new();
        rt.eval("2 + 2");
        rt.eval("no_such_function()");
        let outcome = rt.eval("ans");
        assert_eq!(outcome.value.as_deref(), Some("4"));
    }

    #[test]
    fn print_output_is_captured() {
        let mut rt = EvalRuntime::new();
        let outcome = rt.eval("print 'hi'");
        assert_eq!(outcome.printed, vec!["hi".to_string()]);
        assert_eq!(outcome.value, None);
    }

    #[test]
    fn print_output_survives_a_later_error() {
        let mut rt = EvalRuntime::new();
        let outcome = rt.eval("print 'before'\nthrow 'bang'");
        assert_eq!(outcome.printed, vec!["before".to_string()]);
        assert!(outcome.error.is_some());
    }

    #[test]
    fn console_module_issues_commands() {
        let mut rt = EvalRuntime::new();
        let outcome = rt.eval("console.error 'bad'\nconsole.clear()");
        assert_eq!(outcome.commands.len(), 2);
        assert!(matches!(
            &outcome.commands[0],
            ConsoleCommand::WriteLine { text, style } if text == "bad" && style == "error"
        ));
        assert!(matches!(outcome.commands[1], ConsoleCommand::Clear));
    }

    #[test]
    fn invalid_binding_names_are_rejected() {
        let mut rt = EvalRuntime::new();
        assert!(matches!(
            rt.bind("not a name", KValue::Null),
            Err(ConsoleError::InvalidName(_))
        ));
        assert!(rt.bind("", KValue::Null).is_err());
        assert!(rt.bind("9lives", KValue::Null).is_err());
        assert!(rt.bind("match", KValue::Null).is_err());
        assert!(rt.bind("window", KValue::Null).is_ok());
    }

    #[test]
    fn root_names_cover_bindings_and_prelude() {
        let mut rt = EvalRuntime::new();
        rt.bind("window", KValue::Map(window_map())).unwrap();
        let names = rt.root_names();
        assert!(names.iter().any(|n| n == "window"));
        assert!(names.iter().any(|n| n == "string"));
        assert!(names.iter().any(|n| n == "console"));
    }

    #[test]
    fn map_attributes_list_own_keys_in_declaration_order() {
        let mut rt = EvalRuntime::new();
        rt.bind("window", KValue::Map(window_map())).unwrap();
        assert_eq!(
            rt.attr_names(&["window".to_string()]),
            vec!["show".to_string(), "hide".to_string()]
        );
    }

    #[test]
    fn unresolvable_paths_yield_no_candidates() {
        let rt = EvalRuntime::new();
        assert!(rt.attr_names(&["nope".to_string()]).is_empty());
        assert!(rt
            .attr_names(&["string".to_string(), "missing".to_string()])
            .is_empty());
    }

    #[test]
    fn primitive_values_expose_core_module_methods() {
        let mut rt = EvalRuntime::new();
        rt.bind("title", KValue::Str("main".into())).unwrap();
        let names = rt.attr_names(&["title".to_string()]);
        assert!(names.iter().any(|n| n == "to_uppercase"));
    }
}
