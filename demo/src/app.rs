use std::sync::{Arc, Mutex};

use egui_devconsole::{ConsoleBuilder, ScriptConsole};
use koto_runtime::{CallContext, KMap, KValue};

/// Commands user scripts send back to the host application
enum AppCommand {
    Dark,
    Light,
    Quit,
}

/// Live application state shared with the console namespace
#[derive(Default)]
struct SharedState {
    label: String,
    value: f32,
    commands: Vec<AppCommand>,
}

/// We derive Deserialize/Serialize so we can persist app state on shutdown.
/// The console itself is deliberately not persisted: its namespace, history
/// and scrollback live only as long as the process.
#[cfg_attr(feature = "persistence", derive(serde::Deserialize, serde::Serialize))]
#[cfg_attr(feature = "persistence", serde(default))] // if we add new fields, give them default values when deserializing old state
pub struct ConsoleDemo {
    label: String,
    #[cfg_attr(feature = "persistence", serde(skip))]
    value: f32,
    #[cfg_attr(feature = "persistence", serde(skip))]
    shared: Arc<Mutex<SharedState>>,
    #[cfg_attr(feature = "persistence", serde(skip))]
    console: ScriptConsole,
}

impl Default for ConsoleDemo {
    fn default() -> Self {
        let shared = Arc::new(Mutex::new(SharedState {
            label: "Hello World!".to_owned(),
            value: 2.7,
            commands: Vec::new(),
        }));
        let console = build_console(&shared);

        Self {
            label: "Hello World!".to_owned(),
            value: 2.7,
            shared,
            console,
        }
    }
}

impl ConsoleDemo {
    /// Called once before the first frame.
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        // Load previous app state (if any).
        // Note that you must enable the `persistence` feature for this to work.
        #[cfg(feature = "persistence")]
        let mut app: Self = if let Some(storage) = cc.storage {
            eframe::get_value(storage, eframe::APP_KEY).unwrap_or_default()
        } else {
            Self::default()
        };

        #[cfg(not(feature = "persistence"))]
        let mut app = Self::default();

        // the console is never persisted; rebuild it against the restored state
        app.shared = Arc::new(Mutex::new(SharedState {
            label: app.label.clone(),
            value: app.value,
            commands: Vec::new(),
        }));
        app.console = build_console(&app.shared);

        log::info!("demo started; press F12 for the console");
        app
    }
}

/// Build the console and seed its namespace with the live `app` object.
fn build_console(shared: &Arc<Mutex<SharedState>>) -> ScriptConsole {
    let mut console =
        ScriptConsole::from_builder(ConsoleBuilder::new().prompt(">> ").history_size(100))
            .title("Application Console");

    let app = KMap::new();
    {
        let shared = shared.clone();
        app.add_fn("label", move |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            Ok(KValue::Str(shared.lock().unwrap().label.as_str().into()))
        });
    }
    {
        let shared = shared.clone();
        app.add_fn("set_label", move |ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            if let Some(KValue::Str(text)) = ctx.args().first() {
                shared.lock().unwrap().label = text.to_string();
            }
            Ok(KValue::Null)
        });
    }
    {
        let shared = shared.clone();
        app.add_fn("value", move |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            let value = shared.lock().unwrap().value as f64;
            Ok(KValue::Number(value.into()))
        });
    }
    {
        let shared = shared.clone();
        app.add_fn("set_value", move |ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            if let Some(KValue::Number(number)) = ctx.args().first() {
                shared.lock().unwrap().value = f64::from(number) as f32;
            }
            Ok(KValue::Null)
        });
    }
    {
        let shared = shared.clone();
        app.add_fn("dark", move |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            shared.lock().unwrap().commands.push(AppCommand::Dark);
            Ok(KValue::Null)
        });
    }
    {
        let shared = shared.clone();
        app.add_fn("light", move |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            shared.lock().unwrap().commands.push(AppCommand::Light);
            Ok(KValue::Null)
        });
    }
    {
        let shared = shared.clone();
        app.add_fn("quit", move |_ctx: &mut CallContext| -> koto_runtime::Result<KValue> {
            shared.lock().unwrap().commands.push(AppCommand::Quit);
            Ok(KValue::Null)
        });
    }

    console
        .bind("app", KValue::Map(app))
        .expect("'app' is a valid binding name");
    console
        .bind("version", KValue::Str(env!("CARGO_PKG_VERSION").into()))
        .expect("'version' is a valid binding name");

    console.console_mut().write(
        "The `app` object is live: try `app.label()`, `app.set_label 'hi'`, `app.dark()`.",
    );

    console
}

impl eframe::App for ConsoleDemo {
    /// Called by the frame work to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        #[cfg(feature = "persistence")]
        {
            self.label = self.shared.lock().unwrap().label.clone();
            eframe::set_value(storage, eframe::APP_KEY, self);
        }
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // F12 toggles the console from anywhere in the app
        if ctx.input_mut(|input| input.consume_key(egui::Modifiers::NONE, egui::Key::F12)) {
            self.console.toggle_visibility();
            if self.console.is_visible() {
                log::debug!("console shown");
            }
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.menu_button("View", |ui| {
                    if ui.button("Console (F12)").clicked() {
                        self.console.toggle_visibility();
                        ui.close_menu();
                    }
                });
            });
        });

        let (mut label, mut value) = {
            let shared = self.shared.lock().unwrap();
            (shared.label.clone(), shared.value)
        };

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("egui_devconsole demo");
            ui.horizontal(|ui| {
                ui.label("Label: ");
                ui.text_edit_singleline(&mut label);
            });
            ui.add(egui::Slider::new(&mut value, 0.0..=10.0).text("value"));
            ui.separator();
            ui.label("Press F12 to toggle the console. Scripts see this window as `app`.");
        });

        {
            let mut shared = self.shared.lock().unwrap();
            shared.label = label.clone();
            shared.value = value;
            for command in shared.commands.drain(..) {
                match command {
                    AppCommand::Dark => ctx.set_visuals(egui::Visuals::dark()),
                    AppCommand::Light => ctx.set_visuals(egui::Visuals::light()),
                    AppCommand::Quit => ctx.send_viewport_cmd(egui::ViewportCommand::Close),
                }
            }
        }
        self.label = label;
        self.value = value;

        self.console.draw_window(ctx);
    }
}
