//! egui front end: a URL form driving one [`ConversionController`].

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use eframe::{App, Frame, egui};
use rfd::FileDialog;
use tokio::sync::{mpsc::UnboundedReceiver, watch};
use tracing::{debug, warn};

use video_to_mp3::{
    Config, ConversionController, ConversionEvent, ConversionRequest, ConversionState, StartError,
    TaskHandle,
};

/// How long a status notice stays on screen.
const NOTICE_TTL: Duration = Duration::from_secs(4);

struct Notice {
    text: String,
    is_error: bool,
    shown_at: Instant,
}

/// User intents collected while drawing, applied after the frame is laid out.
enum Intent {
    Start,
    Cancel,
    Reset,
    OpenFolder(PathBuf),
}

/// Application state for the GUI
pub struct ConverterApp {
    controller: ConversionController,
    state_rx: watch::Receiver<ConversionState>,
    events_rx: UnboundedReceiver<ConversionEvent>,
    /// Input field for the video URL
    url_input: String,
    /// Destination folder for converted files
    output_dir: String,
    output_template: String,
    /// Handle of the latest run, used by the Cancel button
    handle: Option<TaskHandle>,
    /// Mirrors the controller's running indicator events
    is_converting: bool,
    notice: Option<Notice>,
}

impl ConverterApp {
    pub fn new(
        controller: ConversionController,
        events_rx: UnboundedReceiver<ConversionEvent>,
        config: &Config,
    ) -> Self {
        let state_rx = controller.subscribe();
        Self {
            controller,
            state_rx,
            events_rx,
            url_input: String::new(),
            output_dir: config.output_dir.display().to_string(),
            output_template: config.output_template.clone(),
            handle: None,
            is_converting: false,
            notice: None,
        }
    }

    fn notify(&mut self, text: impl Into<String>, is_error: bool) {
        self.notice = Some(Notice {
            text: text.into(),
            is_error,
            shown_at: Instant::now(),
        });
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            debug!(?event, "ui event");
            match event {
                ConversionEvent::Started { .. } => self.notify("Conversion started", false),
                ConversionEvent::RunningChanged(running) => self.is_converting = running,
                ConversionEvent::Completed(_) => self.notify("Conversion completed!", false),
                ConversionEvent::Cancelled => self.notify("Conversion cancelled", false),
                ConversionEvent::Failed(message) => self.notify(format!("Error: {message}"), true),
            }
        }
    }

    fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::Start => {
                let request = ConversionRequest::new(
                    self.url_input.clone(),
                    PathBuf::from(self.output_dir.trim()),
                    self.output_template.clone(),
                );
                match self.controller.retry(request) {
                    Ok(handle) => self.handle = Some(handle),
                    Err(StartError::EmptyInput) => {}
                    Err(err) => self.notify(err.to_string(), true),
                }
            }
            Intent::Cancel => {
                if let Some(handle) = &self.handle {
                    handle.cancel();
                }
            }
            Intent::Reset => {
                self.controller.reset();
                self.url_input.clear();
                self.handle = None;
            }
            Intent::OpenFolder(folder) => open_in_file_manager(&folder),
        }
    }

    fn draw_form(&mut self, ui: &mut egui::Ui, state: &ConversionState, intents: &mut Vec<Intent>) {
        let editable = !self.is_converting && !state.is_running();

        // URL input field
        ui.label("Video URL:");
        ui.add_enabled(
            editable,
            egui::TextEdit::singleline(&mut self.url_input)
                .hint_text("https://www.youtube.com/watch?v=…")
                .desired_width(f32::INFINITY),
        );

        // Folder selection
        ui.horizontal(|ui| {
            ui.label("Save to:");
            ui.add_enabled(editable, egui::TextEdit::singleline(&mut self.output_dir));
            if ui.add_enabled(editable, egui::Button::new("Browse…")).clicked() {
                if let Some(folder) = FileDialog::new().set_directory(&self.output_dir).pick_folder() {
                    self.output_dir = folder.display().to_string();
                }
            }
        });

        ui.add_space(12.0);

        if let ConversionState::Running(progress) = state {
            ui.label(format!("Converting... {}%", (progress * 100.0) as u32));
            ui.add(egui::ProgressBar::new(*progress).show_percentage());
            ui.add_space(12.0);
        }

        let can_start = editable
            && !matches!(state, ConversionState::Completed(_))
            && !self.url_input.trim().is_empty();
        let width = ui.available_width();
        if ui
            .add_enabled(can_start, egui::Button::new("Convert to MP3").min_size(egui::vec2(width, 32.0)))
            .clicked()
        {
            intents.push(Intent::Start);
        }

        if self.is_converting || state.is_running() {
            ui.add_space(8.0);
            let cancel = egui::Button::new("Cancel")
                .fill(egui::Color32::DARK_RED)
                .min_size(egui::vec2(width, 32.0));
            if ui.add(cancel).clicked() {
                intents.push(Intent::Cancel);
            }
        }
    }

    fn draw_result(&self, ui: &mut egui::Ui, state: &ConversionState, intents: &mut Vec<Intent>) {
        match state {
            ConversionState::Completed(path) => {
                ui.add_space(16.0);
                ui.group(|ui| {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string());
                    ui.label(format!("File ready: {name}"));
                    ui.small(format!("Saved to: {}", path.display()));
                    ui.add(egui::ProgressBar::new(1.0).show_percentage());
                    ui.horizontal(|ui| {
                        if ui.button("Open Folder").clicked() {
                            let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
                            intents.push(Intent::OpenFolder(folder));
                        }
                        if ui.button("Convert Another").clicked() {
                            intents.push(Intent::Reset);
                        }
                    });
                });
            }
            ConversionState::Failed(message) => {
                ui.add_space(16.0);
                ui.colored_label(egui::Color32::LIGHT_RED, format!("Conversion failed: {message}"));
                if ui.button("Try Again").clicked() {
                    intents.push(Intent::Start);
                }
            }
            ConversionState::Cancelled => {
                ui.add_space(16.0);
                ui.label("Conversion cancelled.");
                if ui.button("Try Again").clicked() {
                    intents.push(Intent::Start);
                }
            }
            ConversionState::Idle | ConversionState::Running(_) => {}
        }
    }

    fn draw_notice(&mut self, ui: &mut egui::Ui) {
        if self
            .notice
            .as_ref()
            .is_some_and(|n| n.shown_at.elapsed() > NOTICE_TTL)
        {
            self.notice = None;
        }
        if let Some(notice) = &self.notice {
            ui.add_space(12.0);
            let color = if notice.is_error {
                egui::Color32::LIGHT_RED
            } else {
                egui::Color32::LIGHT_GREEN
            };
            ui.colored_label(color, &notice.text);
        }
    }
}

/// GUI update loop: called each frame to redraw and handle interactions
impl App for ConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.drain_events();
        let state = self.state_rx.borrow_and_update().clone();
        let mut intents = Vec::new();

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
                ui.vertical_centered(|ui| ui.heading("Video to MP3 Converter"));
                ui.add_space(16.0);
                self.draw_form(ui, &state, &mut intents);
                self.draw_result(ui, &state, &mut intents);
                self.draw_notice(ui);
            });
        });

        for intent in intents {
            self.apply(intent);
        }

        // Request periodic repaint for progress updates
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

fn open_in_file_manager(folder: &Path) {
    let folder = folder.to_path_buf();
    std::thread::spawn(move || {
        #[cfg(target_os = "windows")]
        let opener = "explorer";
        #[cfg(target_os = "macos")]
        let opener = "open";
        #[cfg(all(unix, not(target_os = "macos")))]
        let opener = "xdg-open";

        if let Err(err) = std::process::Command::new(opener).arg(&folder).spawn() {
            warn!(error = %err, folder = %folder.display(), "could not open folder");
        }
    });
}
