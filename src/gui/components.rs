// Reusable UI components
// Option rows, status line and the run log

use eframe::egui;

use super::form::tooltip;

/// Outcome of the last action, shown next to the buttons.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Success(String),
    Failed(String),
}

/// Render the status line with colored text
/// Colors: Idle (gray), Success (green), Failed (red)
pub fn status_line(ui: &mut egui::Ui, status: &RunStatus) {
    match status {
        RunStatus::Idle => {
            ui.colored_label(egui::Color32::GRAY, "Ready");
        }
        RunStatus::Success(msg) => {
            ui.colored_label(egui::Color32::from_rgb(0, 180, 0), msg);
        }
        RunStatus::Failed(msg) => {
            ui.colored_label(egui::Color32::from_rgb(220, 0, 0), msg);
        }
    }
}

/// Option name in the first grid column, with its help text on hover
pub fn option_label(ui: &mut egui::Ui, key: &str) {
    let help = tooltip(key);
    let label = ui.label(key);
    if !help.is_empty() {
        label.on_hover_text(help);
    }
}

/// Folder path editor with a marker telling whether the folder exists
pub fn folder_field(ui: &mut egui::Ui, value: &mut String) {
    ui.horizontal(|ui| {
        ui.add(egui::TextEdit::singleline(value).desired_width(280.0));
        if std::path::Path::new(value.trim()).is_dir() {
            ui.colored_label(egui::Color32::from_rgb(0, 180, 0), "✔")
                .on_hover_text("Folder exists");
        } else {
            ui.colored_label(egui::Color32::from_rgb(220, 180, 0), "?")
                .on_hover_text("Folder not found (the output folder is created on Run)");
        }
    });
}

/// Combo box over a fixed set of enum values
pub fn choice<T: Copy + PartialEq>(
    ui: &mut egui::Ui,
    id: &str,
    value: &mut T,
    options: &[T],
    label: fn(T) -> &'static str,
) {
    egui::ComboBox::from_id_source(id)
        .selected_text(label(*value))
        .show_ui(ui, |ui| {
            for option in options {
                ui.selectable_value(value, *option, label(*option));
            }
        });
}

/// Run log display area
/// Provides a scrollable text area for messages from conversion runs
pub struct LogPanel {
    /// Buffer of output lines
    lines: Vec<String>,
    /// Maximum number of lines to keep (0 = unlimited)
    max_lines: usize,
}

impl LogPanel {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: Vec::new(),
            max_lines,
        }
    }

    pub fn add_line(&mut self, line: String) {
        self.lines.push(line);
        if self.max_lines > 0 && self.lines.len() > self.max_lines {
            self.lines.remove(0);
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Render the log in a scrollable area
    pub fn render(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(egui::RichText::new("Log").heading());
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("Clear").clicked() {
                    self.clear();
                }
            });
        });
        ui.separator();

        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.lines {
                    ui.label(
                        egui::RichText::new(line)
                            .size(12.0)
                            .family(egui::FontFamily::Monospace),
                    );
                }
            });
    }
}

impl Default for LogPanel {
    fn default() -> Self {
        Self::new(500)
    }
}
