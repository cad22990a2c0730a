// Settings window
// One row per export option, Run and Reset buttons, and the run log

use eframe::egui;
use tracing::{error, info};

use super::components::{LogPanel, RunStatus, choice, folder_field, option_label, status_line};
use super::form::ConfigForm;
use crate::config::{BranchMode, ConfigStore, FilenameStyle, ImageMode, TimestampZone};
use crate::export;

/// Main application struct
/// Owns the persisted settings and the form being edited
pub struct ConverterApp {
    store: ConfigStore,
    form: ConfigForm,
    status: RunStatus,
    log: LogPanel,
}

impl ConverterApp {
    pub fn new(store: ConfigStore) -> Self {
        let mut log = LogPanel::default();
        let form = match store.load() {
            Ok(config) => ConfigForm::from_config(&config),
            Err(e) => {
                log.add_line(format!("Could not load settings, using defaults: {:#}", e));
                ConfigForm::default()
            }
        };
        log.add_line(format!("Settings file: {}", store.path().display()));
        Self {
            store,
            form,
            status: RunStatus::Idle,
            log,
        }
    }

    /// Save the form, then convert synchronously
    pub fn run(&mut self) {
        let config = self.form.to_config();
        if let Err(e) = self.store.save(&config) {
            self.fail(format!("Failed to save settings: {:#}", e));
            return;
        }

        let mut run_config = config;
        run_config.quiet = true;
        self.log.add_line(format!(
            "Converting {} -> {}",
            run_config.input_directory.display(),
            run_config.output_directory.display()
        ));
        match export::execute(&run_config) {
            Ok(summary) => {
                info!(%summary, "Conversion completed");
                self.log.add_line(format!("Done. {}", summary));
                self.status = RunStatus::Success("Conversion completed successfully.".into());
            }
            Err(e) => {
                error!("Conversion failed: {:#}", e);
                self.fail(format!("Conversion failed: {:#}", e));
            }
        }
    }

    /// Drop the saved settings and show the defaults again
    pub fn reset(&mut self) {
        match self.store.reset() {
            Ok(defaults) => {
                self.form = ConfigForm::from_config(&defaults);
                self.status = RunStatus::Idle;
                self.log.add_line("Settings reset to defaults.".into());
            }
            Err(e) => self.fail(format!("Failed to reset settings: {:#}", e)),
        }
    }

    fn fail(&mut self, message: String) {
        self.log.add_line(message.clone());
        self.status = RunStatus::Failed(message);
    }

    fn render_form(&mut self, ui: &mut egui::Ui) {
        let form = &mut self.form;
        egui::Grid::new("settings_grid")
            .num_columns(2)
            .spacing([16.0, 6.0])
            .striped(true)
            .show(ui, |ui| {
                option_label(ui, "user_name");
                ui.text_edit_singleline(&mut form.config.user_name);
                ui.end_row();

                option_label(ui, "llm_name");
                ui.text_edit_singleline(&mut form.config.llm_name);
                ui.end_row();

                option_label(ui, "input_directory");
                folder_field(ui, &mut form.input_directory);
                ui.end_row();

                option_label(ui, "output_directory");
                folder_field(ui, &mut form.output_directory);
                ui.end_row();

                option_label(ui, "date_format");
                ui.text_edit_singleline(&mut form.config.date_format);
                ui.end_row();

                option_label(ui, "time_format");
                ui.text_edit_singleline(&mut form.config.time_format);
                ui.end_row();

                for (key, value) in [
                    ("include_date", &mut form.config.include_date),
                    ("include_timestamps", &mut form.config.include_timestamps),
                    ("prefix_date_in_filename", &mut form.config.prefix_date_in_filename),
                    ("convert_latex_syntax", &mut form.config.convert_latex_syntax),
                    ("skip_empty_messages", &mut form.config.skip_empty_messages),
                    ("collapse_long_messages", &mut form.config.collapse_long_messages),
                    ("collapse_open_by_default", &mut form.config.collapse_open_by_default),
                    ("obsidian_front_matter", &mut form.config.obsidian_front_matter),
                    ("label_authors", &mut form.config.label_authors),
                ] {
                    option_label(ui, key);
                    ui.checkbox(value, "");
                    ui.end_row();
                }

                option_label(ui, "long_message_line_threshold");
                ui.add(egui::TextEdit::singleline(&mut form.threshold).desired_width(60.0));
                ui.end_row();

                option_label(ui, "message_separator");
                ui.add(
                    egui::TextEdit::multiline(&mut form.separator)
                        .desired_rows(2)
                        .desired_width(280.0)
                        .font(egui::TextStyle::Monospace),
                );
                ui.end_row();

                option_label(ui, "image_mode");
                choice(ui, "image_mode", &mut form.config.image_mode, &ImageMode::ALL, ImageMode::label);
                ui.end_row();

                option_label(ui, "image_width");
                ui.add(egui::TextEdit::singleline(&mut form.image_width).desired_width(60.0));
                ui.end_row();

                option_label(ui, "branch");
                choice(ui, "branch", &mut form.config.branch, &BranchMode::ALL, BranchMode::label);
                ui.end_row();

                option_label(ui, "timezone");
                choice(ui, "timezone", &mut form.config.timezone, &TimestampZone::ALL, TimestampZone::label);
                ui.end_row();

                option_label(ui, "filename_style");
                choice(
                    ui,
                    "filename_style",
                    &mut form.config.filename_style,
                    &FilenameStyle::ALL,
                    FilenameStyle::label,
                );
                ui.end_row();

                option_label(ui, "tags");
                ui.text_edit_singleline(&mut form.tags);
                ui.end_row();
            });
    }
}

impl eframe::App for ConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::TopBottomPanel::bottom("run_log")
            .resizable(true)
            .default_height(140.0)
            .show(ctx, |ui| {
                self.log.render(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("ChatGPT Markdown Export");
            ui.add_space(8.0);

            egui::ScrollArea::vertical()
                .id_source("settings_scroll")
                .auto_shrink([false, true])
                .max_height((ui.available_height() - 48.0).max(120.0))
                .show(ui, |ui| self.render_form(ui));

            ui.add_space(8.0);
            ui.separator();
            ui.horizontal(|ui| {
                if ui.button(egui::RichText::new("▶ Run").strong()).clicked() {
                    self.run();
                }
                if ui.button("Reset to Defaults").clicked() {
                    self.reset();
                }
                ui.add_space(8.0);
                status_line(ui, &self.status);
            });
        });
    }
}
