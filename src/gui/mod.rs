// GUI module
// Settings window for configuring and running a conversion

pub mod app;
pub mod components;
pub mod form;

use eframe::egui;
use eyre::{Result, eyre};

pub use app::ConverterApp;
pub use form::ConfigForm;

use crate::config::ConfigStore;

/// Open the settings window and block until it is closed.
pub fn launch(store: ConfigStore) -> Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ChatGPT Markdown Export")
            .with_inner_size([640.0, 820.0])
            .with_min_inner_size([480.0, 480.0]),
        ..Default::default()
    };

    eframe::run_native(
        "ChatGPT Markdown Export",
        options,
        Box::new(move |_cc| Box::new(ConverterApp::new(store))),
    )
    .map_err(|e| eyre!("GUI failed: {}", e))
}
