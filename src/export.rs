use eyre::{Context, Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use tracing::{debug, info, warn};

use crate::assets::ImageSink;
use crate::config::ExportConfig;
use crate::importer::{self, Conversation};
use crate::renderer::{self, RenderContext};
use crate::utils::{self, FilenameRegistry, parse_existing_frontmatter};

/// Name of the conversation archive inside the export folder.
pub const CONVERSATIONS_FILE: &str = "conversations.json";

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: usize,
    /// Already exported from data at least as new; left untouched.
    pub unchanged: usize,
    /// Entries that were not conversations or had no messages.
    pub skipped: usize,
    pub images: usize,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} written, {} unchanged, {} skipped, {} image(s).",
            self.written, self.unchanged, self.skipped, self.images
        )
    }
}

#[derive(Clone, Copy)]
enum ProcessResult {
    Written { images: usize },
    Unchanged,
    Empty,
}

/// The main entry point for the business logic.
/// Reads `conversations.json` from the input folder and writes one Markdown file per
/// conversation to the output folder. Any I/O failure or malformed JSON aborts the run.
pub fn execute(config: &ExportConfig) -> Result<ExportSummary> {
    config.validate()?;

    let input_dir = &config.input_directory;
    if !input_dir.is_dir() {
        return Err(eyre!("Input folder not found: {}", input_dir.display()));
    }
    let archive = input_dir.join(CONVERSATIONS_FILE);
    let raw = fs::read(&archive)
        .wrap_err_with(|| format!("Failed to read export: {}", archive.display()))?;
    let entries: Vec<Value> = serde_json::from_slice(&raw)
        .wrap_err_with(|| format!("Failed to parse export: {}", archive.display()))?;

    fs::create_dir_all(&config.output_directory).wrap_err_with(|| {
        format!(
            "Failed to create output directory: {}",
            config.output_directory.display()
        )
    })?;

    info!(
        conversations = entries.len(),
        input = %input_dir.display(),
        output = %config.output_directory.display(),
        "Starting export"
    );

    let pb = if config.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(entries.len() as u64);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
            )
            .wrap_err("Invalid progress bar template")?
            .progress_chars("=>-"),
        );
        bar.println(format!("Found {} conversations.", entries.len()));
        bar
    };

    let mut registry = FilenameRegistry::default();
    let mut summary = ExportSummary::default();

    for (index, entry) in entries.into_iter().enumerate() {
        pb.inc(1);
        if !entry.is_object() {
            warn!(index, "Skipping entry that is not a conversation object");
            summary.skipped += 1;
            continue;
        }
        let conversation: Conversation = match serde_json::from_value(entry) {
            Ok(c) => c,
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed conversation");
                summary.skipped += 1;
                continue;
            }
        };

        match export_conversation(&conversation, config, &mut registry, &pb)? {
            ProcessResult::Written { images } => {
                summary.written += 1;
                summary.images += images;
            }
            ProcessResult::Unchanged => summary.unchanged += 1,
            ProcessResult::Empty => summary.skipped += 1,
        }
    }

    pb.finish_and_clear();

    info!(%summary, "Export finished");
    if !config.quiet {
        eprintln!(
            "Done. {} Files are in: {}",
            summary,
            config.output_directory.display()
        );
    }

    Ok(summary)
}

fn export_conversation(
    conversation: &Conversation,
    config: &ExportConfig,
    registry: &mut FilenameRegistry,
    pb: &ProgressBar,
) -> Result<ProcessResult> {
    let messages = conversation.messages(config.branch);
    if messages.is_empty() {
        debug!(id = ?conversation.id(), "Skipping conversation with no messages");
        return Ok(ProcessResult::Empty);
    }

    let title = importer::infer_title(conversation.title.as_deref(), &messages);
    let date_prefix = if config.prefix_date_in_filename {
        messages
            .iter()
            .find_map(|m| m.create_time)
            .and_then(|ts| utils::format_timestamp(ts, "%Y-%m-%d", config.timezone))
    } else {
        None
    };
    let stem = registry.allocate(&utils::file_stem(
        &title,
        date_prefix.as_deref(),
        config.filename_style,
    ));
    let path = config.output_directory.join(format!("{}.md", stem));
    let updated = conversation.update_time.and_then(utils::to_datetime);

    // Idempotency check: only files carrying our frontmatter can be compared
    if !config.force
        && config.obsidian_front_matter
        && let (Some(id), Some(updated)) = (conversation.id(), updated)
        && let Some(fm) = parse_existing_frontmatter(&path)
        && fm.is_current(id, updated, &config.fingerprint())
    {
        if config.verbose {
            pb.println(format!("Unchanged: {}.md", stem));
        }
        return Ok(ProcessResult::Unchanged);
    }

    let md_file = File::create(&path)
        .wrap_err_with(|| format!("Failed to create: {}", path.display()))?;
    let mut writer = BufWriter::new(md_file);
    let mut images = ImageSink::new(config.image_mode, &config.output_directory, &stem);

    let ctx = RenderContext {
        config,
        title: &title,
        conversation_id: conversation.id(),
        updated,
        messages: &messages,
    };
    let rendered = renderer::render_conversation(&mut writer, &ctx, &mut images)
        .and_then(|n| writer.flush().map(|_| n).map_err(Into::into));
    if let Err(e) = rendered {
        drop(writer);
        images.discard();
        if let Err(remove_err) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %remove_err, "Could not remove partial file");
        }
        return Err(e.wrap_err(format!("Failed to write {}.md", stem)));
    }
    drop(writer);

    if config.verbose {
        pb.println(format!("Written:   {}.md", stem));
    }
    debug!(stem = %stem, images = images.placed(), "Conversation exported");

    Ok(ProcessResult::Written {
        images: images.placed(),
    })
}
