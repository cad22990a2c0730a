// Editable form state behind the settings window
// Holds the text buffers for fields that are not plain strings or toggles

use std::path::PathBuf;

use crate::config::ExportConfig;

/// Help text shown when hovering an option label.
pub const TOOLTIPS: &[(&str, &str)] = &[
    ("user_name", "Name shown as the human author of messages."),
    ("llm_name", "Name shown as the AI assistant (e.g., ChatGPT)."),
    ("input_directory", "Folder where the exported ChatGPT JSON and image files are located."),
    ("output_directory", "Folder where converted Markdown files will be saved."),
    ("date_format", "Format for the conversation date (e.g., %Y-%m-%d)."),
    ("time_format", "Format for message timestamps (e.g., %H:%M)."),
    ("include_date", "Include the conversation date in the frontmatter."),
    ("include_timestamps", "Include the time above each message."),
    ("prefix_date_in_filename", "Prefix the output file name with the conversation date."),
    ("convert_latex_syntax", "Convert \\(x\\) to $x$ and \\[x\\] to $$x$$."),
    ("message_separator", "Text inserted after each message. Use \\n for line breaks."),
    ("skip_empty_messages", "Ignore messages with no content."),
    ("collapse_long_messages", "Collapse long messages in Markdown using <details>."),
    ("long_message_line_threshold", "Number of lines after which a message is considered long."),
    ("collapse_open_by_default", "Collapsed messages start expanded."),
    ("obsidian_front_matter", "Include YAML frontmatter compatible with Obsidian."),
    ("label_authors", "Write the author's name above every message."),
    ("image_mode", "Copy images next to the notes, embed them as base64, or leave them out."),
    ("image_width", "Width attribute of embedded <img> tags, in pixels."),
    ("branch", "Export every edited/regenerated branch or only the one last shown."),
    ("timezone", "Time zone used for dates and timestamps."),
    ("filename_style", "How conversation titles become file names."),
    ("tags", "Comma-separated tags added to the frontmatter."),
];

pub fn tooltip(key: &str) -> &'static str {
    TOOLTIPS
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, text)| *text)
        .unwrap_or("")
}

/// Form buffers for one [`ExportConfig`].
/// Strings and toggles are edited in `config` directly; the rest goes through text.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigForm {
    pub config: ExportConfig,
    pub input_directory: String,
    pub output_directory: String,
    pub threshold: String,
    pub image_width: String,
    /// Separator with control characters written as escapes.
    pub separator: String,
    pub tags: String,
}

impl ConfigForm {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            config: config.clone(),
            input_directory: config.input_directory.display().to_string(),
            output_directory: config.output_directory.display().to_string(),
            threshold: config.long_message_line_threshold.to_string(),
            image_width: config.image_width.to_string(),
            separator: escape_separator(&config.message_separator),
            tags: config.tags.join(", "),
        }
    }

    /// Numbers that do not parse fall back to their defaults.
    pub fn to_config(&self) -> ExportConfig {
        let defaults = ExportConfig::default();
        let mut config = self.config.clone();
        config.input_directory = PathBuf::from(self.input_directory.trim());
        config.output_directory = PathBuf::from(self.output_directory.trim());
        config.long_message_line_threshold = self
            .threshold
            .trim()
            .parse()
            .unwrap_or(defaults.long_message_line_threshold);
        config.image_width = self
            .image_width
            .trim()
            .parse()
            .ok()
            .filter(|w| *w > 0)
            .unwrap_or(defaults.image_width);
        config.message_separator = unescape_separator(&self.separator);
        config.tags = self
            .tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        config
    }
}

impl Default for ConfigForm {
    fn default() -> Self {
        Self::from_config(&ExportConfig::default())
    }
}

/// `\n`, `\r`, `\t` and `\` written as backslash escapes.
pub fn escape_separator(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_separator`]. Unknown escapes are kept verbatim.
pub fn unescape_separator(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
