use chrono::format::{Item, StrftimeItems};
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

/// Which messages of a conversation tree end up in the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchMode {
    /// Every message in the mapping, ordered by creation time.
    #[default]
    All,
    /// Only the branch ending at `current_node`.
    Current,
}

impl BranchMode {
    pub const ALL: [BranchMode; 2] = [BranchMode::All, BranchMode::Current];

    pub fn label(self) -> &'static str {
        match self {
            BranchMode::All => "All branches",
            BranchMode::Current => "Current branch only",
        }
    }
}

/// How images referenced by a conversation are carried into the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Copy the file next to the Markdown and reference it by name.
    #[default]
    Copy,
    /// Inline the bytes as a base64 `data:` URI.
    Embed,
    Skip,
}

impl ImageMode {
    pub const ALL: [ImageMode; 3] = [ImageMode::Copy, ImageMode::Embed, ImageMode::Skip];

    pub fn label(self) -> &'static str {
        match self {
            ImageMode::Copy => "Copy files",
            ImageMode::Embed => "Embed as base64",
            ImageMode::Skip => "Skip images",
        }
    }
}

/// Time zone used when rendering Unix timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampZone {
    #[default]
    Local,
    Utc,
}

impl TimestampZone {
    pub const ALL: [TimestampZone; 2] = [TimestampZone::Local, TimestampZone::Utc];

    pub fn label(self) -> &'static str {
        match self {
            TimestampZone::Local => "Local time",
            TimestampZone::Utc => "UTC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilenameStyle {
    /// Title with punctuation stripped and spaces turned into underscores.
    #[default]
    Sanitized,
    /// Lowercase ASCII slug.
    Slug,
}

impl FilenameStyle {
    pub const ALL: [FilenameStyle; 2] = [FilenameStyle::Sanitized, FilenameStyle::Slug];

    pub fn label(self) -> &'static str {
        match self {
            FilenameStyle::Sanitized => "Title (sanitized)",
            FilenameStyle::Slug => "Slug",
        }
    }
}

/// Configuration required to run the export process.
/// This decouples the logic from how the options were collected (GUI, CLI or config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub user_name: String,
    #[serde(alias = "LLM_name")]
    pub llm_name: String,
    pub input_directory: PathBuf,
    pub output_directory: PathBuf,
    pub date_format: String,
    pub time_format: String,
    pub include_date: bool,
    pub include_timestamps: bool,
    pub prefix_date_in_filename: bool,
    pub convert_latex_syntax: bool,
    pub message_separator: String,
    pub skip_empty_messages: bool,
    pub collapse_long_messages: bool,
    pub long_message_line_threshold: usize,
    pub collapse_open_by_default: bool,
    pub obsidian_front_matter: bool,
    pub label_authors: bool,
    pub image_mode: ImageMode,
    pub image_width: u32,
    pub branch: BranchMode,
    pub timezone: TimestampZone,
    pub filename_style: FilenameStyle,
    pub tags: Vec<String>,

    /// Rewrite files even when their frontmatter says they are current.
    #[serde(skip)]
    pub force: bool,
    #[serde(skip)]
    pub verbose: bool,
    #[serde(skip)]
    pub quiet: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            user_name: "Me".to_string(),
            llm_name: "ChatGPT".to_string(),
            input_directory: PathBuf::from("./chatgptexport"),
            output_directory: PathBuf::from("./output"),
            date_format: "%Y-%m-%d".to_string(),
            time_format: "%H:%M".to_string(),
            include_date: true,
            include_timestamps: true,
            prefix_date_in_filename: true,
            convert_latex_syntax: true,
            message_separator: "\n\n---\n\n".to_string(),
            skip_empty_messages: true,
            collapse_long_messages: true,
            long_message_line_threshold: 5,
            collapse_open_by_default: false,
            obsidian_front_matter: true,
            label_authors: false,
            image_mode: ImageMode::Copy,
            image_width: 400,
            branch: BranchMode::All,
            timezone: TimestampZone::Local,
            filename_style: FilenameStyle::Sanitized,
            tags: Vec::new(),
            force: false,
            verbose: false,
            quiet: false,
        }
    }
}

impl ExportConfig {
    /// Reject settings that would only fail halfway through a run.
    pub fn validate(&self) -> Result<()> {
        check_strftime("date_format", &self.date_format)?;
        check_strftime("time_format", &self.time_format)?;
        if self.image_width == 0 {
            return Err(eyre!("image_width must be greater than zero"));
        }
        Ok(())
    }

    /// Short digest of every persisted setting that shapes the Markdown.
    /// Folders are left out so moving the export does not force a rewrite.
    pub fn fingerprint(&self) -> String {
        let rendering = ExportConfig {
            input_directory: PathBuf::new(),
            output_directory: PathBuf::new(),
            ..self.clone()
        };
        let bytes = serde_json::to_vec(&rendering).unwrap_or_default();
        let digest = format!("{:x}", Sha256::digest(&bytes));
        digest[..16].to_string()
    }
}

fn check_strftime(field: &str, format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(eyre!("Invalid {}: {:?} is not a valid strftime format", field, format));
    }
    Ok(())
}

/// Persistent home of an [`ExportConfig`] on disk (TOML).
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$XDG_CONFIG_HOME/chatgpt-md-export/config.toml` or the platform equivalent.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("chatgpt-md-export/config.toml"))
    }

    pub fn at_default_location() -> Result<Self> {
        Self::default_path()
            .map(Self::new)
            .ok_or_else(|| eyre!("Could not determine the configuration directory.\nUse --config to specify a path."))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Missing file yields the defaults; missing keys are filled from the defaults.
    pub fn load(&self) -> Result<ExportConfig> {
        if !self.path.exists() {
            return Ok(ExportConfig::default());
        }
        let content = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Failed to read config: {}", self.path.display()))?;
        toml::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse config: {}", self.path.display()))
    }

    pub fn save(&self, config: &ExportConfig) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).wrap_err_with(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(config).wrap_err("Failed to serialize config")?;
        fs::write(&self.path, content)
            .wrap_err_with(|| format!("Failed to write config: {}", self.path.display()))
    }

    /// Forget the stored settings and hand back the defaults.
    pub fn reset(&self) -> Result<ExportConfig> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .wrap_err_with(|| format!("Failed to remove config: {}", self.path.display()))?;
        }
        Ok(ExportConfig::default())
    }
}
