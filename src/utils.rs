use chrono::{DateTime, Local, Utc};
use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::config::{FilenameStyle, TimestampZone};

const MAX_STEM_CHARS: usize = 120;

/// Keep letters, digits, spaces and underscores; spaces become underscores.
pub fn sanitize_filename(name: &str) -> String {
    let kept: String = name
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '_')
        .take(MAX_STEM_CHARS)
        .collect();
    let stem = kept.trim_end().replace(' ', "_");
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem
    }
}

/// File stem for a conversation title, optionally prefixed with its date.
pub fn file_stem(title: &str, date_prefix: Option<&str>, style: FilenameStyle) -> String {
    let base = match style {
        FilenameStyle::Sanitized => sanitize_filename(title),
        FilenameStyle::Slug => {
            let raw_slug = slug::slugify(title);
            // slug output is ASCII-only, so byte == char
            let slug = raw_slug[..raw_slug.len().min(60)]
                .trim_end_matches('-')
                .to_string();
            if slug.is_empty() {
                "untitled".to_string()
            } else {
                slug
            }
        }
    };
    match date_prefix {
        Some(date) => format!("{}_{}", date, base),
        None => base,
    }
}

/// Hands out stems unique within one run: repeats get `_2`, `_3`, ...
#[derive(Debug, Default)]
pub struct FilenameRegistry {
    used: HashSet<String>,
}

impl FilenameRegistry {
    pub fn allocate(&mut self, stem: &str) -> String {
        if self.used.insert(stem.to_string()) {
            return stem.to_string();
        }
        let mut n = 2usize;
        loop {
            let candidate = format!("{}_{}", stem, n);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Unix seconds (with fraction) as a UTC instant.
pub fn to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Format Unix seconds with a strftime pattern. `None` for out-of-range
/// timestamps or patterns chrono cannot render.
pub fn format_timestamp(secs: f64, format: &str, zone: TimestampZone) -> Option<String> {
    let utc = to_datetime(secs)?;
    let mut out = String::new();
    let written = match zone {
        TimestampZone::Utc => write!(out, "{}", utc.format(format)),
        TimestampZone::Local => write!(out, "{}", utc.with_timezone(&Local).format(format)),
    };
    written.ok().map(|_| out)
}

/// Fields read back from a previously exported file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileFrontmatter {
    pub id: Option<String>,
    pub updated: Option<DateTime<Utc>>,
    /// [`ExportConfig::fingerprint`](crate::config::ExportConfig::fingerprint) of the run that wrote the file.
    pub settings: Option<String>,
}

impl FileFrontmatter {
    /// The file was written for `id` from data at least as new as `updated`,
    /// with the same rendering settings.
    pub fn is_current(&self, id: &str, updated: DateTime<Utc>, settings: &str) -> bool {
        self.id.as_deref() == Some(id)
            && self.updated.is_some_and(|ts| ts >= updated)
            && self.settings.as_deref() == Some(settings)
    }
}

/// Read the YAML frontmatter from an existing .md file and extract relevant fields.
pub fn parse_existing_frontmatter(path: &Path) -> Option<FileFrontmatter> {
    let file = File::open(path).ok()?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let first = lines.next()?.ok()?;
    if first.trim() != "---" {
        return None;
    }

    let mut fm = FileFrontmatter::default();
    let mut bytes_read = 0usize;

    for line in lines {
        let line = line.ok()?;
        bytes_read += line.len() + 1;
        if bytes_read > 2048 || line.trim() == "---" {
            break;
        }
        if let Some(rest) = line.strip_prefix("id:") {
            fm.id = Some(unquote(rest).to_string());
        } else if let Some(rest) = line.strip_prefix("updated:") {
            fm.updated = DateTime::parse_from_rfc3339(unquote(rest))
                .ok()
                .map(|dt| dt.with_timezone(&Utc));
        } else if let Some(rest) = line.strip_prefix("settings:") {
            fm.settings = Some(unquote(rest).to_string());
        }
    }
    Some(fm)
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('\'').trim_matches('"')
}
