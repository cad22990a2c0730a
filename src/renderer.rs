use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, warn};

use crate::assets::{self, ImageSink};
use crate::config::{ExportConfig, ImageMode};
use crate::importer::{ContentPart, ImagePart, Message};
use crate::latex::convert_latex;
use crate::utils::format_timestamp;

#[derive(Serialize)]
struct Frontmatter<'a> {
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<DateTime<Utc>>,
    settings: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<&'a [String]>,
}

/// Everything needed to turn one conversation into Markdown.
pub struct RenderContext<'a> {
    pub config: &'a ExportConfig,
    pub title: &'a str,
    pub conversation_id: Option<&'a str>,
    pub updated: Option<DateTime<Utc>>,
    /// Messages in reading order.
    pub messages: &'a [&'a Message],
}

/// Write a conversation as Markdown. Returns the number of messages written.
pub fn render_conversation<W: Write>(
    writer: &mut W,
    ctx: &RenderContext<'_>,
    images: &mut ImageSink<'_>,
) -> Result<usize> {
    let config = ctx.config;

    if config.obsidian_front_matter {
        let date = if config.include_date {
            ctx.messages
                .iter()
                .find_map(|m| m.create_time)
                .and_then(|ts| format_timestamp(ts, &config.date_format, config.timezone))
        } else {
            None
        };
        let fm = Frontmatter {
            title: ctx.title,
            date,
            id: ctx.conversation_id,
            updated: ctx.updated,
            settings: config.fingerprint(),
            tags: (!config.tags.is_empty()).then_some(config.tags.as_slice()),
        };
        write_frontmatter(writer, &fm)?;
    }

    let mut written = 0usize;
    for message in ctx.messages {
        if render_message(writer, message, config, images)? {
            written += 1;
        }
    }
    Ok(written)
}

fn write_frontmatter<W: Write>(writer: &mut W, fm: &Frontmatter<'_>) -> Result<()> {
    let yaml = serde_yaml::to_string(fm).wrap_err("Failed to serialize frontmatter")?;
    writeln!(writer, "---")?;
    write!(writer, "{}", yaml)?;
    writeln!(writer, "---")?;
    writeln!(writer)?;
    Ok(())
}

/// Returns `false` when the message was skipped as empty.
fn render_message<W: Write>(
    writer: &mut W,
    message: &Message,
    config: &ExportConfig,
    images: &mut ImageSink<'_>,
) -> Result<bool> {
    let content = message.text();
    let blank = content.trim().is_empty();

    if config.skip_empty_messages && blank && !message.has_images() {
        return Ok(false);
    }

    // Images go through a buffer: the timestamp above them depends on whether any made it.
    let mut image_block = Vec::new();
    for part in message.parts() {
        if let ContentPart::Image(image) = part {
            write_image(&mut image_block, &image, message, config, images)?;
        }
    }
    if config.skip_empty_messages && blank && image_block.is_empty() {
        return Ok(false);
    }

    if config.include_timestamps
        && let Some(ts) = message.create_time
        && let Some(time) = format_timestamp(ts, &config.time_format, config.timezone)
    {
        writeln!(writer, "<sub>{}</sub>", time)?;
    }
    writer.write_all(&image_block)?;

    // Image-only message: nothing left to write, not even the separator.
    if config.skip_empty_messages && blank {
        return Ok(true);
    }

    let author = if message.author.is_user() {
        &config.user_name
    } else {
        &config.llm_name
    };

    let use_code_block = message.author.is_user() || content.contains("```");
    let content = if config.convert_latex_syntax {
        convert_latex(&content)
    } else {
        content
    };

    let line_count = count_lines(&content);
    let collapse = config.collapse_long_messages && line_count > config.long_message_line_threshold;

    if collapse {
        let open = if config.collapse_open_by_default { " open" } else { "" };
        write!(
            writer,
            "**{}**:\n\n<details{}><summary>Long Message with {} lines</summary>\n\n",
            author, open, line_count
        )?;
    } else if config.label_authors {
        write!(writer, "**{}**:\n\n", author)?;
    }

    if use_code_block {
        let fence = code_fence(&content);
        write!(writer, "{}\n{}\n{}", fence, content, fence)?;
    } else {
        writer.write_all(content.as_bytes())?;
    }

    if collapse {
        writer.write_all(b"\n\n</details>")?;
    }
    writer.write_all(config.message_separator.as_bytes())?;
    if collapse {
        writer.write_all(b"\n\n")?;
    }

    Ok(true)
}

fn write_image<W: Write>(
    writer: &mut W,
    image: &ImagePart,
    message: &Message,
    config: &ExportConfig,
    images: &mut ImageSink<'_>,
) -> Result<()> {
    if images.mode() == ImageMode::Skip {
        return Ok(());
    }
    let Some(file_id) = assets::parse_asset_pointer(&image.asset_pointer) else {
        debug!(pointer = %image.asset_pointer, "Unrecognised asset pointer");
        return Ok(());
    };
    let dir = assets::image_source_dir(&config.input_directory, &message.author);
    let Some(source) = assets::locate_image(&dir, file_id) else {
        warn!(file_id, dir = %dir.display(), "Image file not found");
        return Ok(());
    };

    let src = images.place(&source)?;
    if let Some(prompt) = &image.dalle_prompt {
        writeln!(writer, "**{} (DALL·E)**: *{}*", config.llm_name, prompt)?;
    }
    write!(
        writer,
        "\n<img src=\"{}\" alt=\"Generated image\" width=\"{}\">\n\n",
        src, config.image_width
    )?;
    Ok(())
}

/// Number of lines, breaking on every Unicode line boundary (`\r\n` counts once).
/// A trailing break does not start a new line.
pub fn count_lines(content: &str) -> usize {
    let mut count = 0;
    let mut open_line = false;
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if matches!(
            c,
            '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
        ) {
            if c == '\r' && chars.peek() == Some(&'\n') {
                chars.next();
            }
            count += 1;
            open_line = false;
        } else {
            open_line = true;
        }
    }
    count + usize::from(open_line)
}

/// A backtick fence one longer than the longest backtick run in `content`,
/// and never shorter than three.
pub fn code_fence(content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat(longest.max(2) + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimestampZone;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn msg(role: &str, time: Option<f64>, parts: serde_json::Value) -> Message {
        serde_json::from_value(json!({
            "author": { "role": role },
            "create_time": time,
            "content": { "content_type": "text", "parts": parts }
        }))
        .unwrap()
    }

    fn plain_config() -> ExportConfig {
        ExportConfig {
            include_timestamps: false,
            obsidian_front_matter: false,
            collapse_long_messages: false,
            convert_latex_syntax: false,
            message_separator: "\n---\n".into(),
            timezone: TimestampZone::Utc,
            ..ExportConfig::default()
        }
    }

    fn render(config: &ExportConfig, messages: &[&Message]) -> String {
        let mut out = Vec::new();
        let mut sink = ImageSink::new(config.image_mode, Path::new("/nonexistent"), "stem");
        let ctx = RenderContext {
            config,
            title: "Title",
            conversation_id: Some("conv-1"),
            updated: None,
            messages,
        };
        render_conversation(&mut out, &ctx, &mut sink).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn fences_outgrow_inner_backticks() {
        assert_eq!(code_fence("plain"), "```");
        assert_eq!(code_fence("inline `code` here"), "```");
        assert_eq!(code_fence("```rust\nfn main() {}\n```"), "````");
        assert_eq!(code_fence("`````"), "``````");
    }

    #[test]
    fn line_count_breaks_on_all_line_boundaries() {
        assert_eq!(count_lines(""), 0);
        assert_eq!(count_lines("one"), 1);
        assert_eq!(count_lines("one\n"), 1);
        assert_eq!(count_lines("\n"), 1);
        assert_eq!(count_lines("a\n\nb"), 3);
        assert_eq!(count_lines("a\r\nb\r\n"), 2);
        assert_eq!(count_lines("a\rb\u{2028}c\u{0c}d\u{85}e\n"), 5);
    }

    #[test]
    fn carriage_returns_count_towards_collapse() {
        let cfg = ExportConfig {
            collapse_long_messages: true,
            long_message_line_threshold: 2,
            ..plain_config()
        };
        let a = msg("assistant", None, json!(["one\rtwo\rthree"]));
        let out = render(&cfg, &[&a]);
        assert!(out.contains("Long Message with 3 lines"), "{out}");
    }

    #[test]
    fn user_messages_are_fenced_assistant_is_not() {
        let cfg = plain_config();
        let q = msg("user", Some(1.0), json!(["What is 2+2?"]));
        let a = msg("assistant", Some(2.0), json!(["4"]));
        assert_eq!(
            render(&cfg, &[&q, &a]),
            "```\nWhat is 2+2?\n\n```\n---\n4\n\n---\n"
        );
    }

    #[test]
    fn assistant_with_code_gets_longer_fence() {
        let cfg = plain_config();
        let a = msg("assistant", None, json!(["```py\nx = 1\n```"]));
        assert_eq!(
            render(&cfg, &[&a]),
            "````\n```py\nx = 1\n```\n\n````\n---\n"
        );
    }

    #[test]
    fn empty_messages_skipped_only_when_configured() {
        let mut cfg = plain_config();
        let empty = msg("system", None, json!([""]));
        let a = msg("assistant", None, json!(["hi"]));
        assert_eq!(render(&cfg, &[&empty, &a]), "hi\n\n---\n");

        cfg.skip_empty_messages = false;
        assert_eq!(render(&cfg, &[&empty, &a]), "\n\n---\nhi\n\n---\n");
    }

    #[test]
    fn timestamps_and_author_labels() {
        let cfg = ExportConfig {
            include_timestamps: true,
            label_authors: true,
            user_name: "Ada".into(),
            ..plain_config()
        };
        // 2023-11-14T22:13:20Z
        let q = msg("user", Some(1_700_000_000.0), json!(["hey"]));
        assert_eq!(
            render(&cfg, &[&q]),
            "<sub>22:13</sub>\n**Ada**:\n\n```\nhey\n\n```\n---\n"
        );
    }

    #[test]
    fn long_messages_collapse() {
        let cfg = ExportConfig {
            collapse_long_messages: true,
            long_message_line_threshold: 2,
            collapse_open_by_default: true,
            ..plain_config()
        };
        let a = msg("assistant", None, json!(["one\ntwo\nthree"]));
        assert_eq!(
            render(&cfg, &[&a]),
            "**ChatGPT**:\n\n<details open><summary>Long Message with 3 lines</summary>\n\n\
             one\ntwo\nthree\n\n\n</details>\n---\n\n\n"
        );

        let short = msg("assistant", None, json!(["one\ntwo"]));
        assert_eq!(render(&cfg, &[&short]), "one\ntwo\n\n---\n");
    }

    #[test]
    fn latex_converted_after_fence_decision() {
        let cfg = ExportConfig {
            convert_latex_syntax: true,
            ..plain_config()
        };
        let a = msg("assistant", None, json!([r"Area is \(\pi r^2\)."]));
        assert_eq!(render(&cfg, &[&a]), "Area is $\\pi r^2$.\n\n---\n");
    }

    #[test]
    fn frontmatter_is_valid_yaml() {
        let cfg = ExportConfig {
            obsidian_front_matter: true,
            tags: vec!["chatgpt".into(), "archive".into()],
            ..plain_config()
        };
        let a = msg("assistant", Some(1_700_000_000.0), json!(["hi"]));
        let mut out = Vec::new();
        let mut sink = ImageSink::new(ImageMode::Skip, Path::new("/nonexistent"), "stem");
        let ctx = RenderContext {
            config: &cfg,
            title: "Tricky: title # with yaml chars",
            conversation_id: Some("conv-1"),
            updated: crate::utils::to_datetime(1_700_000_100.0),
            messages: &[&a],
        };
        render_conversation(&mut out, &ctx, &mut sink).unwrap();
        let text = String::from_utf8(out).unwrap();

        let rest = text.strip_prefix("---\n").unwrap();
        let (yaml, body) = rest.split_once("---\n\n").unwrap();
        assert_eq!(body, "hi\n\n---\n");

        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(value["title"].as_str(), Some("Tricky: title # with yaml chars"));
        assert_eq!(value["date"].as_str(), Some("2023-11-14"));
        assert_eq!(value["id"].as_str(), Some("conv-1"));
        assert_eq!(value["tags"][1].as_str(), Some("archive"));
        let updated = value["updated"].as_str().unwrap();
        assert_eq!(
            DateTime::parse_from_rfc3339(updated).unwrap().timestamp(),
            1_700_000_100
        );
    }

    #[test]
    fn images_are_copied_with_dalle_prompt() {
        let export = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        fs::create_dir(export.path().join("dalle-generations")).unwrap();
        fs::write(
            export.path().join("dalle-generations/file-Fox1-generated.webp"),
            b"img",
        )
        .unwrap();

        let cfg = ExportConfig {
            input_directory: export.path().to_path_buf(),
            ..plain_config()
        };
        let tool: Message = serde_json::from_value(json!({
            "author": { "role": "tool", "name": "dalle.text2im" },
            "content": { "content_type": "multimodal_text", "parts": [
                { "content_type": "image_asset_pointer",
                  "asset_pointer": "file-service://file-Fox1",
                  "metadata": { "dalle": { "prompt": "a fox" } } },
                { "content_type": "image_asset_pointer",
                  "asset_pointer": "file-service://file-Gone" }
            ] }
        }))
        .unwrap();

        let mut out = Vec::new();
        let mut sink = ImageSink::new(ImageMode::Copy, out_dir.path(), "chat");
        let ctx = RenderContext {
            config: &cfg,
            title: "t",
            conversation_id: None,
            updated: None,
            messages: &[&tool],
        };
        let written = render_conversation(&mut out, &ctx, &mut sink).unwrap();
        assert_eq!(written, 1);
        assert_eq!(sink.placed(), 1);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "**ChatGPT (DALL·E)**: *a fox*\n\n<img src=\"chat_image_1.webp\" alt=\"Generated image\" width=\"400\">\n\n"
        );
        assert!(out_dir.path().join("chat_image_1.webp").exists());
    }

    fn dalle_message(time: f64, file_id: &str) -> Message {
        serde_json::from_value(json!({
            "author": { "role": "tool", "name": "dalle.text2im" },
            "create_time": time,
            "content": { "content_type": "multimodal_text", "parts": [
                { "content_type": "image_asset_pointer",
                  "asset_pointer": format!("file-service://{file_id}") }
            ] }
        }))
        .unwrap()
    }

    #[test]
    fn image_only_messages_without_output_are_skipped() {
        let export = TempDir::new().unwrap();
        fs::create_dir(export.path().join("dalle-generations")).unwrap();
        fs::write(export.path().join("dalle-generations/file-Owl7.webp"), b"img").unwrap();

        // 2023-11-14T22:13:20Z and 22:14:20Z
        let owl = dalle_message(1_700_000_000.0, "file-Owl7");
        let gone = dalle_message(1_700_000_000.0, "file-Missing");
        let reply = msg("assistant", Some(1_700_000_060.0), json!(["done"]));

        let skip_images = ExportConfig {
            include_timestamps: true,
            image_mode: ImageMode::Skip,
            input_directory: export.path().to_path_buf(),
            ..plain_config()
        };
        let mut out = Vec::new();
        let mut sink = ImageSink::new(ImageMode::Skip, export.path(), "stem");
        let ctx = RenderContext {
            config: &skip_images,
            title: "t",
            conversation_id: None,
            updated: None,
            messages: &[&owl, &reply],
        };
        assert_eq!(render_conversation(&mut out, &ctx, &mut sink).unwrap(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "<sub>22:14</sub>\ndone\n\n---\n");

        let missing_file = ExportConfig {
            image_mode: ImageMode::Copy,
            ..skip_images
        };
        let out_dir = TempDir::new().unwrap();
        let mut out = Vec::new();
        let mut sink = ImageSink::new(ImageMode::Copy, out_dir.path(), "stem");
        let ctx = RenderContext {
            config: &missing_file,
            title: "t",
            conversation_id: None,
            updated: None,
            messages: &[&gone, &reply],
        };
        assert_eq!(render_conversation(&mut out, &ctx, &mut sink).unwrap(), 1);
        assert_eq!(String::from_utf8(out).unwrap(), "<sub>22:14</sub>\ndone\n\n---\n");
        assert_eq!(sink.placed(), 0);
    }
}
