use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use eyre::{Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;

use crate::config::ImageMode;
use crate::importer::Author;

static FILE_SERVICE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^file-service://(file-[a-zA-Z0-9]+)").expect("file-service pattern")
});
static SEDIMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sediment://(file_[a-f0-9]+)").expect("sediment pattern"));

/// Sub-folder of the export holding images made by the image generation tool.
pub const DALLE_FOLDER: &str = "dalle-generations";

/// Extract the file id that prefixes the image's name in the export folder.
pub fn parse_asset_pointer(pointer: &str) -> Option<&str> {
    FILE_SERVICE
        .captures(pointer)
        .or_else(|| SEDIMENT.captures(pointer))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Folder an image of this author is stored in.
pub fn image_source_dir(export_dir: &Path, author: &Author) -> PathBuf {
    if author.is_image_tool() {
        export_dir.join(DALLE_FOLDER)
    } else {
        export_dir.to_path_buf()
    }
}

/// First file (by name) in `dir` whose name starts with `file_id`.
pub fn locate_image(dir: &Path, file_id: &str) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .filter(|e| e.file_name().to_string_lossy().starts_with(file_id))
        .map(|e| e.path())
        .min()
}

/// `data:` URI with the MIME type sniffed from the bytes.
pub fn data_uri(bytes: &[u8]) -> String {
    let mime = infer::get(bytes)
        .map(|t| t.mime_type())
        .unwrap_or("application/octet-stream");
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Places the images of one conversation and hands back their `src` attribute.
/// Copied files are numbered from 1 per conversation: `<stem>_image_<n><ext>`.
pub struct ImageSink<'a> {
    mode: ImageMode,
    output_dir: &'a Path,
    stem: &'a str,
    counter: usize,
    copied: Vec<PathBuf>,
}

impl<'a> ImageSink<'a> {
    pub fn new(mode: ImageMode, output_dir: &'a Path, stem: &'a str) -> Self {
        Self {
            mode,
            output_dir,
            stem,
            counter: 0,
            copied: Vec::new(),
        }
    }

    pub fn mode(&self) -> ImageMode {
        self.mode
    }

    /// Number of images placed so far.
    pub fn placed(&self) -> usize {
        self.counter
    }

    pub fn place(&mut self, source: &Path) -> Result<String> {
        let src = match self.mode {
            ImageMode::Copy => {
                let ext = source
                    .extension()
                    .map(|e| format!(".{}", e.to_string_lossy()))
                    .unwrap_or_default();
                let name = format!("{}_image_{}{}", self.stem, self.counter + 1, ext);
                let target = self.output_dir.join(&name);
                fs::copy(source, &target).wrap_err_with(|| {
                    format!("Failed to copy image: {}", source.display())
                })?;
                self.copied.push(target);
                name
            }
            ImageMode::Embed => {
                let bytes = fs::read(source)
                    .wrap_err_with(|| format!("Failed to read image: {}", source.display()))?;
                data_uri(&bytes)
            }
            ImageMode::Skip => return Ok(String::new()),
        };
        self.counter += 1;
        Ok(src)
    }

    /// Remove the files copied so far, for a conversation that failed to export.
    pub fn discard(&mut self) {
        for path in self.copied.drain(..) {
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Could not remove copied image");
            }
        }
        self.counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[test]
    fn asset_pointers() {
        assert_eq!(
            parse_asset_pointer("file-service://file-AbC123xyz"),
            Some("file-AbC123xyz")
        );
        assert_eq!(
            parse_asset_pointer("sediment://file_00ab12ff"),
            Some("file_00ab12ff")
        );
        assert_eq!(parse_asset_pointer("sediment://file_XYZ"), None);
        assert_eq!(parse_asset_pointer("https://example.com/a.png"), None);
        assert_eq!(parse_asset_pointer(""), None);
    }

    #[test]
    fn image_tool_uses_dalle_folder() {
        let export = Path::new("/export");
        let tool = Author {
            role: "tool".into(),
            name: Some("dalle.text2im".into()),
        };
        let user = Author {
            role: "user".into(),
            name: None,
        };
        assert_eq!(image_source_dir(export, &tool), export.join("dalle-generations"));
        assert_eq!(image_source_dir(export, &user), export.to_path_buf());
    }

    #[test]
    fn locate_picks_first_matching_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("file-abc-b.webp"), b"b").unwrap();
        fs::write(dir.path().join("file-abc-a.png"), b"a").unwrap();
        fs::write(dir.path().join("file-other.png"), b"x").unwrap();
        fs::create_dir(dir.path().join("file-abc-dir")).unwrap();

        assert_eq!(
            locate_image(dir.path(), "file-abc"),
            Some(dir.path().join("file-abc-a.png"))
        );
        assert_eq!(locate_image(dir.path(), "file-missing"), None);
        assert_eq!(locate_image(&dir.path().join("nope"), "file-abc"), None);
    }

    #[test]
    fn copy_mode_numbers_files() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let a = src.path().join("file-a.png");
        let b = src.path().join("file-b.jpg");
        fs::write(&a, PNG_HEADER).unwrap();
        fs::write(&b, b"jpg").unwrap();

        let mut sink = ImageSink::new(ImageMode::Copy, out.path(), "2024-01-01_Chat");
        assert_eq!(sink.place(&a).unwrap(), "2024-01-01_Chat_image_1.png");
        assert_eq!(sink.place(&b).unwrap(), "2024-01-01_Chat_image_2.jpg");
        assert_eq!(sink.placed(), 2);
        assert_eq!(
            fs::read(out.path().join("2024-01-01_Chat_image_2.jpg")).unwrap(),
            b"jpg"
        );
    }

    #[test]
    fn discard_removes_copied_files() {
        let src = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let a = src.path().join("file-a.png");
        fs::write(&a, PNG_HEADER).unwrap();

        let mut sink = ImageSink::new(ImageMode::Copy, out.path(), "chat");
        sink.place(&a).unwrap();
        sink.place(&a).unwrap();
        sink.discard();
        assert_eq!(sink.placed(), 0);
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn embed_mode_inlines_bytes() {
        let src = TempDir::new().unwrap();
        let a = src.path().join("file-a.png");
        fs::write(&a, PNG_HEADER).unwrap();

        let mut sink = ImageSink::new(ImageMode::Embed, src.path(), "x");
        let uri = sink.place(&a).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"), "{uri}");
        assert_eq!(data_uri(b"??"), "data:application/octet-stream;base64,Pz8=");
    }
}
