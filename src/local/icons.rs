use image::imageops::FilterType;

use crate::error::{Result, ViewError};
use crate::icons::IconKey;
use crate::model::IconImage;
use crate::paths;
use crate::services::IconProvider;

const SMALL: u32 = 16;
const LARGE: u32 = 48;

/// Freedesktop icon-theme names for file types, plus raster thumbnails
/// decoded with `image`.
#[derive(Debug, Clone, Default)]
pub struct ThemeIconProvider;

impl ThemeIconProvider {
    pub fn new() -> Self {
        Self
    }

    fn named(key: &IconKey, size: u32) -> IconImage {
        let name = match key {
            IconKey::Class(extension) => theme_name(extension),
            IconKey::Instance(path) if paths::is_root(path) => "drive-harddisk",
            IconKey::Instance(path) => match paths::extension(path).as_deref() {
                Some("exe") => "application-x-executable",
                Some("lnk") => "emblem-symbolic-link",
                Some("url") => "text-html",
                Some("ico") => "image-x-generic",
                Some(other) => theme_name(other),
                None => "application-x-generic",
            },
        };
        IconImage::Named {
            name: name.to_string(),
            size,
        }
    }
}

fn theme_name(extension: &str) -> &'static str {
    match extension {
        "txt" | "log" | "md" | "ini" | "cfg" | "conf" => "text-x-generic",
        "rs" | "c" | "h" | "cpp" | "py" | "js" | "ts" | "sh" | "toml" | "json" | "yaml" | "yml" | "xml" => {
            "text-x-script"
        }
        "html" | "htm" => "text-html",
        "jpg" | "jpeg" | "png" | "bmp" | "gif" | "tif" | "tiff" | "svg" | "webp" => "image-x-generic",
        "mp3" | "flac" | "wav" | "ogg" => "audio-x-generic",
        "mp4" | "avi" | "mkv" | "mov" | "wmv" | "m4v" | "flv" | "mpeg" => "video-x-generic",
        "zip" | "tar" | "gz" | "xz" | "7z" | "rar" => "package-x-generic",
        "pdf" => "application-pdf",
        "doc" | "docx" | "odt" => "x-office-document",
        "xls" | "xlsx" | "ods" => "x-office-spreadsheet",
        "ppt" | "pptx" | "odp" => "x-office-presentation",
        _ => "application-x-generic",
    }
}

impl IconProvider for ThemeIconProvider {
    fn small_icon(&self, key: &IconKey) -> Result<IconImage> {
        Ok(Self::named(key, SMALL))
    }

    fn large_icon(&self, key: &IconKey) -> Result<IconImage> {
        Ok(Self::named(key, LARGE))
    }

    /// Only raster formats `image` can decode get a real thumbnail; the
    /// rest fail and fall back to the large type icon.
    fn thumbnail(&self, path: &str, size: u32) -> Result<IconImage> {
        let decoded = image::open(path).map_err(|e| ViewError::Generic(format!("cannot decode {}: {}", path, e)))?;
        let thumbnail = decoded.resize(size, size, FilterType::Triangle).to_rgba8();
        Ok(IconImage::Bitmap {
            width: thumbnail.width(),
            height: thumbnail.height(),
            rgba: thumbnail.into_raw(),
        })
    }
}
