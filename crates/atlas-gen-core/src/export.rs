use crate::config::ManifestFormat;
use crate::error::{AtlasGenError, Result};
use crate::model::{Meta, Page};
use crate::pipeline::OutputPage;
use serde_json::{Value, json};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Text manifest: one `name x y width height` line per frame.
///
/// Lines follow `page.frames`, which atlases already keep sorted by name.
pub fn to_manifest_text<K: ToString>(page: &Page<K>) -> String {
    let mut out = String::new();
    for fr in &page.frames {
        let _ = writeln!(
            out,
            "{} {} {} {} {}",
            fr.key.to_string(),
            fr.frame.x,
            fr.frame.y,
            fr.frame.w,
            fr.frame.h
        );
    }
    out
}

/// Frames keyed by name, with page id/size hints.
/// Shape: `{ frames: { name: { frame, page, pageSize } }, meta }`.
pub fn to_json_manifest<K: ToString>(page: &Page<K>, meta: &Meta) -> Value {
    // serde_json::Map keeps keys sorted without the preserve_order feature
    let mut frames = serde_json::Map::new();
    for fr in &page.frames {
        frames.insert(
            fr.key.to_string(),
            json!({
                "frame": {"x": fr.frame.x, "y": fr.frame.y, "w": fr.frame.w, "h": fr.frame.h},
                "page": page.id + 1,
                "pageSize": {"w": page.width, "h": page.height},
            }),
        );
    }
    json!({ "frames": frames, "meta": meta })
}

/// File stem of a page: `<base><id + 1>`, so numbering starts at 1.
pub fn page_stem(base: &str, page: &Page) -> String {
    format!("{}{}", base, page.id + 1)
}

/// Render the manifest of `page` in `format`.
pub fn render_manifest(page: &Page, meta: &Meta, format: ManifestFormat) -> Result<String> {
    match format {
        ManifestFormat::Txt => Ok(to_manifest_text(page)),
        ManifestFormat::Json => serde_json::to_string_pretty(&to_json_manifest(page, meta))
            .map_err(|e| AtlasGenError::Encode(e.to_string())),
    }
}

/// Paths written for one page.
#[derive(Debug, Clone)]
pub struct WrittenPage {
    pub image: PathBuf,
    pub manifest: PathBuf,
}

/// Write the manifest of `page` to `<dir>/<base><n>.<ext>`.
pub fn write_manifest(
    dir: &Path,
    base: &str,
    page: &Page,
    meta: &Meta,
    format: ManifestFormat,
) -> Result<PathBuf> {
    let path = dir.join(format!("{}.{}", page_stem(base, page), format.extension()));
    fs::write(&path, render_manifest(page, meta, format)?)?;
    Ok(path)
}

/// Write the PNG and the manifest of one output page.
///
/// The PNG is written first; a failure there skips the manifest.
pub fn write_page(
    dir: &Path,
    base: &str,
    output: &OutputPage,
    meta: &Meta,
    format: ManifestFormat,
) -> Result<WrittenPage> {
    let image = dir.join(format!("{}.png", page_stem(base, &output.page)));
    output.rgba.save(&image)?;
    let manifest = write_manifest(dir, base, &output.page, meta, format)?;
    Ok(WrittenPage { image, manifest })
}

impl OutputPage {
    /// Convenience wrapper around [`write_page`].
    pub fn write(
        &self,
        dir: &Path,
        base: &str,
        meta: &Meta,
        format: ManifestFormat,
    ) -> Result<WrittenPage> {
        write_page(dir, base, self, meta, format)
    }
}
