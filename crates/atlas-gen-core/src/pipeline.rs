use crate::atlas::Atlas;
use crate::config::AtlasConfig;
use crate::error::{AtlasGenError, Result};
use crate::model::{Meta, PackStats, Page, Rect};
use image::{DynamicImage, Rgba, RgbaImage};
use std::collections::HashSet;
use tracing::{debug, info, instrument};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// In-memory image to pack (logical name + decoded image).
pub struct InputImage {
    pub key: String,
    pub image: DynamicImage,
}

/// Output RGBA page and its logical page record.
pub struct OutputPage {
    pub page: Page,
    pub rgba: RgbaImage,
}

/// Geometry of a packing run: pages in creation order plus run metadata.
#[derive(Debug, Clone)]
pub struct Layout {
    pub pages: Vec<Page>,
    pub meta: Meta,
}

impl Layout {
    /// Computes packing statistics for this layout.
    pub fn stats(&self) -> PackStats {
        PackStats::from_pages(&self.pages)
    }
}

/// Output of a packing run: layout metadata and RGBA pages.
pub struct PackOutput {
    pub layout: Layout,
    pub pages: Vec<OutputPage>,
}

impl PackOutput {
    /// Computes packing statistics for this output.
    /// This is a convenience method that delegates to `layout.stats()`.
    pub fn stats(&self) -> PackStats {
        self.layout.stats()
    }
}

/// Anything the placement driver can order: a logical name and a size.
pub trait Placeable {
    fn key(&self) -> &str;
    fn size(&self) -> (u32, u32);
    fn area(&self) -> u64 {
        let (w, h) = self.size();
        (w as u64) * (h as u64)
    }
}

impl Placeable for InputImage {
    fn key(&self) -> &str {
        &self.key
    }
    fn size(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

impl Placeable for (String, u32, u32) {
    fn key(&self) -> &str {
        &self.0
    }
    fn size(&self) -> (u32, u32) {
        (self.1, self.2)
    }
}

struct Prep {
    key: String,
    rgba: RgbaImage,
}

impl Placeable for Prep {
    fn key(&self) -> &str {
        &self.key
    }
    fn size(&self) -> (u32, u32) {
        self.rgba.dimensions()
    }
}

/// Sorts items into placement order: descending area, then ascending name.
///
/// With unique names this is a total order, so placement is deterministic.
pub fn sort_for_placement<T: Placeable>(items: &mut [T]) {
    items.sort_by(|a, b| b.area().cmp(&a.area()).then_with(|| a.key().cmp(b.key())));
}

/// Checks every item against the atlas size and for unique, non-empty names.
pub fn validate_items<T: Placeable>(items: &[T], cfg: &AtlasConfig) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(items.len());
    for item in items {
        let (w, h) = item.size();
        if w == 0 || h == 0 {
            return Err(AtlasGenError::InvalidInput(format!(
                "'{}' has zero size ({}x{})",
                item.key(),
                w,
                h
            )));
        }
        if w > cfg.width || h > cfg.height {
            return Err(AtlasGenError::OversizedImage {
                key: item.key().to_string(),
                width: w,
                height: h,
                atlas_width: cfg.width,
                atlas_height: cfg.height,
            });
        }
        if !seen.insert(item.key()) {
            return Err(AtlasGenError::DuplicateKey(item.key().to_string()));
        }
    }
    Ok(())
}

/// Ordered, append-only list of atlases of one fixed size.
///
/// Each item goes to the first atlas (in creation order) that accepts it; when
/// none does, a new atlas is appended. There is always at least one atlas.
/// A key can be placed once across the whole set.
pub struct AtlasSet {
    width: u32,
    height: u32,
    background: Rgba<u8>,
    with_pixels: bool,
    atlases: Vec<Atlas>,
    placed: HashSet<String>,
}

impl AtlasSet {
    /// Atlas set composing pixels into RGBA canvases.
    pub fn new(cfg: &AtlasConfig) -> Self {
        Self::create(cfg, true)
    }

    /// Atlas set tracking geometry only.
    pub fn layout_only(cfg: &AtlasConfig) -> Self {
        Self::create(cfg, false)
    }

    fn create(cfg: &AtlasConfig, with_pixels: bool) -> Self {
        let mut set = Self {
            width: cfg.width,
            height: cfg.height,
            background: Rgba(cfg.background),
            with_pixels,
            atlases: Vec::new(),
            placed: HashSet::new(),
        };
        let first = set.new_atlas();
        set.atlases.push(first);
        set
    }

    pub fn atlases(&self) -> &[Atlas] {
        &self.atlases
    }

    pub fn len(&self) -> usize {
        self.atlases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atlases.is_empty()
    }

    pub fn into_atlases(self) -> Vec<Atlas> {
        self.atlases
    }

    /// Place an image; returns the atlas id and rectangle it landed on.
    pub fn place_image(&mut self, key: &str, image: &RgbaImage) -> Result<(usize, Rect)> {
        let (w, h) = image.dimensions();
        self.place(key, w, h, Some(image))
    }

    /// Place a size without pixels; returns the atlas id and rectangle.
    pub fn place_rect(&mut self, key: &str, w: u32, h: u32) -> Result<(usize, Rect)> {
        self.place(key, w, h, None)
    }

    fn place(
        &mut self,
        key: &str,
        w: u32,
        h: u32,
        pixels: Option<&RgbaImage>,
    ) -> Result<(usize, Rect)> {
        if w > self.width || h > self.height {
            return Err(AtlasGenError::OversizedImage {
                key: key.to_string(),
                width: w,
                height: h,
                atlas_width: self.width,
                atlas_height: self.height,
            });
        }
        if self.placed.contains(key) {
            return Err(AtlasGenError::DuplicateKey(key.to_string()));
        }
        let found = self
            .atlases
            .iter_mut()
            .find_map(|atlas| atlas.insert(key, w, h, pixels).map(|rect| (atlas.id(), rect)));
        if let Some(hit) = found {
            self.placed.insert(key.to_string());
            return Ok(hit);
        }
        let mut atlas = self.new_atlas();
        let rect = atlas.insert(key, w, h, pixels).ok_or_else(|| {
            AtlasGenError::InvalidInput(format!("'{}' ({}x{}) cannot be placed", key, w, h))
        })?;
        let id = atlas.id();
        debug!(atlas = id + 1, key, "opened new atlas");
        self.atlases.push(atlas);
        self.placed.insert(key.to_string());
        Ok((id, rect))
    }

    fn new_atlas(&self) -> Atlas {
        let id = self.atlases.len();
        if self.with_pixels {
            Atlas::with_background(id, self.width, self.height, self.background)
        } else {
            Atlas::layout_only(id, self.width, self.height)
        }
    }
}

#[instrument(skip_all)]
/// Packs `inputs` into fixed-size atlases using `cfg` and returns metadata and RGBA pages.
///
/// Notes:
/// - The first atlas always exists, so empty input yields one empty page.
/// - Inputs are validated up front; an oversized image or a duplicate name aborts
///   the whole run before anything is placed.
/// - Placement order is descending area then ascending name, independent of input order.
pub fn pack_images(inputs: Vec<InputImage>, cfg: AtlasConfig) -> Result<PackOutput> {
    cfg.validate()?;
    validate_items(&inputs, &cfg)?;

    let mut prepared = prepare_inputs(inputs);
    sort_for_placement(&mut prepared);

    let mut set = AtlasSet::new(&cfg);
    let total = prepared.len();
    for (n, p) in prepared.iter().enumerate() {
        let (atlas, rect) = set.place_image(&p.key, &p.rgba)?;
        debug!(key = %p.key, atlas = atlas + 1, x = rect.x, y = rect.y, "placed ({}/{})", n + 1, total);
    }
    info!(atlases = set.len(), images = total, "placement finished");

    let meta = Meta::new(cfg.width, cfg.height);
    let mut pages = Vec::with_capacity(set.len());
    let mut layout_pages = Vec::with_capacity(set.len());
    for atlas in set.into_atlases() {
        let (page, canvas) = atlas.into_parts();
        let rgba = canvas.ok_or_else(|| {
            AtlasGenError::InvalidInput(format!("atlas {} has no canvas", page.id + 1))
        })?;
        layout_pages.push(page.clone());
        pages.push(OutputPage { page, rgba });
    }
    Ok(PackOutput {
        layout: Layout {
            pages: layout_pages,
            meta,
        },
        pages,
    })
}

// ---------------- Layout-only API ----------------

#[instrument(skip_all)]
/// Packs sizes into atlases without compositing pixel data.
/// Inputs are (key, width, height). Geometry matches `pack_images` for the same sizes.
pub fn pack_layout<K: Into<String>>(inputs: Vec<(K, u32, u32)>, cfg: AtlasConfig) -> Result<Layout> {
    cfg.validate()?;
    let mut items: Vec<(String, u32, u32)> = inputs
        .into_iter()
        .map(|(k, w, h)| (k.into(), w, h))
        .collect();
    validate_items(&items, &cfg)?;
    sort_for_placement(&mut items);

    let mut set = AtlasSet::layout_only(&cfg);
    for (key, w, h) in &items {
        let (atlas, rect) = set.place_rect(key, *w, *h)?;
        debug!(key = %key, atlas = atlas + 1, x = rect.x, y = rect.y, "placed");
    }

    Ok(Layout {
        pages: set.atlases().iter().map(Atlas::page).collect(),
        meta: Meta::new(cfg.width, cfg.height),
    })
}

fn prepare_inputs(inputs: Vec<InputImage>) -> Vec<Prep> {
    let convert = |inp: InputImage| Prep {
        key: inp.key,
        rgba: inp.image.into_rgba8(),
    };
    #[cfg(feature = "parallel")]
    {
        inputs.into_par_iter().map(convert).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        inputs.into_iter().map(convert).collect()
    }
}
