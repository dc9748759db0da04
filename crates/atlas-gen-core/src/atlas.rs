use crate::model::{Frame, Page, Rect};
use crate::packer::{Packer, TreePacker};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;

/// One fixed-size atlas: a packer tree, the composed pixels and the
/// name → rectangle manifest of everything placed on it.
///
/// Placements are kept unordered; `manifest` sorts them by name on demand.
pub struct Atlas {
    id: usize,
    packer: TreePacker,
    canvas: Option<RgbaImage>,
    placements: HashMap<String, Rect>,
}

impl Atlas {
    /// Create an atlas with a fully transparent canvas.
    pub fn new(id: usize, width: u32, height: u32) -> Self {
        Self::with_background(id, width, height, Rgba([0, 0, 0, 0]))
    }

    /// Create an atlas whose canvas starts filled with `background`.
    pub fn with_background(id: usize, width: u32, height: u32, background: Rgba<u8>) -> Self {
        Self {
            id,
            packer: TreePacker::new(width, height),
            canvas: Some(RgbaImage::from_pixel(width, height, background)),
            placements: HashMap::new(),
        }
    }

    /// Create an atlas that only tracks geometry (no pixel canvas).
    pub fn layout_only(id: usize, width: u32, height: u32) -> Self {
        Self {
            id,
            packer: TreePacker::new(width, height),
            canvas: None,
            placements: HashMap::new(),
        }
    }

    /// Zero-based creation index.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.packer.root_rect().w
    }

    pub fn height(&self) -> u32 {
        self.packer.root_rect().h
    }

    /// Number of images placed.
    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    /// Rectangle assigned to `key`, if it was placed here.
    pub fn get(&self, key: &str) -> Option<Rect> {
        self.placements.get(key).copied()
    }

    /// The composed pixels, `None` for layout-only atlases.
    pub fn canvas(&self) -> Option<&RgbaImage> {
        self.canvas.as_ref()
    }

    /// Place `image` and copy its pixels to the assigned rectangle.
    ///
    /// Returns `false` if no free space is large enough; the atlas is unchanged
    /// in that case and retrying the same image here is pointless.
    pub fn add_image(&mut self, key: &str, image: &RgbaImage) -> bool {
        let (w, h) = image.dimensions();
        self.insert(key, w, h, Some(image)).is_some()
    }

    /// Place a `w x h` rectangle without pixel data.
    pub fn add_rect(&mut self, key: &str, w: u32, h: u32) -> Option<Rect> {
        self.insert(key, w, h, None)
    }

    /// Manifest entries sorted by name.
    pub fn manifest(&self) -> Vec<Frame> {
        let mut frames: Vec<Frame> = self
            .placements
            .iter()
            .map(|(key, rect)| Frame {
                key: key.clone(),
                frame: *rect,
            })
            .collect();
        frames.sort_by(|a, b| a.key.cmp(&b.key));
        frames
    }

    /// Logical page record of this atlas.
    pub fn page(&self) -> Page {
        Page {
            id: self.id,
            width: self.width(),
            height: self.height(),
            frames: self.manifest(),
        }
    }

    /// Splits the atlas into its page record and canvas.
    pub fn into_parts(self) -> (Page, Option<RgbaImage>) {
        let page = self.page();
        (page, self.canvas)
    }

    pub(crate) fn insert(
        &mut self,
        key: &str,
        w: u32,
        h: u32,
        pixels: Option<&RgbaImage>,
    ) -> Option<Rect> {
        if self.placements.contains_key(key) {
            return None;
        }
        let frame = self
            .packer
            .pack(key.to_string(), &Rect::new(0, 0, w, h))?;
        if let (Some(canvas), Some(src)) = (self.canvas.as_mut(), pixels) {
            crate::compositing::blit_rgba(src, canvas, frame.frame.x, frame.frame.y);
        }
        self.placements.insert(frame.key, frame.frame);
        Some(frame.frame)
    }
}
