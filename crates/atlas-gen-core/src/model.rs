use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle (pixels). `x,y` is top-left; `w,h` are sizes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }
    pub fn area(&self) -> u64 {
        (self.w as u64) * (self.h as u64)
    }
    /// Inclusive right edge coordinate (`x + w - 1`).
    pub fn right(&self) -> u32 {
        self.x + self.w.saturating_sub(1)
    }
    /// Inclusive bottom edge coordinate (`y + h - 1`).
    pub fn bottom(&self) -> u32 {
        self.y + self.h.saturating_sub(1)
    }
    /// Returns true if `r` is fully inside `self` (inclusive edges).
    pub fn contains(&self, r: &Rect) -> bool {
        r.x >= self.x && r.y >= self.y && r.right() <= self.right() && r.bottom() <= self.bottom()
    }
    /// Returns true if the two rectangles share at least one pixel.
    pub fn intersects(&self, r: &Rect) -> bool {
        let a_x2 = self.x + self.w;
        let a_y2 = self.y + self.h;
        let b_x2 = r.x + r.w;
        let b_y2 = r.y + r.h;
        !(self.x >= b_x2 || r.x >= a_x2 || self.y >= b_y2 || r.y >= a_y2)
    }
    /// True if `w` x `h` fits inside this rectangle.
    pub fn fits(&self, w: u32, h: u32) -> bool {
        w <= self.w && h <= self.h
    }
}

/// A placed frame within a page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frame<K = String> {
    /// Logical image name (relative path without extension).
    pub key: K,
    /// Placed rectangle within the page. Always the source size, never scaled.
    pub frame: Rect,
}

/// A single atlas page (logical record). Frames are sorted by key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<K = String> {
    /// Zero-based creation index; output files use `id + 1`.
    pub id: usize,
    pub width: u32,
    pub height: u32,
    pub frames: Vec<Frame<K>>,
}

/// Run-level metadata shared by every page (used by the JSON manifest).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Meta {
    pub app: String,
    pub version: String,
    pub format: String,
    /// Fixed atlas size of this run.
    pub size: (u32, u32),
}

impl Meta {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            app: "atlas-gen".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            format: "RGBA8888".into(),
            size: (width, height),
        }
    }
}

/// Statistics about atlas packing efficiency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PackStats {
    /// Total number of pages (atlases) produced.
    pub num_pages: usize,
    /// Total number of frames (images) packed.
    pub num_frames: usize,
    /// Total area of all pages (sum of width * height for each page).
    pub total_page_area: u64,
    /// Total area used by all frames (sum of frame width * height).
    pub used_frame_area: u64,
    /// Occupancy ratio: used_frame_area / total_page_area (0.0 to 1.0).
    pub occupancy: f64,
}

impl PackStats {
    pub fn from_pages<K>(pages: &[Page<K>]) -> Self {
        let mut num_frames = 0;
        let mut total_page_area = 0u64;
        let mut used_frame_area = 0u64;
        for page in pages {
            total_page_area += (page.width as u64) * (page.height as u64);
            for frame in &page.frames {
                num_frames += 1;
                used_frame_area += frame.frame.area();
            }
        }
        let occupancy = if total_page_area > 0 {
            used_frame_area as f64 / total_page_area as f64
        } else {
            0.0
        };
        PackStats {
            num_pages: pages.len(),
            num_frames,
            total_page_area,
            used_frame_area,
            occupancy,
        }
    }

    /// Returns a human-readable summary of the statistics.
    pub fn summary(&self) -> String {
        format!(
            "Pages: {}, Frames: {}, Occupancy: {:.2}%, Total Area: {} px², Used Area: {} px²",
            self.num_pages,
            self.num_frames,
            self.occupancy * 100.0,
            self.total_page_area,
            self.used_frame_area,
        )
    }

    /// Returns wasted space in pixels.
    pub fn wasted_area(&self) -> u64 {
        self.total_page_area.saturating_sub(self.used_frame_area)
    }

    /// Returns wasted space as a percentage (0.0 to 100.0).
    pub fn waste_percentage(&self) -> f64 {
        if self.total_page_area > 0 {
            (self.wasted_area() as f64 / self.total_page_area as f64) * 100.0
        } else {
            0.0
        }
    }
}
