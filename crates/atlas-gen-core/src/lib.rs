//! Core library for packing images into fixed-size texture atlases.
//!
//! - Algorithm: binary space-partitioning tree per atlas (first-fit, depth-first,
//!   split along the axis with the larger slack)
//! - Ordering: descending area, ties broken by ascending name
//! - Overflow: atlases are tried in creation order; a new one is opened when none accepts an image
//! - Pipeline: `pack_images` takes in-memory images and returns RGBA pages + manifests;
//!   `pack_layout` does the same for bare sizes
//!
//! Quick example:
//! ```ignore
//! use image::ImageReader;
//! use atlas_gen_core::{AtlasConfig, InputImage, pack_images};
//! # fn main() -> anyhow::Result<()> {
//! let img1 = ImageReader::open("a.png")?.decode()?;
//! let img2 = ImageReader::open("b.png")?.decode()?;
//! let inputs = vec![
//!   InputImage { key: "a".into(), image: img1 },
//!   InputImage { key: "b".into(), image: img2 },
//! ];
//! let cfg = AtlasConfig::builder().with_dimensions(1024, 1024).build();
//! let out = pack_images(inputs, cfg)?;
//! println!("atlases: {}", out.pages.len());
//! # Ok(()) }
//! ```

pub mod atlas;
pub mod compositing;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod packer;
pub mod pipeline;

pub use atlas::*;
pub use config::*;
pub use error::*;
pub use export::*;
pub use model::*;
pub use packer::*;
pub use pipeline::*;

/// Convenience prelude for common types and functions.
/// Importing `atlas_gen_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::atlas::Atlas;
    pub use crate::config::{AtlasConfig, AtlasConfigBuilder, ManifestFormat};
    pub use crate::error::{AtlasGenError, Result};
    pub use crate::export::{WrittenPage, to_json_manifest, to_manifest_text, write_page};
    pub use crate::model::{Frame, Meta, PackStats, Page, Rect};
    pub use crate::packer::{Packer, TreePacker};
    pub use crate::pipeline::{AtlasSet, Layout, Placeable, sort_for_placement};
    pub use crate::{InputImage, OutputPage, PackOutput, pack_images, pack_layout};
}
