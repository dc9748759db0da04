use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Manifest flavours written next to each atlas image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ManifestFormat {
    /// One `name x y width height` line per image, sorted by name.
    #[default]
    Txt,
    /// `{ frames: { name: { frame, page, pageSize } }, meta }`.
    Json,
}

impl ManifestFormat {
    /// File extension used for this manifest flavour.
    pub fn extension(&self) -> &'static str {
        match self {
            ManifestFormat::Txt => "txt",
            ManifestFormat::Json => "json",
        }
    }
}

impl FromStr for ManifestFormat {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

/// Configuration of one packing run. Every atlas produced shares `width` x `height`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtlasConfig {
    /// Atlas width in pixels.
    pub width: u32,
    /// Atlas height in pixels.
    pub height: u32,
    #[serde(default)]
    pub manifest_format: ManifestFormat,
    /// RGBA fill of fresh canvases.
    #[serde(default = "default_background")]
    pub background: [u8; 4],
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            width: 2048,
            height: 2048,
            manifest_format: ManifestFormat::default(),
            background: default_background(),
        }
    }
}

impl AtlasConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if either dimension is zero.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AtlasGenError;

        if self.width == 0 || self.height == 0 {
            return Err(AtlasGenError::InvalidDimensions {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

fn default_background() -> [u8; 4] {
    [0, 0, 0, 0]
}

/// Builder for `AtlasConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct AtlasConfigBuilder {
    cfg: AtlasConfig,
}

impl AtlasConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: AtlasConfig::default(),
        }
    }
    pub fn with_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.width = w;
        self.cfg.height = h;
        self
    }
    pub fn manifest_format(mut self, v: ManifestFormat) -> Self {
        self.cfg.manifest_format = v;
        self
    }
    pub fn background(mut self, v: [u8; 4]) -> Self {
        self.cfg.background = v;
        self
    }
    pub fn build(self) -> AtlasConfig {
        self.cfg
    }
}

impl AtlasConfig {
    /// Create a fluent builder for `AtlasConfig`.
    pub fn builder() -> AtlasConfigBuilder {
        AtlasConfigBuilder::new()
    }
}
