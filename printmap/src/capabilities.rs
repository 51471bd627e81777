//! Tile layer descriptions handed over by the capabilities reader.
//!
//! Walking the capabilities XML is the reader's job. This module holds the
//! shape of what it discovers per tile layer and sorts the advertised
//! resolutions into a [`ResolutionTable`].

use crate::tiers::{ResolutionTable, ResolutionTier, TierError};
use thiserror::Error;

/// Errors for malformed tile layer descriptions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilitiesError {
    /// Tile width or height is zero
    #[error("layer '{layer}' has an empty tile size {width}x{height}")]
    EmptyTileSize {
        layer: String,
        width: u32,
        height: u32,
    },

    /// Bounding box is inverted or not finite
    #[error("layer '{layer}' has an invalid bounding box")]
    InvalidBoundingBox { layer: String },

    /// Resolution list could not be turned into tiers
    #[error("layer '{layer}' resolutions: {source}")]
    Resolutions {
        layer: String,
        #[source]
        source: TierError,
    },
}

/// Extent of a layer in its native coordinate system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    fn is_valid(&self) -> bool {
        [self.min_x, self.min_y, self.max_x, self.max_y]
            .iter()
            .all(|v| v.is_finite())
            && self.min_x <= self.max_x
            && self.min_y <= self.max_y
    }
}

/// A tile layer discovered in a TileCache/WMS-C capabilities document.
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayerInfo {
    name: String,
    width: u32,
    height: u32,
    extension: String,
    bbox: BoundingBox,
    resolutions: ResolutionTable,
}

impl TileLayerInfo {
    /// Builds a layer description from raw capabilities values.
    ///
    /// `resolutions` may arrive in any order. `format` may be a MIME type
    /// (`image/png`) or a bare extension (`png`).
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: &str,
        bbox: BoundingBox,
        resolutions: impl IntoIterator<Item = f64>,
    ) -> Result<Self, CapabilitiesError> {
        let name = name.into();

        if width == 0 || height == 0 {
            return Err(CapabilitiesError::EmptyTileSize {
                layer: name,
                width,
                height,
            });
        }
        if !bbox.is_valid() {
            return Err(CapabilitiesError::InvalidBoundingBox { layer: name });
        }

        let resolutions = match ResolutionTable::new(resolutions) {
            Ok(table) => table,
            Err(source) => return Err(CapabilitiesError::Resolutions { layer: name, source }),
        };

        Ok(Self {
            name,
            width,
            height,
            extension: format_extension(format),
            bbox,
            resolutions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image file extension, e.g. `png`.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn min_x(&self) -> f64 {
        self.bbox.min_x
    }

    pub fn min_y(&self) -> f64 {
        self.bbox.min_y
    }

    pub fn resolutions(&self) -> &ResolutionTable {
        &self.resolutions
    }

    /// Server resolution closest to the one the print needs.
    pub fn nearest_resolution(&self, target: f64) -> ResolutionTier {
        self.resolutions.nearest(target)
    }

    /// Ground extent covered by one tile at `tier`, as (width, height).
    pub fn tile_ground_size(&self, tier: ResolutionTier) -> (f64, f64) {
        (
            tier.value * f64::from(self.width),
            tier.value * f64::from(self.height),
        )
    }

    /// Column and row of the tile containing the ground point `(x, y)`.
    ///
    /// Tiles are counted from the bounding box's lower left corner.
    pub fn tile_index(&self, tier: ResolutionTier, x: f64, y: f64) -> (u64, u64) {
        let (tile_w, tile_h) = self.tile_ground_size(tier);
        let col = ((x - self.bbox.min_x) / tile_w).floor().max(0.0);
        let row = ((y - self.bbox.min_y) / tile_h).floor().max(0.0);
        (col as u64, row as u64)
    }

    /// TileCache path for a tile, appended to `base_url`.
    ///
    /// Layout: `1.0.0/{layer}/{zz}/{xxx}/{xxx}/{xxx}/{yyy}/{yyy}/{yyy}.{ext}`.
    pub fn tile_url(&self, base_url: &str, tier: ResolutionTier, col: u64, row: u64) -> String {
        format!(
            "{}/1.0.0/{}/{:02}/{:03}/{:03}/{:03}/{:03}/{:03}/{:03}.{}",
            base_url.trim_end_matches('/'),
            self.name,
            tier.index,
            col / 1_000_000,
            (col / 1000) % 1000,
            col % 1000,
            row / 1_000_000,
            (row / 1000) % 1000,
            row % 1000,
            self.extension
        )
    }
}

/// Reduces `image/png; mode=8bit` style formats to a file extension.
fn format_extension(format: &str) -> String {
    let format = format.split(';').next().unwrap_or(format).trim();
    let ext = format.rsplit('/').next().unwrap_or(format);
    match ext.to_lowercase().as_str() {
        "jpg" | "jpeg" => "jpeg".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn swiss_layer(resolutions: &[f64]) -> TileLayerInfo {
        TileLayerInfo::new(
            "cn",
            256,
            256,
            "image/png",
            BoundingBox::new(155000.0, -253050.0, 1365000.0, 583050.0),
            resolutions.iter().copied(),
        )
        .unwrap()
    }

    #[test]
    fn test_layer_shape() {
        let layer = swiss_layer(&[800.0, 400.0, 200.0, 100.0, 50.0, 20.0, 10.0, 5.0, 2.5]);

        assert_eq!(layer.name(), "cn");
        assert_eq!(layer.width(), 256);
        assert_eq!(layer.height(), 256);
        assert_eq!(layer.extension(), "png");
        assert!((layer.min_x() - 155000.0).abs() < 0.00001);
        assert!((layer.min_y() + 253050.0).abs() < 0.00001);
        assert_eq!(
            layer.nearest_resolution(4.99999),
            ResolutionTier { index: 7, value: 5.0 }
        );
    }

    #[test]
    fn test_weird_resolution_order() {
        let layer = swiss_layer(&[400.0, 800.0, 200.0, 100.0, 50.0, 20.0, 10.0, 5.0, 2.5]);

        assert_eq!(
            layer.resolutions().values(),
            vec![800.0, 400.0, 200.0, 100.0, 50.0, 20.0, 10.0, 5.0, 2.5]
        );
        assert_eq!(
            layer.nearest_resolution(1000.0),
            ResolutionTier { index: 0, value: 800.0 }
        );
    }

    #[test]
    fn test_tile_url_layout() {
        let layer = swiss_layer(&[800.0, 400.0]);
        let tier = layer.resolutions().get(1).unwrap();

        let url = layer.tile_url("http://tiles.example.com/tilecache/", tier, 1_234_567, 12);
        assert_eq!(
            url,
            "http://tiles.example.com/tilecache/1.0.0/cn/01/001/234/567/000/000/012.png"
        );
    }

    #[test]
    fn test_tile_index() {
        let layer = swiss_layer(&[10.0]);
        let tier = layer.nearest_resolution(10.0);

        assert_eq!(layer.tile_ground_size(tier), (2560.0, 2560.0));
        assert_eq!(layer.tile_index(tier, 155000.0 + 2560.0 * 3.5, -253050.0 + 10.0), (3, 0));
        assert_eq!(layer.tile_index(tier, 0.0, -300000.0), (0, 0));
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(format_extension("image/png"), "png");
        assert_eq!(format_extension("image/jpeg"), "jpeg");
        assert_eq!(format_extension("jpg"), "jpeg");
        assert_eq!(format_extension("image/png; mode=8bit"), "png");
    }

    #[test]
    fn test_invalid_layers() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            TileLayerInfo::new("a", 0, 256, "png", bbox, [1.0]),
            Err(CapabilitiesError::EmptyTileSize { .. })
        ));
        assert!(matches!(
            TileLayerInfo::new("a", 256, 256, "png", BoundingBox::new(2.0, 0.0, 1.0, 1.0), [1.0]),
            Err(CapabilitiesError::InvalidBoundingBox { .. })
        ));
        assert!(matches!(
            TileLayerInfo::new("a", 256, 256, "png", bbox, Vec::<f64>::new()),
            Err(CapabilitiesError::Resolutions { .. })
        ));
    }
}
