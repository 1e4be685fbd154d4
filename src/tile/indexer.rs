//! Geometry indexer: assigns stable indices to decoded vector-tile features.

use std::collections::HashMap;

use geozero::{
    error::GeozeroError, ColumnValue, FeatureProcessor, GeomProcessor, GeozeroDatasource,
    PropertyProcessor,
};
use lyon::math::point;
use thiserror::Error;

use crate::tile::{FeatureId, GeometryType, IndexedFeature, TileFeature, TileLayer};

#[derive(Error, Debug)]
pub enum IndexError {
    /// Decoding the layer's feature stream failed
    #[error("processing vector layer failed")]
    Processing(#[from] GeozeroError),
}

/// A processor which collects each feature's rings/lines and properties into
/// [`TileFeature`] records.
pub struct FeatureIndexer {
    features: Vec<TileFeature>,
    current: TileFeature,
    ring: Vec<lyon::math::Point>,
    is_point: bool,
}

impl FeatureIndexer {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            current: TileFeature::default(),
            ring: Vec::new(),
            is_point: false,
        }
    }

    fn end_ring(&mut self) {
        if !self.ring.is_empty() {
            let ring = std::mem::take(&mut self.ring);
            self.current.geometry.push(ring);
        }
    }
}

impl Default for FeatureIndexer {
    fn default() -> Self {
        Self::new()
    }
}

impl GeomProcessor for FeatureIndexer {
    fn xy(&mut self, x: f64, y: f64, _idx: usize) -> Result<(), GeozeroError> {
        if self.is_point {
            // Every point stands alone
            self.current.geometry.push(vec![point(x as f32, y as f32)]);
        } else {
            self.ring.push(point(x as f32, y as f32));
        }
        Ok(())
    }

    fn point_begin(&mut self, _idx: usize) -> Result<(), GeozeroError> {
        self.is_point = true;
        self.current.geometry_type = Some(GeometryType::Point);
        Ok(())
    }

    fn point_end(&mut self, _idx: usize) -> Result<(), GeozeroError> {
        self.is_point = false;
        Ok(())
    }

    fn multipoint_begin(&mut self, _size: usize, _idx: usize) -> Result<(), GeozeroError> {
        self.is_point = true;
        self.current.geometry_type = Some(GeometryType::Point);
        Ok(())
    }

    fn multipoint_end(&mut self, _idx: usize) -> Result<(), GeozeroError> {
        self.is_point = false;
        Ok(())
    }

    fn linestring_begin(
        &mut self,
        tagged: bool,
        _size: usize,
        _idx: usize,
    ) -> Result<(), GeozeroError> {
        if tagged {
            self.current.geometry_type = Some(GeometryType::Line);
        }
        Ok(())
    }

    fn linestring_end(&mut self, _tagged: bool, _idx: usize) -> Result<(), GeozeroError> {
        self.end_ring();
        Ok(())
    }

    fn multilinestring_begin(&mut self, _size: usize, _idx: usize) -> Result<(), GeozeroError> {
        self.current.geometry_type = Some(GeometryType::Line);
        Ok(())
    }

    fn polygon_begin(&mut self, _tagged: bool, _size: usize, _idx: usize) -> Result<(), GeozeroError> {
        self.current.geometry_type = Some(GeometryType::Polygon);
        Ok(())
    }
}

impl PropertyProcessor for FeatureIndexer {
    fn property(
        &mut self,
        _idx: usize,
        name: &str,
        value: &ColumnValue,
    ) -> Result<bool, GeozeroError> {
        self.current
            .properties
            .insert(name.to_string(), value.to_string());
        Ok(true)
    }
}

impl FeatureProcessor for FeatureIndexer {
    fn feature_end(&mut self, _idx: u64) -> Result<(), GeozeroError> {
        self.end_ring();
        let feature = std::mem::take(&mut self.current);
        self.features.push(feature);
        Ok(())
    }
}

/// Index one decoded MVT layer: produce an [`IndexedFeature`] per feature,
/// with indices stable for the lifetime of the tile.
pub fn index_layer(
    layer: &mut geozero::mvt::tile::Layer,
    source_layer_index: u32,
) -> Result<Vec<IndexedFeature>, IndexError> {
    let mut indexer = FeatureIndexer::new();
    layer.process(&mut indexer)?;

    let mut features = indexer.features;

    // geozero does not surface MVT feature ids; read them off the raw layer.
    for (feature, raw) in features.iter_mut().zip(layer.features.iter()) {
        feature.id = raw.id.map(FeatureId::Number);
    }

    Ok(features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| IndexedFeature {
            id: feature.id.clone(),
            feature,
            index: index as u32,
            source_layer_index,
        })
        .collect())
}

/// Convert an indexed MVT layer into the thin [`TileLayer`] view which
/// `update` re-reads raw properties from.
pub fn to_tile_layer(name: &str, extent: u32, features: &[IndexedFeature]) -> TileLayer {
    TileLayer {
        name: name.to_string(),
        extent,
        features: features.iter().map(|f| f.feature.clone()).collect(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use geozero::mvt::tile;

    use super::index_layer;
    use crate::tile::{FeatureId, GeometryType};

    /// Encode a square polygon ring as MVT geometry commands.
    pub(crate) fn square_polygon_geometry() -> Vec<u32> {
        fn zigzag(v: i32) -> u32 {
            ((v << 1) ^ (v >> 31)) as u32
        }
        let move_to = |count: u32| (1 | (count << 3));
        let line_to = |count: u32| (2 | (count << 3));
        let close_path = 7 | (1 << 3);

        vec![
            move_to(1),
            zigzag(0),
            zigzag(0),
            line_to(3),
            zigzag(10),
            zigzag(0),
            zigzag(0),
            zigzag(10),
            zigzag(-10),
            zigzag(0),
            close_path,
        ]
    }

    pub(crate) fn test_layer() -> tile::Layer {
        tile::Layer {
            name: "land".to_string(),
            features: vec![tile::Feature {
                id: Some(42),
                tags: vec![0, 0],
                r#type: Some(tile::GeomType::Polygon as i32),
                geometry: square_polygon_geometry(),
            }],
            keys: vec!["class".to_string()],
            values: vec![tile::Value {
                string_value: Some("grass".to_string()),
                ..Default::default()
            }],
            extent: Some(4096),
            ..Default::default()
        }
    }

    #[test]
    fn indexes_features_with_ids_and_properties() {
        let mut layer = test_layer();
        let indexed = index_layer(&mut layer, 3).unwrap();

        assert_eq!(indexed.len(), 1);
        let feature = &indexed[0];
        assert_eq!(feature.index, 0);
        assert_eq!(feature.source_layer_index, 3);
        assert_eq!(feature.id, Some(FeatureId::Number(42)));
        assert_eq!(feature.feature.geometry_type, Some(GeometryType::Polygon));
        assert_eq!(feature.feature.geometry.len(), 1);
        // ClosePath may or may not re-emit the first vertex depending on the reader
        assert!(feature.feature.geometry[0].len() >= 4);
        assert_eq!(
            feature.feature.properties.get("class").map(String::as_str),
            Some("grass")
        );
    }
}
