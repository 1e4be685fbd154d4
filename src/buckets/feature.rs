//! Bucket-internal feature normalization.

use std::collections::HashMap;

use lyon::math::Point;

use crate::{
    coords::CanonicalTileId,
    style::layer::StyleLayer,
    tile::{FeatureId, GeometryType, IndexedFeature},
};

/// Pattern image names for the zoom levels below, at and above the tile's
/// own, so a fractionally zoomed tile can blend between atlas entries.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PatternNames {
    pub min: String,
    pub mid: String,
    pub max: String,
}

impl PatternNames {
    /// All three zoom keys resolve to the same image. This is always the case
    /// for patterns which do not depend on zoom.
    pub fn constant(name: String) -> Self {
        Self {
            min: name.clone(),
            max: name.clone(),
            mid: name,
        }
    }
}

/// A feature as a bucket owns it: geometry plus everything needed to place
/// and later re-style it. Derived from an [`IndexedFeature`] during
/// population; owned exclusively by one bucket.
#[derive(Debug, Clone)]
pub struct BucketFeature {
    pub index: u32,
    pub source_layer_index: u32,
    pub id: Option<FeatureId>,
    pub geometry_type: Option<GeometryType>,
    pub geometry: Vec<Vec<Point>>,
    pub properties: HashMap<String, String>,
    pub sort_key: Option<f32>,
    pub pattern: Option<PatternNames>,
}

impl BucketFeature {
    /// Normalize an indexed feature for the given primary style layer.
    /// `_canonical` fixes the zoom the pattern keys refer to.
    pub fn from_indexed(
        feature: &IndexedFeature,
        layer: &StyleLayer,
        _canonical: &CanonicalTileId,
    ) -> Self {
        let pattern = layer
            .paint
            .as_ref()
            .and_then(|paint| paint.pattern_property())
            .and_then(|property| property.evaluate(&feature.feature.properties))
            .map(PatternNames::constant);

        let sort_key = layer
            .layout
            .as_ref()
            .and_then(|layout| layout.sort_key.as_ref())
            .and_then(|property_name| feature.feature.properties.get(property_name))
            .and_then(|value| value.parse::<f32>().ok());

        Self {
            index: feature.index,
            source_layer_index: feature.source_layer_index,
            id: feature.id.clone(),
            geometry_type: feature.feature.geometry_type,
            geometry: feature.feature.geometry.clone(),
            properties: feature.feature.properties.clone(),
            sort_key,
            pattern,
        }
    }
}
