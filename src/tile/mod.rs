//! Decoded tile features and the feature-state model.

pub mod indexer;

use std::collections::HashMap;

use lyon::math::Point;

/// A feature id as carried by vector tiles: numeric in the common case,
/// string for sources which use string ids.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum FeatureId {
    Number(u64),
    String(String),
}

impl From<u64> for FeatureId {
    fn from(id: u64) -> Self {
        FeatureId::Number(id)
    }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self {
        FeatureId::String(id.to_string())
    }
}

/// Geometry class of a decoded feature.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GeometryType {
    Point,
    Line,
    Polygon,
}

/// A decoded vector-tile feature: rings/lines of points in tile space
/// (`0..EXTENT`) plus its raw properties.
#[derive(Debug, Clone, Default)]
pub struct TileFeature {
    pub id: Option<FeatureId>,
    pub geometry_type: Option<GeometryType>,
    /// Ordered sequence of rings (polygons) or lines.
    pub geometry: Vec<Vec<Point>>,
    pub properties: HashMap<String, String>,
}

/// A single named layer of a decoded tile.
#[derive(Debug, Clone)]
pub struct TileLayer {
    pub name: String,
    pub extent: u32,
    pub features: Vec<TileFeature>,
}

/// A feature paired with the stable indices the geometry indexer assigned.
/// Immutable once produced.
#[derive(Debug, Clone)]
pub struct IndexedFeature {
    pub feature: TileFeature,
    pub id: Option<FeatureId>,
    /// Position of the feature within its source layer.
    pub index: u32,
    pub source_layer_index: u32,
}

/// Live state attached to a feature from outside the tile, keyed by state
/// name. Never owned by a bucket.
pub type FeatureState = HashMap<String, serde_json::Value>;

/// All feature states of a source, keyed by feature id.
pub type FeatureStates = HashMap<FeatureId, FeatureState>;
