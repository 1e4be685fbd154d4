//! The `Bucket` abstraction: per-tile, per-layer-group conversion of vector
//! features into GPU-ready geometry.
//!
//! Buckets are built in a background context, transferred to the render
//! context (see [`crate::transfer`]), re-bound to live style layers via
//! [`deserialize`] and uploaded through [`crate::render::UploadContext`].

pub mod array_group;
pub mod feature;
mod fill_bucket;
mod line_bucket;

use std::{cell::RefCell, collections::HashMap, collections::HashSet, ops::Range, rc::Rc};

use cint::{Alpha, EncodedSrgb};
use lyon::math::Point;
use serde_json::{Map, Value};

pub use fill_bucket::FillBucket;
pub use line_bucket::LineBucket;

use crate::{
    buckets::{array_group::ArrayGroup, feature::BucketFeature},
    coords::{CanonicalTileId, ZoomLevel},
    render::{
        buffer_group::BufferGroup,
        image_atlas::ImagePositions,
        shaders::{ShaderFeatureStyle, ShaderLayerMetadata},
        UploadContext,
    },
    style::{
        layer::{LayerPaint, StyleLayer},
        Style,
    },
    tessellation::SubdivisionGranularity,
    tile::{FeatureStates, IndexedFeature, TileLayer},
};

/// A collision box contributed by a feature, in tile space. Placement runs
/// elsewhere; buckets only populate the array.
#[derive(Debug, Clone)]
pub struct CollisionBox {
    pub anchor: Point,
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub feature_index: u32,
}

pub type CollisionBoxArray = Vec<CollisionBox>;

/// Records which features ended up in which bucket, for hit testing.
#[derive(Debug, Default)]
pub struct FeatureIndex {
    entries: Vec<FeatureIndexEntry>,
}

#[derive(Debug, Clone)]
pub struct FeatureIndexEntry {
    pub index: u32,
    pub source_layer_index: u32,
    pub bucket_index: u32,
}

impl FeatureIndex {
    pub fn insert(&mut self, index: u32, source_layer_index: u32, bucket_index: u32) {
        self.entries.push(FeatureIndexEntry {
            index,
            source_layer_index,
            bucket_index,
        });
    }

    pub fn entries(&self) -> &[FeatureIndexEntry] {
        &self.entries
    }
}

/// Shared parameters a bucket is seeded with at creation time.
#[derive(Debug, Clone)]
pub struct BucketParameters {
    /// Position of this bucket within the tile's bucket list.
    pub index: u32,
    /// Style layers sharing this bucket's layout, in style order.
    pub layers: Vec<StyleLayer>,
    pub zoom: ZoomLevel,
    pub pixel_ratio: f32,
    pub overscaling: f32,
    pub source_layer_index: u32,
    pub source_id: String,
    pub global_state: Map<String, Value>,
}

/// Collaborators a build pass writes into while populating.
pub struct PopulateParameters<'a> {
    pub feature_index: &'a mut FeatureIndex,
    pub collision_boxes: &'a mut CollisionBoxArray,
    pub available_images: &'a [String],
    pub granularity: SubdivisionGranularity,
}

/// Image and glyph names a tile's buckets depend on. Returned from
/// `populate` and merged per tile by the caller, so that no shared mutable
/// accumulator crosses build executions.
#[derive(Debug, Clone, Default)]
pub struct TileDependencies {
    pub icons: HashSet<String>,
    pub patterns: HashSet<String>,
    pub glyphs: HashSet<String>,
}

impl TileDependencies {
    pub fn merge(&mut self, other: TileDependencies) {
        self.icons.extend(other.icons);
        self.patterns.extend(other.patterns);
        self.glyphs.extend(other.glyphs);
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty() && self.patterns.is_empty() && self.glyphs.is_empty()
    }
}

/// The single point of knowledge about turning vector-tile features into GPU
/// buffers. One implementation exists per style layer type; create buckets
/// via [`create_bucket`].
///
/// Buckets are built in a background context, then transferred to the render
/// context where their array data is uploaded into a
/// [`BufferGroup`]. Because buckets are shared between
/// layers with the same layout, they must be destroyed in groups (all
/// buckets of a tile together).
pub trait Bucket<B> {
    /// Consume indexed features, producing vertex/index data. Runs once per
    /// build pass in the build context; a repeated call replaces prior
    /// contents. Degenerate features contribute nothing but never abort the
    /// batch.
    fn populate(
        &mut self,
        features: &[IndexedFeature],
        options: &mut PopulateParameters,
        canonical: CanonicalTileId,
    ) -> TileDependencies;

    /// Re-evaluate only state- and pattern-driven attribute values, in
    /// place. Never re-tessellates; vertex and index counts are fixed.
    fn update(
        &mut self,
        states: &FeatureStates,
        vt_layer: &TileLayer,
        image_positions: &ImagePositions,
    );

    /// True iff this bucket would contribute no draw calls.
    fn is_empty(&self) -> bool;

    /// True iff array content exists which the buffer group does not yet
    /// reflect (first upload, or patches after an `update`).
    fn upload_pending(&self) -> bool;

    /// Push array content to the render context. Creates the buffer group on
    /// first call, patches dirty regions afterwards. The only operation
    /// allowed to touch GPU-owned resources.
    fn upload<C: UploadContext<B>>(&mut self, context: &C);

    /// Release the render-context resources of this bucket's buffers.
    fn destroy(&mut self);

    fn layer_ids(&self) -> &[String];
    fn has_pattern(&self) -> bool;
    /// Live style layers, present only after render-side re-binding.
    fn layers(&self) -> &[StyleLayer];
    fn state_dependent_layers(&self) -> &[StyleLayer];
    fn state_dependent_layer_ids(&self) -> &[String];

    /// Render-side re-binding: attach resolved live layers. Called by
    /// [`deserialize`].
    fn attach_layers(&mut self, layers: Vec<StyleLayer>, state_dependent_layers: Vec<StyleLayer>);
}

/// State and behavior common to every bucket variant.
pub(crate) struct BucketData<B> {
    pub layer_ids: Vec<String>,
    pub state_dependent_layer_ids: Vec<String>,
    pub layers: Vec<StyleLayer>,
    pub state_dependent_layers: Vec<StyleLayer>,
    /// The leading style layer, seeded at creation. Paint evaluation before
    /// re-binding reads from here.
    pub style_layer: StyleLayer,
    pub index: u32,
    pub zoom: ZoomLevel,
    #[allow(unused)]
    pub pixel_ratio: f32,
    #[allow(unused)]
    pub overscaling: f32,
    pub source_id: String,
    #[allow(unused)]
    pub global_state: Map<String, Value>,
    pub has_pattern: bool,
    pub features: Vec<BucketFeature>,
    pub arrays: ArrayGroup,
    pub buffers: Option<BufferGroup<B>>,
    /// Feature-metadata slots changed since the last upload.
    pub dirty: Option<Range<usize>>,
    pub destroyed: bool,
}

impl<B> BucketData<B> {
    pub fn new(parameters: BucketParameters) -> Self {
        let layer_ids = parameters
            .layers
            .iter()
            .map(|layer| layer.id.clone())
            .collect();
        let state_dependent_layer_ids = parameters
            .layers
            .iter()
            .filter(|layer| layer.is_state_dependent())
            .map(|layer| layer.id.clone())
            .collect();
        let style_layer = parameters
            .layers
            .into_iter()
            .next()
            .unwrap_or_default();

        Self {
            layer_ids,
            state_dependent_layer_ids,
            layers: Vec::new(),
            state_dependent_layers: Vec::new(),
            style_layer,
            index: parameters.index,
            zoom: parameters.zoom,
            pixel_ratio: parameters.pixel_ratio,
            overscaling: parameters.overscaling,
            source_id: parameters.source_id,
            global_state: parameters.global_state,
            has_pattern: false,
            features: Vec::new(),
            arrays: ArrayGroup::new(),
            buffers: None,
            dirty: None,
            destroyed: false,
        }
    }

    pub fn paint(&self) -> Option<&LayerPaint> {
        self.style_layer.paint.as_ref()
    }

    /// Reset build-side state for a (re-)population pass.
    pub fn begin_populate(&mut self) {
        debug_assert!(!self.destroyed, "populate after destroy");
        self.arrays.clear();
        self.features.clear();
        self.has_pattern = false;
        self.dirty = None;
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn upload_pending(&self) -> bool {
        !self.arrays.is_empty() && (self.buffers.is_none() || self.dirty.is_some())
    }

    pub fn upload<C: UploadContext<B>>(&mut self, context: &C) {
        debug_assert!(!self.destroyed, "upload after destroy");
        if self.arrays.is_empty() {
            return;
        }

        match &self.buffers {
            None => {
                let layer_metadata = ShaderLayerMetadata::new(self.style_layer.index as f32);
                self.buffers = Some(BufferGroup::from_arrays(context, &self.arrays, layer_metadata));
                tracing::debug!(
                    "created buffer group for layers {:?} of source {}",
                    self.layer_ids,
                    self.source_id
                );
            }
            Some(buffers) => {
                if let Some(dirty) = self.dirty.take() {
                    buffers.patch_feature_metadata(context, self.arrays.feature_metadata(), dirty);
                }
            }
        }
        self.dirty = None;
    }

    pub fn destroy(&mut self) {
        debug_assert!(!self.destroyed, "bucket destroyed twice");
        self.buffers = None;
        self.destroyed = true;
    }

    /// Patch the style slots of state- or pattern-driven features. Geometry
    /// counts never change here.
    pub fn update_features(
        &mut self,
        states: &FeatureStates,
        vt_layer: &TileLayer,
        image_positions: &ImagePositions,
    ) {
        debug_assert!(!self.destroyed, "update after destroy");

        for ordinal in 0..self.features.len() {
            let style = {
                let feature = &self.features[ordinal];

                let state = feature.id.as_ref().and_then(|id| states.get(id));
                let pattern_position = feature
                    .pattern
                    .as_ref()
                    .and_then(|pattern| image_positions.get(&pattern.mid));

                if state.is_none() && pattern_position.is_none() {
                    continue;
                }

                // Re-read the raw properties and overlay the live state
                let mut properties = vt_layer
                    .features
                    .get(feature.index as usize)
                    .map(|raw| raw.properties.clone())
                    .unwrap_or_else(|| feature.properties.clone());
                if let Some(state) = state {
                    for (key, value) in state {
                        let value = match value {
                            Value::String(value) => value.clone(),
                            other => other.to_string(),
                        };
                        properties.insert(key.clone(), value);
                    }
                }

                let mut style = evaluate_feature_style(self.paint(), &properties);
                if let Some(position) = pattern_position {
                    style.pattern = position.tlbr();
                }
                style
            };

            let patched = self.arrays.patch_feature(ordinal, style);
            if self.buffers.is_some() && !patched.is_empty() {
                self.dirty = Some(match self.dirty.take() {
                    Some(dirty) => dirty.start.min(patched.start)..dirty.end.max(patched.end),
                    None => patched,
                });
            }
        }
    }
}

/// Evaluate the paint color for one feature's properties. Data-driven
/// expressions which fail to evaluate fall back to a zeroed style rather
/// than failing the feature.
pub(crate) fn evaluate_feature_style(
    paint: Option<&LayerPaint>,
    properties: &std::collections::HashMap<String, String>,
) -> ShaderFeatureStyle {
    paint
        .and_then(|paint| paint.color_property())
        .and_then(|property| property.evaluate(properties))
        .map(|color| {
            let color: Alpha<EncodedSrgb<f32>> = color.into();
            ShaderFeatureStyle::from(color)
        })
        .unwrap_or_default()
}

/// A bucket of one of the supported style layer types. The set is closed so
/// the render loop keeps a single code path.
pub enum LayerBucket<B> {
    Fill(FillBucket<B>),
    Line(LineBucket<B>),
}

macro_rules! delegate {
    ($self:ident, $bucket:ident => $body:expr) => {
        match $self {
            LayerBucket::Fill($bucket) => $body,
            LayerBucket::Line($bucket) => $body,
        }
    };
}

impl<B> Bucket<B> for LayerBucket<B> {
    fn populate(
        &mut self,
        features: &[IndexedFeature],
        options: &mut PopulateParameters,
        canonical: CanonicalTileId,
    ) -> TileDependencies {
        delegate!(self, bucket => bucket.populate(features, options, canonical))
    }

    fn update(
        &mut self,
        states: &FeatureStates,
        vt_layer: &TileLayer,
        image_positions: &ImagePositions,
    ) {
        delegate!(self, bucket => bucket.update(states, vt_layer, image_positions))
    }

    fn is_empty(&self) -> bool {
        delegate!(self, bucket => bucket.is_empty())
    }

    fn upload_pending(&self) -> bool {
        delegate!(self, bucket => bucket.upload_pending())
    }

    fn upload<C: UploadContext<B>>(&mut self, context: &C) {
        delegate!(self, bucket => bucket.upload(context))
    }

    fn destroy(&mut self) {
        delegate!(self, bucket => bucket.destroy())
    }

    fn layer_ids(&self) -> &[String] {
        delegate!(self, bucket => bucket.layer_ids())
    }

    fn has_pattern(&self) -> bool {
        delegate!(self, bucket => bucket.has_pattern())
    }

    fn layers(&self) -> &[StyleLayer] {
        delegate!(self, bucket => bucket.layers())
    }

    fn state_dependent_layers(&self) -> &[StyleLayer] {
        delegate!(self, bucket => bucket.state_dependent_layers())
    }

    fn state_dependent_layer_ids(&self) -> &[String] {
        delegate!(self, bucket => bucket.state_dependent_layer_ids())
    }

    fn attach_layers(&mut self, layers: Vec<StyleLayer>, state_dependent_layers: Vec<StyleLayer>) {
        delegate!(self, bucket => bucket.attach_layers(layers, state_dependent_layers))
    }
}

/// Instantiate the bucket variant for a group of layers sharing one layout.
/// Returns `None` for layer types this crate does not tessellate.
pub fn create_bucket<B>(parameters: BucketParameters) -> Option<LayerBucket<B>> {
    match parameters.layers.first().and_then(|layer| layer.paint.as_ref()) {
        Some(LayerPaint::Fill(_)) => Some(LayerBucket::Fill(FillBucket::new(parameters))),
        Some(LayerPaint::Line(_)) => Some(LayerBucket::Line(LineBucket::new(parameters))),
        None => {
            log::trace!(
                "no bucket for layers {:?} without paint",
                parameters
                    .layers
                    .iter()
                    .map(|layer| layer.id.as_str())
                    .collect::<Vec<_>>()
            );
            None
        }
    }
}

/// Partition style layers into layer-layout groups: each group shares one
/// bucket per tile. Order within groups follows style order.
pub fn group_layers(layers: &[StyleLayer]) -> Vec<Vec<StyleLayer>> {
    let mut groups: Vec<Vec<StyleLayer>> = Vec::new();
    for layer in layers {
        match groups
            .iter_mut()
            .find(|group| group[0].shares_layout_with(layer))
        {
            Some(group) => group.push(layer.clone()),
            None => groups.push(vec![layer.clone()]),
        }
    }
    groups
}

/// Render-side re-binding of transferred buckets to live style layers.
///
/// Style layers are never sent across the serialization boundary; only their
/// ids travel with the bucket. This resolves those ids against the live
/// style and groups the buckets by layer id for render-loop lookup.
pub fn deserialize<B>(
    input: Vec<LayerBucket<B>>,
    style: Option<&Style>,
) -> HashMap<String, Rc<RefCell<LayerBucket<B>>>> {
    let mut output = HashMap::new();

    // Guard against the case where the map's style has been set to None
    // while this bucket has been parsing.
    let Some(style) = style else {
        return output;
    };

    for mut bucket in input {
        let layers: Vec<StyleLayer> = bucket
            .layer_ids()
            .iter()
            .filter_map(|id| style.get_layer(id))
            .cloned()
            .collect();

        if layers.is_empty() {
            // Every layer is gone; the bucket is orphaned and dropped here
            continue;
        }

        // Look up live layers from ids; first match wins for the
        // state-dependent subset.
        let state_dependent_layers: Vec<StyleLayer> = bucket
            .state_dependent_layer_ids()
            .iter()
            .filter_map(|id| layers.iter().find(|layer| &layer.id == id))
            .cloned()
            .collect();

        bucket.attach_layers(layers.clone(), state_dependent_layers);

        let shared = Rc::new(RefCell::new(bucket));
        for layer in &layers {
            output.insert(layer.id.clone(), shared.clone());
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{render::tests::TestBuffer, style::layer::FillPaint};

    fn fill_layer(id: &str) -> StyleLayer {
        StyleLayer {
            id: id.to_string(),
            paint: Some(LayerPaint::Fill(FillPaint::default())),
            source_layer: Some("land".to_string()),
            ..Default::default()
        }
    }

    fn bucket_with_layers(ids: &[&str]) -> LayerBucket<TestBuffer> {
        create_bucket(BucketParameters {
            index: 0,
            layers: ids.iter().map(|id| fill_layer(id)).collect(),
            zoom: ZoomLevel::default(),
            pixel_ratio: 1.0,
            overscaling: 1.0,
            source_layer_index: 0,
            source_id: "source".to_string(),
            global_state: Map::new(),
        })
        .unwrap()
    }

    fn style_with_layers(ids: &[&str]) -> Style {
        Style {
            layers: ids.iter().map(|id| fill_layer(id)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn deserialize_of_nothing_is_empty() {
        let style = style_with_layers(&["a"]);
        let output = deserialize::<TestBuffer>(Vec::new(), Some(&style));
        assert!(output.is_empty());
    }

    #[test]
    fn deserialize_without_style_drops_everything() {
        // The style may be torn down while a build is in flight; that is a
        // race, not an error.
        let buckets = vec![bucket_with_layers(&["a"])];
        let output = deserialize(buckets, None);
        assert!(output.is_empty());
    }

    #[test]
    fn deserialize_drops_buckets_with_no_resolvable_layer() {
        let style = style_with_layers(&["other"]);
        let buckets = vec![bucket_with_layers(&["a", "b"])];
        let output = deserialize(buckets, Some(&style));
        assert!(output.is_empty());
    }

    #[test]
    fn deserialize_registers_shared_bucket_under_every_layer_id() {
        let style = style_with_layers(&["a", "b"]);
        let buckets = vec![bucket_with_layers(&["a", "b"])];
        let output = deserialize(buckets, Some(&style));

        assert_eq!(output.len(), 2);
        assert!(Rc::ptr_eq(&output["a"], &output["b"]));
        assert_eq!(output["a"].borrow().layers().len(), 2);
    }

    #[test]
    fn deserialize_keeps_only_resolvable_layers() {
        let style = style_with_layers(&["a"]);
        let buckets = vec![bucket_with_layers(&["a", "x"])];
        let output = deserialize(buckets, Some(&style));

        assert_eq!(output.len(), 1);
        assert_eq!(output["a"].borrow().layers().len(), 1);
        assert!(!output.contains_key("x"));
    }

    #[test]
    fn state_dependent_layers_resolve_first_match() {
        let mut expression_layer = fill_layer("driven");
        expression_layer.paint = Some(LayerPaint::Fill(FillPaint {
            fill_color: Some(crate::style::layer::StyleProperty::Expression(
                serde_json::json!(["match", ["get", "kind"], ["a"], "#fff", "#000"]),
            )),
            fill_pattern: None,
        }));

        let style = Style {
            layers: vec![expression_layer.clone(), fill_layer("plain")],
            ..Default::default()
        };

        let bucket = create_bucket::<TestBuffer>(BucketParameters {
            index: 0,
            layers: vec![expression_layer, fill_layer("plain")],
            zoom: ZoomLevel::default(),
            pixel_ratio: 1.0,
            overscaling: 1.0,
            source_layer_index: 0,
            source_id: "source".to_string(),
            global_state: Map::new(),
        })
        .unwrap();
        assert_eq!(bucket.state_dependent_layer_ids(), &["driven".to_string()]);

        let output = deserialize(vec![bucket], Some(&style));
        let bucket = output["driven"].borrow();
        assert_eq!(bucket.state_dependent_layers().len(), 1);
        assert_eq!(bucket.state_dependent_layers()[0].id, "driven");
    }

    #[test]
    fn layers_group_by_shared_layout() {
        let layers = vec![fill_layer("a"), fill_layer("b")];
        let mut other = fill_layer("c");
        other.source_layer = Some("water".to_string());
        let mut all = layers.clone();
        all.push(other);

        let groups = group_layers(&all);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1][0].id, "c");
    }
}
