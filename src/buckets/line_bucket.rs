//! Bucket for line layers: stroke tessellation.

use lyon::tessellation::{BuffersBuilder, LineCap, LineJoin, StrokeOptions, StrokeTessellator};

use crate::{
    buckets::{
        evaluate_feature_style, Bucket, BucketData, BucketParameters, PopulateParameters,
        TileDependencies,
    },
    coords::CanonicalTileId,
    render::{image_atlas::ImagePositions, UploadContext},
    style::layer::{LayerPaint, StyleLayer},
    tessellation::{build_path, VertexConstructor},
    tile::{FeatureStates, IndexedFeature, TileLayer},
};

use super::feature::BucketFeature;

pub struct LineBucket<B> {
    pub(crate) data: BucketData<B>,
}

impl<B> LineBucket<B> {
    pub(crate) fn new(parameters: BucketParameters) -> Self {
        Self {
            data: BucketData::new(parameters),
        }
    }

    fn stroke_options(&self, tolerance: f32, line_width: f32) -> StrokeOptions {
        let layout = self.data.style_layer.layout.as_ref();
        let cap = match layout.and_then(|layout| layout.line_cap.as_deref()) {
            Some("round") => LineCap::Round,
            Some("square") => LineCap::Square,
            _ => LineCap::Butt,
        };
        let join = match layout.and_then(|layout| layout.line_join.as_deref()) {
            Some("round") => LineJoin::Round,
            Some("bevel") => LineJoin::Bevel,
            _ => LineJoin::Miter,
        };
        StrokeOptions::tolerance(tolerance)
            .with_line_width(line_width)
            .with_line_cap(cap)
            .with_line_join(join)
    }

    fn line_width(&self, feature: &BucketFeature) -> f32 {
        match self.data.paint() {
            Some(LayerPaint::Line(paint)) => paint
                .line_width
                .as_ref()
                .and_then(|property| property.evaluate(&feature.properties))
                .unwrap_or(1.0),
            _ => 1.0,
        }
    }
}

impl<B> Bucket<B> for LineBucket<B> {
    fn populate(
        &mut self,
        features: &[IndexedFeature],
        options: &mut PopulateParameters,
        canonical: CanonicalTileId,
    ) -> TileDependencies {
        self.data.begin_populate();

        let tolerance = options.granularity.tolerance_at(self.data.zoom);
        let mut tessellator = StrokeTessellator::new();

        for feature in features {
            let feature = BucketFeature::from_indexed(feature, &self.data.style_layer, &canonical);
            let style = evaluate_feature_style(self.data.paint(), &feature.properties);
            let line_width = self.line_width(&feature);

            if let Some(path) = build_path(&feature.geometry, false) {
                let result = tessellator.tessellate_path(
                    &path,
                    &self.stroke_options(tolerance, line_width),
                    &mut BuffersBuilder::new(&mut self.data.arrays.buffer, VertexConstructor {}),
                );
                if let Err(error) = result {
                    tracing::error!(
                        "stroke tessellation failed for feature {} of source {}: {}",
                        feature.index,
                        self.data.source_id,
                        error
                    );
                }
            }

            self.data.arrays.end_feature(style);
            options
                .feature_index
                .insert(feature.index, feature.source_layer_index, self.data.index);
            self.data.features.push(feature);
        }

        self.data.arrays.finish();
        TileDependencies::default()
    }

    fn update(
        &mut self,
        states: &FeatureStates,
        vt_layer: &TileLayer,
        image_positions: &ImagePositions,
    ) {
        self.data.update_features(states, vt_layer, image_positions);
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn upload_pending(&self) -> bool {
        self.data.upload_pending()
    }

    fn upload<C: UploadContext<B>>(&mut self, context: &C) {
        self.data.upload(context);
    }

    fn destroy(&mut self) {
        self.data.destroy();
    }

    fn layer_ids(&self) -> &[String] {
        &self.data.layer_ids
    }

    fn has_pattern(&self) -> bool {
        self.data.has_pattern
    }

    fn layers(&self) -> &[StyleLayer] {
        &self.data.layers
    }

    fn state_dependent_layers(&self) -> &[StyleLayer] {
        &self.data.state_dependent_layers
    }

    fn state_dependent_layer_ids(&self) -> &[String] {
        &self.data.state_dependent_layer_ids
    }

    fn attach_layers(&mut self, layers: Vec<StyleLayer>, state_dependent_layers: Vec<StyleLayer>) {
        self.data.layers = layers;
        self.data.state_dependent_layers = state_dependent_layers;
    }
}
