//! Bucket for fill layers: polygon tessellation.

use lyon::tessellation::{BuffersBuilder, FillOptions, FillRule, FillTessellator};

use crate::{
    buckets::{
        evaluate_feature_style, Bucket, BucketData, BucketParameters, PopulateParameters,
        TileDependencies,
    },
    coords::CanonicalTileId,
    render::{image_atlas::ImagePositions, UploadContext},
    style::layer::StyleLayer,
    tessellation::{build_path, VertexConstructor},
    tile::{FeatureStates, IndexedFeature, TileLayer},
};

use super::feature::BucketFeature;

pub struct FillBucket<B> {
    pub(crate) data: BucketData<B>,
}

impl<B> FillBucket<B> {
    pub(crate) fn new(parameters: BucketParameters) -> Self {
        Self {
            data: BucketData::new(parameters),
        }
    }
}

impl<B> Bucket<B> for FillBucket<B> {
    fn populate(
        &mut self,
        features: &[IndexedFeature],
        options: &mut PopulateParameters,
        canonical: CanonicalTileId,
    ) -> TileDependencies {
        self.data.begin_populate();
        let mut dependencies = TileDependencies::default();

        let mut bucket_features: Vec<BucketFeature> = features
            .iter()
            .map(|feature| BucketFeature::from_indexed(feature, &self.data.style_layer, &canonical))
            .collect();
        if self
            .data
            .style_layer
            .layout
            .as_ref()
            .is_some_and(|layout| layout.sort_key.is_some())
        {
            bucket_features
                .sort_by(|a, b| a.sort_key.unwrap_or(0.0).total_cmp(&b.sort_key.unwrap_or(0.0)));
        }

        let tolerance = options.granularity.tolerance_at(self.data.zoom);
        let mut tessellator = FillTessellator::new();

        for feature in bucket_features {
            if let Some(pattern) = &feature.pattern {
                self.data.has_pattern = true;
                dependencies.patterns.insert(pattern.min.clone());
                dependencies.patterns.insert(pattern.mid.clone());
                dependencies.patterns.insert(pattern.max.clone());
            }

            let style = evaluate_feature_style(self.data.paint(), &feature.properties);

            if let Some(path) = build_path(&feature.geometry, true) {
                let result = tessellator.tessellate_path(
                    &path,
                    &FillOptions::tolerance(tolerance).with_fill_rule(FillRule::NonZero),
                    &mut BuffersBuilder::new(&mut self.data.arrays.buffer, VertexConstructor {}),
                );
                if let Err(error) = result {
                    // The feature contributes nothing, but one bad ring must
                    // not take the whole tile down
                    tracing::error!(
                        "fill tessellation failed for feature {} of source {}: {}",
                        feature.index,
                        self.data.source_id,
                        error
                    );
                }
            }

            // Degenerate features keep their slot so update() ordinals stay
            // aligned with population order
            self.data.arrays.end_feature(style);
            options
                .feature_index
                .insert(feature.index, feature.source_layer_index, self.data.index);
            self.data.features.push(feature);
        }

        self.data.arrays.finish();
        dependencies
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
