//! Build-context orchestration: raw tile bytes in, transferred buckets out.

use std::collections::HashSet;

use geozero::mvt::{Message as _, Tile};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    buckets::{
        create_bucket, group_layers, Bucket, BucketParameters, CollisionBoxArray, FeatureIndex,
        PopulateParameters, TileDependencies,
    },
    coords::CanonicalTileId,
    style::layer::StyleLayer,
    tessellation::SubdivisionGranularity,
    tile::indexer::index_layer,
    transfer::{Context, Message, SendError, TileBuckets},
};

#[derive(Error, Debug)]
pub enum ProcessError {
    /// Sending of results failed
    #[error("sending data back through context failed")]
    Send(#[from] SendError),
    /// Error during decoding or indexing of the tile data
    #[error("processing tile data failed")]
    Processing(Box<dyn std::error::Error>),
}

/// A request for a tile at the given coordinates and in the given source
/// layers.
pub struct TileRequest {
    pub coords: CanonicalTileId,
    pub source_id: String,
    pub layers: HashSet<String>,
}

/// Build-context knobs which apply to every bucket of the pass.
pub struct ProcessOptions {
    pub pixel_ratio: f32,
    pub overscaling: f32,
    pub global_state: Map<String, Value>,
    pub available_images: Vec<String>,
    pub granularity: SubdivisionGranularity,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        Self {
            pixel_ratio: 1.0,
            overscaling: 1.0,
            global_state: Map::new(),
            available_images: Vec::new(),
            granularity: SubdivisionGranularity::default(),
        }
    }
}

/// Decode one tile, bucket its requested layers and hand everything to the
/// render context.
///
/// Layers which are requested but absent (or which fail to decode) produce a
/// [`Message::LayerMissing`]; the rest of the tile still goes through.
pub fn process_tile<B, C: Context<B>>(
    data: &[u8],
    request: TileRequest,
    style_layers: &[StyleLayer],
    options: &ProcessOptions,
    context: &C,
) -> Result<(), ProcessError> {
    let mut tile =
        Tile::decode(data).map_err(|e| ProcessError::Processing(Box::new(e)))?;

    let coords = request.coords;
    let mut feature_index = FeatureIndex::default();
    let mut collision_boxes = CollisionBoxArray::default();
    let mut dependencies = TileDependencies::default();
    let mut buckets = Vec::new();
    let mut bucket_index = 0u32;

    for (source_layer_index, layer) in tile.layers.iter_mut().enumerate() {
        let layer_name = layer.name.clone();
        if !request.layers.contains(&layer_name) {
            continue;
        }

        let indexed = match index_layer(layer, source_layer_index as u32) {
            Ok(indexed) => indexed,
            Err(e) => {
                context.send(Message::LayerMissing {
                    coords,
                    layer: layer_name.clone(),
                })?;
                tracing::error!("layer {layer_name} at {coords} failed to decode: {e}");
                continue;
            }
        };

        let layer_styles: Vec<StyleLayer> = style_layers
            .iter()
            .filter(|style_layer| style_layer.source_layer.as_deref() == Some(&layer_name))
            .cloned()
            .collect();

        for group in group_layers(&layer_styles) {
            let parameters = BucketParameters {
                index: bucket_index,
                layers: group,
                zoom: coords.z,
                pixel_ratio: options.pixel_ratio,
                overscaling: options.overscaling,
                source_layer_index: source_layer_index as u32,
                source_id: request.source_id.clone(),
                global_state: options.global_state.clone(),
            };
            bucket_index += 1;

            let Some(mut bucket) = create_bucket(parameters) else {
                continue;
            };
            let mut populate = PopulateParameters {
                feature_index: &mut feature_index,
                collision_boxes: &mut collision_boxes,
                available_images: &options.available_images,
                granularity: options.granularity,
            };
            dependencies.merge(bucket.populate(&indexed, &mut populate, coords));

            // Buckets with no geometry never reach the render context
            if !bucket.is_empty() {
                buckets.push(bucket);
            }
        }
    }

    let available_layers: HashSet<_> = tile
        .layers
        .iter()
        .map(|layer| layer.name.clone())
        .collect::<HashSet<_>>();

    for missing_layer in request.layers.difference(&available_layers) {
        context.send(Message::LayerMissing {
            coords,
            layer: missing_layer.clone(),
        })?;
        tracing::info!("requested layer {missing_layer} at {coords} not found in tile");
    }

    tracing::info!("tile at {coords} finished with {} buckets", buckets.len());
    context.send(Message::TileFinished(TileBuckets {
        coords,
        source_id: request.source_id,
        buckets,
        feature_index,
        collision_boxes,
        dependencies,
    }))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use geozero::mvt::{Message as _, Tile};

    use super::*;
    use crate::{
        coords::ZoomLevel,
        render::tests::{TestBuffer, TestUploadContext},
        style::layer::{FillPaint, LayerPaint},
        tile::indexer::tests::test_layer,
        transfer::channel,
    };

    fn land_fill_layer() -> StyleLayer {
        StyleLayer {
            id: "land-fill".to_string(),
            paint: Some(LayerPaint::Fill(FillPaint {
                fill_color: Some(crate::style::layer::StyleProperty::Constant(
                    "#0a0".parse().unwrap(),
                )),
                fill_pattern: None,
            })),
            source_layer: Some("land".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn tile_bytes_become_uploadable_buckets() {
        let tile = Tile {
            layers: vec![test_layer()],
        };
        let data = tile.encode_to_vec();

        let (context, receiver) = channel::<TestBuffer>();
        process_tile(
            &data,
            TileRequest {
                coords: CanonicalTileId::new(1, 2, ZoomLevel::new(3)),
                source_id: "vector".to_string(),
                layers: HashSet::from(["land".to_string(), "water".to_string()]),
            },
            &[land_fill_layer()],
            &ProcessOptions::default(),
            &context,
        )
        .unwrap();

        let Some(Message::LayerMissing { layer, .. }) = receiver.recv() else {
            panic!("expected the missing water layer first");
        };
        assert_eq!(layer, "water");

        let Some(Message::TileFinished(mut finished)) = receiver.recv() else {
            panic!("expected the finished tile");
        };
        assert_eq!(finished.source_id, "vector");
        assert_eq!(finished.buckets.len(), 1);
        assert_eq!(finished.feature_index.entries().len(), 1);
        assert!(finished.dependencies.is_empty());

        let upload = TestUploadContext::default();
        let bucket = &mut finished.buckets[0];
        assert!(bucket.upload_pending());
        bucket.upload(&upload);
        assert_eq!(upload.total_writes(), 4);
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let (context, _receiver) = channel::<TestBuffer>();
        let result = process_tile(
            &[0xff, 0xff, 0xff],
            TileRequest {
                coords: CanonicalTileId::new(0, 0, ZoomLevel::new(0)),
                source_id: "vector".to_string(),
                layers: HashSet::new(),
            },
            &[],
            &ProcessOptions::default(),
            &context,
        );
        assert!(matches!(result, Err(ProcessError::Processing(_))));
    }

    #[test]
    fn unstyled_layers_produce_no_buckets() {
        let tile = Tile {
            layers: vec![test_layer()],
        };
        let data = tile.encode_to_vec();

        let (context, receiver) = channel::<TestBuffer>();
        process_tile(
            &data,
            TileRequest {
                coords: CanonicalTileId::new(0, 0, ZoomLevel::new(0)),
                source_id: "vector".to_string(),
                layers: HashSet::from(["land".to_string()]),
            },
            &[],
            &ProcessOptions::default(),
            &context,
        )
        .unwrap();

        let Some(Message::TileFinished(finished)) = receiver.recv() else {
            panic!("expected the finished tile");
        };
        assert!(finished.buckets.is_empty());
    }
}
