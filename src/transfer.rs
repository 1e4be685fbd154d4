//! Transfer of built buckets from the build context to the render context.
//!
//! The boundary is a plain channel: moving a [`TileBuckets`] value through it
//! is the transfer. Once sent, the build context retains nothing of the tile.

use std::sync::mpsc;

use thiserror::Error;

use crate::{
    buckets::{CollisionBoxArray, FeatureIndex, LayerBucket, TileDependencies},
    coords::CanonicalTileId,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("could not transfer data to the render context")]
    Transfer,
}

/// Everything one build pass produced for one tile.
pub struct TileBuckets<B> {
    pub coords: CanonicalTileId,
    pub source_id: String,
    pub buckets: Vec<LayerBucket<B>>,
    pub feature_index: FeatureIndex,
    pub collision_boxes: CollisionBoxArray,
    pub dependencies: TileDependencies,
}

pub enum Message<B> {
    /// A tile finished building.
    TileFinished(TileBuckets<B>),
    /// A requested source layer was absent from the tile data.
    LayerMissing {
        coords: CanonicalTileId,
        layer: String,
    },
}

/// The sending half of the boundary, held by build contexts.
pub trait Context<B>: 'static {
    fn send(&self, message: Message<B>) -> Result<(), SendError>;
}

/// [`Context`] over an in-process channel.
pub struct ChannelContext<B> {
    sender: mpsc::Sender<Message<B>>,
}

impl<B> Clone for ChannelContext<B> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<B: 'static> Context<B> for ChannelContext<B> {
    fn send(&self, message: Message<B>) -> Result<(), SendError> {
        // A hung-up receiver means the render context is gone
        self.sender.send(message).map_err(|_| SendError::Transfer)
    }
}

/// The receiving half, polled by the render context.
pub struct MessageReceiver<B> {
    receiver: mpsc::Receiver<Message<B>>,
}

impl<B> MessageReceiver<B> {
    /// Non-blocking poll, intended for once-per-frame draining.
    pub fn try_poll(&self) -> Option<Message<B>> {
        self.receiver.try_recv().ok()
    }

    /// Block until the next message, or `None` when all senders are gone.
    pub fn recv(&self) -> Option<Message<B>> {
        self.receiver.recv().ok()
    }
}

pub fn channel<B>() -> (ChannelContext<B>, MessageReceiver<B>) {
    let (sender, receiver) = mpsc::channel();
    (ChannelContext { sender }, MessageReceiver { receiver })
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::{
        buckets::{
            create_bucket, Bucket, BucketParameters, PopulateParameters,
        },
        coords::ZoomLevel,
        render::tests::{TestBuffer, TestUploadContext},
        style::layer::StyleLayer,
        tessellation::SubdivisionGranularity,
        tile::{IndexedFeature, TileFeature},
    };

    fn built_tile() -> TileBuckets<TestBuffer> {
        let mut bucket = create_bucket(BucketParameters {
            index: 0,
            layers: vec![StyleLayer::default()],
            zoom: ZoomLevel::new(0),
            pixel_ratio: 1.0,
            overscaling: 1.0,
            source_layer_index: 0,
            source_id: "test".to_string(),
            global_state: Map::new(),
        })
        .unwrap();

        let feature = TileFeature {
            geometry: vec![vec![
                lyon::math::point(0.0, 0.0),
                lyon::math::point(8.0, 0.0),
                lyon::math::point(8.0, 8.0),
                lyon::math::point(0.0, 0.0),
            ]],
            ..Default::default()
        };
        let mut feature_index = FeatureIndex::default();
        let mut collision_boxes = CollisionBoxArray::default();
        let mut options = PopulateParameters {
            feature_index: &mut feature_index,
            collision_boxes: &mut collision_boxes,
            available_images: &[],
            granularity: SubdivisionGranularity::default(),
        };
        let dependencies = bucket.populate(
            &[IndexedFeature {
                id: None,
                feature,
                index: 0,
                source_layer_index: 0,
            }],
            &mut options,
            CanonicalTileId::new(0, 0, ZoomLevel::new(0)),
        );

        TileBuckets {
            coords: CanonicalTileId::new(0, 0, ZoomLevel::new(0)),
            source_id: "test".to_string(),
            buckets: vec![bucket],
            feature_index,
            collision_boxes,
            dependencies,
        }
    }

    #[test]
    fn buckets_move_across_threads_and_upload_on_the_receiving_side() {
        let (context, receiver) = channel::<TestBuffer>();

        let worker = std::thread::spawn(move || {
            context
                .send(Message::TileFinished(built_tile()))
                .expect("receiver alive");
        });
        worker.join().unwrap();

        let Some(Message::TileFinished(mut tile)) = receiver.recv() else {
            panic!("expected a finished tile");
        };
        assert_eq!(tile.buckets.len(), 1);

        let bucket = &mut tile.buckets[0];
        assert!(!bucket.is_empty());
        assert!(bucket.upload_pending());

        let upload = TestUploadContext::default();
        bucket.upload(&upload);
        assert_eq!(upload.total_writes(), 4);
    }

    #[test]
    fn send_fails_once_the_receiver_is_gone() {
        let (context, receiver) = channel::<TestBuffer>();
        drop(receiver);

        let result = context.send(Message::LayerMissing {
            coords: CanonicalTileId::new(0, 0, ZoomLevel::new(0)),
            layer: "water".to_string(),
        });
        assert_eq!(result, Err(SendError::Transfer));
    }
}
