//! # tile-buckets
//!
//! Conversion of vector-tile features into GPU-ready geometry for a tiled
//! map renderer.
//!
//! A [`buckets::Bucket`] owns the vertices, indices and per-feature style
//! attributes of one group of style layers within one tile. Buckets are
//! populated from decoded MVT data in a background build context
//! (see [`process::process_tile`]), moved to the render context through a
//! channel ([`transfer`]), re-bound to live style layers
//! ([`buckets::deserialize`]) and finally uploaded to the GPU through
//! [`render::UploadContext`].
//!
//! Tessellation is done with Lyon; buffers are laid out for WebGPU.

pub mod buckets;
pub mod coords;
pub mod process;
pub mod render;
pub mod style;
pub mod tessellation;
pub mod tile;
pub mod transfer;
