//! Style model consumed by the bucket layer.

pub mod layer;
mod style;

pub use style::Style;
