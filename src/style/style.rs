//! Multi-layered map style.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::style::layer::StyleLayer;

/// Stores the style for a multi-layered map.
///
/// Only the parts the bucket layer consumes are modeled; sources are kept as
/// raw JSON since tile fetching is out of scope here.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Style {
    #[serde(default)]
    pub version: u16,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sources: HashMap<String, Map<String, Value>>,
    #[serde(default)]
    pub layers: Vec<StyleLayer>,
}

impl Style {
    /// Look up a live style layer by id. Returns `None` when the layer has
    /// been removed since a build started; callers treat that as a drop, not
    /// an error.
    pub fn get_layer(&self, id: &str) -> Option<&StyleLayer> {
        self.layers.iter().find(|layer| layer.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::Style;
    use crate::style::layer::StyleLayer;

    #[test]
    fn get_layer_resolves_by_id() {
        let style = Style {
            layers: vec![
                StyleLayer {
                    id: "water".to_string(),
                    ..Default::default()
                },
                StyleLayer {
                    id: "land".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        assert_eq!(style.get_layer("land").map(|l| l.id.as_str()), Some("land"));
        assert!(style.get_layer("removed").is_none());
    }
}
