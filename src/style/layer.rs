//! Style layer model and paint property evaluation.

use std::{
    collections::HashMap,
    hash::{Hash, Hasher},
};

use cint::{Alpha, EncodedSrgb};
use csscolorparser::Color;
use serde::{Deserialize, Serialize};

/// A paint property which is either a constant value or a data-driven
/// expression evaluated against feature properties (and feature state).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum StyleProperty<T> {
    Constant(T),
    Expression(serde_json::Value),
}

impl<T: std::str::FromStr + Clone> StyleProperty<T> {
    /// Evaluate against a set of feature properties. Supported expression form
    /// is the `["match", ["get", <prop>], <keys>, <value>, ..., <fallback>]`
    /// subset; anything else evaluates to `None`.
    pub fn evaluate(&self, feature_properties: &HashMap<String, String>) -> Option<T> {
        match self {
            StyleProperty::Constant(value) => Some(value.clone()),
            StyleProperty::Expression(expr) => {
                let arr = expr.as_array()?;
                let op = arr.first().and_then(|v| v.as_str())?;
                if op != "match" || arr.len() <= 3 {
                    return None;
                }

                // Extract the getter, e.g. ["get", "ADM0_A3"]
                let get_arr = arr.get(1).and_then(|v| v.as_array())?;
                if get_arr.first().and_then(|v| v.as_str()) != Some("get") {
                    return None;
                }
                let prop_name = get_arr.get(1).and_then(|v| v.as_str())?;

                let Some(feature_val) = feature_properties.get(prop_name) else {
                    // Property missing: skip the match pairs, return the fallback
                    return arr
                        .last()
                        .and_then(|v| v.as_str())
                        .and_then(|fallback| fallback.parse::<T>().ok());
                };

                let mut i = 2;
                while i < arr.len() - 1 {
                    if let Some(match_keys) = arr.get(i).and_then(|v| v.as_array()) {
                        let matches = match_keys
                            .iter()
                            .any(|k| k.as_str() == Some(feature_val.as_str()));
                        if matches {
                            if let Some(value) = arr.get(i + 1).and_then(|v| v.as_str()) {
                                return value.parse::<T>().ok();
                            }
                        }
                    }
                    i += 2;
                }

                // Fallback (last element)
                if i == arr.len() - 1 {
                    if let Some(fallback) = arr.get(i).and_then(|v| v.as_str()) {
                        return fallback.parse::<T>().ok();
                    }
                }
                None
            }
        }
    }

    /// Whether the value varies per feature.
    pub fn is_data_driven(&self) -> bool {
        matches!(self, StyleProperty::Expression(_))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FillPaint {
    #[serde(rename = "fill-color")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<StyleProperty<Color>>,

    #[serde(rename = "fill-pattern")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_pattern: Option<StyleProperty<String>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LinePaint {
    #[serde(rename = "line-color")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_color: Option<StyleProperty<Color>>,

    #[serde(rename = "line-width")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<StyleProperty<f32>>,
}

/// The different types of paints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", content = "paint")]
pub enum LayerPaint {
    #[serde(rename = "fill")]
    Fill(FillPaint),
    #[serde(rename = "line")]
    Line(LinePaint),
}

impl LayerPaint {
    pub fn get_color(&self) -> Option<Alpha<EncodedSrgb<f32>>> {
        self.color_property().and_then(|property| {
            if let StyleProperty::Constant(color) = property {
                Some(color.clone().into())
            } else {
                None // Expression types have no single static color
            }
        })
    }

    pub fn color_property(&self) -> Option<&StyleProperty<Color>> {
        match self {
            LayerPaint::Fill(paint) => paint.fill_color.as_ref(),
            LayerPaint::Line(paint) => paint.line_color.as_ref(),
        }
    }

    pub fn pattern_property(&self) -> Option<&StyleProperty<String>> {
        match self {
            LayerPaint::Fill(paint) => paint.fill_pattern.as_ref(),
            LayerPaint::Line(_) => None,
        }
    }
}

/// Layout properties which decide how geometry is generated. Style layers with
/// equal layout (and type) share one bucket.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct LayerLayout {
    #[serde(rename = "fill-sort-key")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
    #[serde(rename = "line-cap")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_cap: Option<String>,
    #[serde(rename = "line-join")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_join: Option<String>,
}

/// Stores all the styles for a specific layer.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StyleLayer {
    #[serde(skip)]
    pub index: u32,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxzoom: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minzoom: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(flatten)]
    pub paint: Option<LayerPaint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<LayerLayout>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "source-layer")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<String>,
}

impl StyleLayer {
    /// True when any paint property of this layer is data-driven and its
    /// value may therefore change with feature state.
    pub fn is_state_dependent(&self) -> bool {
        let Some(paint) = &self.paint else {
            return false;
        };
        paint
            .color_property()
            .is_some_and(|property| property.is_data_driven())
            || paint
                .pattern_property()
                .is_some_and(|property| property.is_data_driven())
    }

    /// Layers with identical geometry-generating configuration may share one
    /// bucket per tile.
    pub fn shares_layout_with(&self, other: &StyleLayer) -> bool {
        let same_type = match (&self.paint, &other.paint) {
            (Some(a), Some(b)) => std::mem::discriminant(a) == std::mem::discriminant(b),
            (None, None) => true,
            _ => false,
        };
        same_type && self.source_layer == other.source_layer && self.layout == other.layout
    }
}

impl Eq for StyleLayer {}
impl PartialEq for StyleLayer {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq(&other.id)
    }
}

impl Hash for StyleLayer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl Default for StyleLayer {
    fn default() -> Self {
        Self {
            index: 0,
            id: "id".to_string(),
            maxzoom: None,
            minzoom: None,
            paint: Some(LayerPaint::Fill(FillPaint::default())),
            layout: None,
            source: None,
            source_layer: Some("does not exist".to_string()),
        }
    }
}
