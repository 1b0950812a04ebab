use crate::engine::{DagreEngine, LayeredEngine};
use crate::text::{DeterministicTextMeasurer, TextMeasurer, TextStyle};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Spacing and typography knobs, deserializable from a camelCase JSON config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    pub font: TextStyle,
    /// Minimum margin between the canvas edge and any geometry.
    pub padding: f64,
    pub node_spacing: f64,
    pub layer_spacing: f64,
    pub group_header_height: f64,
    pub group_content_padding: f64,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            font: TextStyle::default(),
            padding: 40.0,
            node_spacing: 50.0,
            layer_spacing: 50.0,
            group_header_height: 24.0,
            group_content_padding: 8.0,
        }
    }
}

impl RenderOptions {
    pub fn from_json(value: &serde_json::Value) -> crate::Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    pub fn from_json_str(text: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Clone)]
pub struct LayoutOptions {
    pub render: RenderOptions,
    pub text_measurer: Arc<dyn TextMeasurer + Send + Sync>,
    pub engine: Arc<dyn LayeredEngine + Send + Sync>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            text_measurer: Arc::new(DeterministicTextMeasurer::default()),
            engine: Arc::new(DagreEngine),
        }
    }
}

impl std::fmt::Debug for LayoutOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayoutOptions")
            .field("render", &self.render)
            .finish_non_exhaustive()
    }
}

impl LayoutOptions {
    pub fn with_render(mut self, render: RenderOptions) -> Self {
        self.render = render;
        self
    }
}
