#![forbid(unsafe_code)]

//! Compound-graph layout on top of a layered (dagre-style) layout primitive.
//!
//! `layout_graph` takes a [`GraphModel`] and returns a [`PositionedGraph`] with top-left node
//! boxes, orthogonal edge polylines and nested group boxes.

pub mod config;
pub mod engine;
pub mod geom;
pub mod layout;
pub mod model;
pub mod size;
pub mod style;
pub mod text;

pub use config::{LayoutOptions, RenderOptions};
pub use layout::{layout_graph, layout_graph_sync};
pub use model::{
    Direction, Edge, EdgeStyle, GraphModel, LayoutPoint, LayoutSize, Node, NodeShape,
    PositionedEdge, PositionedGraph, PositionedGroup, PositionedNode, StyleMaps, Subgraph,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("layout failed for {scope} ({direction}): {message}")]
    Layout {
        scope: String,
        direction: model::Direction,
        message: String,
    },
    #[error("invalid graph model: {message}")]
    InvalidModel { message: String },
    #[error("render options JSON error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
