//! Narrow interface over the layered-layout primitive.
//!
//! The layout passes only talk to [`LayeredGraph`]; [`DagreEngine`] backs it with `dugong`.
//! Edges are keyed by caller-chosen names so several edges may join the same pair of nodes.

use crate::geom::{Point, Size, point};
use crate::model::Direction;
use dugong::graphlib::{Graph, GraphOptions};
use dugong::{EdgeLabel, GraphLabel, LabelPos, NodeLabel, RankDir};
use rustc_hash::FxHashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Global settings of one primitive run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankConfig {
    pub direction: Direction,
    pub node_spacing: f64,
    pub layer_spacing: f64,
    /// Separation between dummy nodes, including compound borders.
    pub edge_spacing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeSpec {
    pub weight: f64,
    pub minlen: usize,
    pub label: Option<Size>,
}

impl Default for EdgeSpec {
    fn default() -> Self {
        Self {
            weight: 1.0,
            minlen: 1,
            label: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeGeometry {
    pub center: Point,
    pub size: Size,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeRoute {
    pub points: Vec<Point>,
    /// Center of the edge label box, when the edge carried one.
    pub label: Option<Point>,
}

pub trait LayeredEngine {
    fn create(&self, config: &RankConfig) -> Box<dyn LayeredGraph>;
}

pub trait LayeredGraph {
    /// Adds a node. Nodes that later receive children become compound nodes and are sized by
    /// the primitive.
    fn set_node(&mut self, id: &str, size: Size);
    fn set_parent(&mut self, child: &str, parent: &str);
    fn set_edge(&mut self, key: &str, source: &str, target: &str, spec: EdgeSpec);
    fn layout(&mut self) -> Result<(), String>;
    fn node(&self, id: &str) -> Option<NodeGeometry>;
    fn edge(&self, key: &str) -> Option<EdgeRoute>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DagreEngine;

impl LayeredEngine for DagreEngine {
    fn create(&self, config: &RankConfig) -> Box<dyn LayeredGraph> {
        Box::new(DagreGraph::new(config))
    }
}

fn rank_dir(direction: Direction) -> RankDir {
    match direction {
        Direction::TB => RankDir::TB,
        Direction::BT => RankDir::BT,
        Direction::LR => RankDir::LR,
        Direction::RL => RankDir::RL,
    }
}

pub struct DagreGraph {
    g: Graph<NodeLabel, EdgeLabel, GraphLabel>,
    edges: FxHashMap<String, (String, String)>,
}

impl DagreGraph {
    pub fn new(config: &RankConfig) -> Self {
        let mut g: Graph<NodeLabel, EdgeLabel, GraphLabel> = Graph::new(GraphOptions {
            multigraph: true,
            compound: true,
            ..Default::default()
        });
        g.set_graph(GraphLabel {
            rankdir: rank_dir(config.direction),
            nodesep: config.node_spacing,
            ranksep: config.layer_spacing,
            edgesep: config.edge_spacing,
            ..Default::default()
        });
        Self {
            g,
            edges: FxHashMap::default(),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "layout engine panicked".to_string()
    }
}

impl LayeredGraph for DagreGraph {
    fn set_node(&mut self, id: &str, size: Size) {
        self.g.set_node(
            id,
            NodeLabel {
                width: size.width,
                height: size.height,
                ..Default::default()
            },
        );
    }

    fn set_parent(&mut self, child: &str, parent: &str) {
        self.g.set_parent(child, parent);
    }

    fn set_edge(&mut self, key: &str, source: &str, target: &str, spec: EdgeSpec) {
        let (width, height) = spec
            .label
            .map(|s| (s.width, s.height))
            .unwrap_or((0.0, 0.0));
        let el = EdgeLabel {
            width,
            height,
            labelpos: LabelPos::C,
            labeloffset: 10.0,
            minlen: spec.minlen.max(1),
            weight: spec.weight,
            ..Default::default()
        };
        self.g.set_edge_named(source, target, Some(key), Some(el));
        self.edges
            .insert(key.to_string(), (source.to_string(), target.to_string()));
    }

    fn layout(&mut self) -> Result<(), String> {
        let g = &mut self.g;
        catch_unwind(AssertUnwindSafe(|| dugong::layout_dagreish(g)))
            .map_err(|payload| panic_message(payload.as_ref()))
    }

    fn node(&self, id: &str) -> Option<NodeGeometry> {
        let n = self.g.node(id)?;
        Some(NodeGeometry {
            center: point(n.x?, n.y?),
            size: Size::new(n.width, n.height),
        })
    }

    fn edge(&self, key: &str) -> Option<EdgeRoute> {
        let (v, w) = self.edges.get(key)?;
        let e = self.g.edge(v, w, Some(key))?;
        let label = match (e.x, e.y) {
            (Some(x), Some(y)) if e.width > 0.0 || e.height > 0.0 => Some(point(x, y)),
            _ => None,
        };
        Some(EdgeRoute {
            points: e.points.iter().map(|p| point(p.x, p.y)).collect(),
            label,
        })
    }
}
