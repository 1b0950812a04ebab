//! Compound-graph layout.
//!
//! Every subgraph whose direction differs from the scope it sits in is laid out on its own and
//! frozen into a fixed-size record; the enclosing scope then sees it as a single leaf. Each scope
//! is one run of the layered primitive. After the root scope is composed, header bands are
//! reserved for labeled groups, disconnected components are pulled apart and the canvas is
//! shifted so nothing sits inside the padding.

mod compose;
mod header;
mod pass;
mod precompute;
mod redirect;
mod separate;

pub use precompute::PreComputedSubgraph;

use crate::config::{LayoutOptions, RenderOptions};
use crate::geom::{Bounds, Size, bounds_from_top_left, hull};
use crate::model::{
    GraphModel, PositionedEdge, PositionedGraph, PositionedGroup, PositionedNode, Style, Subgraph,
};
use crate::size::{MIN_NODE_HEIGHT, MIN_NODE_WIDTH, estimate_node_size};
use crate::style::{effective_text_style, resolve_node_style};
use crate::text::TextMetrics;
use crate::{Error, Result};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::{Duration, Instant};

const EDGE_LABEL_PADDING: f64 = 4.0;

pub async fn layout_graph(model: &GraphModel, options: &LayoutOptions) -> Result<PositionedGraph> {
    layout_graph_sync(model, options)
}

pub fn layout_graph_sync(model: &GraphModel, options: &LayoutOptions) -> Result<PositionedGraph> {
    let timing_enabled = std::env::var("NARWHAL_LAYOUT_TIMING")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let total_start = timing_enabled.then(Instant::now);

    let span = tracing::debug_span!(
        "layout_graph",
        direction = %model.direction,
        nodes = model.nodes.len(),
        edges = model.edges.len(),
        subgraphs = model.subgraphs.len(),
    );
    let _enter = span.enter();

    validate_edges(model)?;

    let mut ctx = LayoutContext::new(model, options);
    let root = pass::Scope {
        name: "root",
        direction: model.direction,
        nodes: ctx.root_nodes(),
        subgraphs: &model.subgraphs,
    };
    let pool: Vec<usize> = (0..model.edges.len()).collect();
    let mut out = pass::layout_scope(&mut ctx, &root, &pool)?;

    let normalize_start = timing_enabled.then(Instant::now);
    let render = &options.render;
    header::reserve_header_space(&mut out.groups, render, &|label: &str| {
        ctx.label_metrics(label).width
    });

    let (unit_of, unit_count) = ctx.top_level_units(&root.nodes);
    separate::separate_components(
        &mut out,
        &unit_of,
        unit_count,
        &model.edges,
        model.direction,
        render.node_spacing,
    );

    let (width, height) = normalize_canvas(&mut out, render.padding);

    let mut nodes = out.nodes;
    nodes.sort_by_key(|n| model.nodes.get_index_of(n.id.as_str()).unwrap_or(usize::MAX));
    let mut edges = out.edges;
    edges.sort_by_key(|(idx, _)| *idx);
    let edges: Vec<PositionedEdge> = edges.into_iter().map(|(_, e)| e).collect();

    if let Some(s) = total_start {
        let normalize = normalize_start.map(|t| t.elapsed()).unwrap_or_default();
        eprintln!(
            concat!(
                "[layout-timing] total={:?} engine_calls={} engine_total={:?} ",
                "normalize={:?} nodes={} edges={}",
            ),
            s.elapsed(),
            ctx.timings.engine_calls,
            ctx.timings.engine,
            normalize,
            nodes.len(),
            edges.len(),
        );
    }

    Ok(PositionedGraph {
        width,
        height,
        nodes,
        edges,
        groups: out.groups,
    })
}

fn validate_edges(model: &GraphModel) -> Result<()> {
    let mut subgraph_ids = FxHashSet::default();
    collect_subgraph_ids(&model.subgraphs, &mut subgraph_ids);
    for (idx, e) in model.edges.iter().enumerate() {
        for id in [&e.source, &e.target] {
            if !model.nodes.contains_key(id.as_str()) && !subgraph_ids.contains(id.as_str()) {
                return Err(Error::InvalidModel {
                    message: format!(
                        "edge {idx} ({} -> {}) references unknown id {id}",
                        e.source, e.target
                    ),
                });
            }
        }
    }
    Ok(())
}

fn collect_subgraph_ids<'m>(subgraphs: &'m [Subgraph], out: &mut FxHashSet<&'m str>) {
    for sg in subgraphs {
        out.insert(sg.id.as_str());
        collect_subgraph_ids(&sg.children, out);
    }
}

#[derive(Debug, Default)]
pub(crate) struct LayoutTimings {
    pub engine_calls: u32,
    pub engine: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct NodeInfo {
    pub size: Size,
    pub style: Style,
}

/// Per-call state shared by every scope.
pub(crate) struct LayoutContext<'m> {
    pub model: &'m GraphModel,
    pub options: &'m LayoutOptions,
    /// Nodes that take part in the layout, with resolved style and size.
    pub nodes: IndexMap<String, NodeInfo>,
    /// Subgraph id to the nodes it owns, in declared order.
    pub owned: FxHashMap<String, Vec<String>>,
    /// Node id to owning subgraph id.
    pub owner: FxHashMap<String, String>,
    pub timings: LayoutTimings,
}

impl<'m> LayoutContext<'m> {
    pub fn new(model: &'m GraphModel, options: &'m LayoutOptions) -> Self {
        let mut subgraph_ids = FxHashSet::default();
        collect_subgraph_ids(&model.subgraphs, &mut subgraph_ids);

        let measurer = options.text_measurer.as_ref();
        let mut nodes = IndexMap::new();
        for (id, node) in &model.nodes {
            if subgraph_ids.contains(id.as_str()) {
                tracing::debug!(node = %id, "excluding node that shares its id with a subgraph");
                continue;
            }
            let style = resolve_node_style(&model.styles, id);
            let text_style = effective_text_style(&options.render.font, &style);
            let size = estimate_node_size(id, &node.label, node.shape, &text_style, measurer);
            nodes.insert(id.clone(), NodeInfo { size, style });
        }

        let mut ctx = Self {
            model,
            options,
            nodes,
            owned: FxHashMap::default(),
            owner: FxHashMap::default(),
            timings: LayoutTimings::default(),
        };
        for sg in &model.subgraphs {
            ctx.claim_members(sg);
        }
        ctx
    }

    /// Children claim their nodes before their parent does.
    fn claim_members(&mut self, sg: &Subgraph) {
        for child in &sg.children {
            self.claim_members(child);
        }
        let mut owned = Vec::new();
        for id in &sg.nodes {
            if !self.nodes.contains_key(id.as_str()) || self.owner.contains_key(id.as_str()) {
                continue;
            }
            self.owner.insert(id.clone(), sg.id.clone());
            owned.push(id.clone());
        }
        self.owned.insert(sg.id.clone(), owned);
    }

    pub fn render(&self) -> &RenderOptions {
        &self.options.render
    }

    pub fn root_nodes(&self) -> Vec<String> {
        self.nodes
            .keys()
            .filter(|id| !self.owner.contains_key(id.as_str()))
            .cloned()
            .collect()
    }

    pub fn owned_nodes(&self, subgraph: &str) -> &[String] {
        self.owned.get(subgraph).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_members(&self, sg: &Subgraph) -> bool {
        !self.owned_nodes(&sg.id).is_empty() || !sg.children.is_empty()
    }

    pub fn node_size(&self, id: &str) -> Size {
        self.nodes
            .get(id)
            .map(|n| n.size)
            .unwrap_or_else(|| Size::new(MIN_NODE_WIDTH, MIN_NODE_HEIGHT))
    }

    pub fn label_metrics(&self, text: &str) -> TextMetrics {
        self.options
            .text_measurer
            .measure(text, &self.options.render.font)
    }

    pub fn edge_label_size(&self, text: &str) -> Size {
        let m = self.label_metrics(text);
        Size::new(
            m.width + 2.0 * EDGE_LABEL_PADDING,
            m.height + 2.0 * EDGE_LABEL_PADDING,
        )
    }

    /// Leaf size for a subgraph without members.
    pub fn empty_group_size(&self, sg: &Subgraph) -> Size {
        let text = if sg.label.trim().is_empty() { &sg.id } else { &sg.label };
        let m = self.label_metrics(text);
        let pad = self.render().group_content_padding;
        Size::new(
            (m.width + 2.0 * pad).max(MIN_NODE_WIDTH),
            (m.height + 2.0 * pad).max(MIN_NODE_HEIGHT),
        )
    }

    /// Node and subgraph ids of `sg`'s interior, excluding `sg` itself.
    pub fn member_ids(&self, sg: &Subgraph) -> FxHashSet<String> {
        let mut out = FxHashSet::default();
        self.collect_member_ids(sg, &mut out);
        out
    }

    fn collect_member_ids(&self, sg: &Subgraph, out: &mut FxHashSet<String>) {
        out.extend(self.owned_nodes(&sg.id).iter().cloned());
        for child in &sg.children {
            out.insert(child.id.clone());
            self.collect_member_ids(child, out);
        }
    }

    /// Maps every node and subgraph id to the index of the top-level unit containing it.
    pub fn top_level_units(&self, root_nodes: &[String]) -> (FxHashMap<String, usize>, usize) {
        let mut unit_of = FxHashMap::default();
        let mut next = 0usize;
        for id in root_nodes {
            unit_of.insert(id.clone(), next);
            next += 1;
        }
        for sg in &self.model.subgraphs {
            unit_of.insert(sg.id.clone(), next);
            for id in self.member_ids(sg) {
                unit_of.insert(id, next);
            }
            next += 1;
        }
        (unit_of, next)
    }
}

/// Geometry produced for one scope, in that scope's coordinate space.
#[derive(Debug, Default, Clone)]
pub(crate) struct ScopeLayout {
    pub nodes: Vec<PositionedNode>,
    pub groups: Vec<PositionedGroup>,
    /// Edges keyed by their index in the model's edge list.
    pub edges: Vec<(usize, PositionedEdge)>,
}

impl ScopeLayout {
    pub fn translate(&mut self, dx: f64, dy: f64) {
        for n in &mut self.nodes {
            n.x += dx;
            n.y += dy;
        }
        for g in &mut self.groups {
            g.translate(dx, dy);
        }
        for (_, e) in &mut self.edges {
            translate_edge(e, dx, dy);
        }
    }

    /// Union of node boxes, group boxes, edge points and edge label boxes.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut acc = BoundsAcc::default();
        for n in &self.nodes {
            acc.add(node_bounds(n));
        }
        for g in &self.groups {
            acc.add_group(g);
        }
        for (_, e) in &self.edges {
            acc.add_edge(e);
        }
        acc.finish()
    }
}

pub(crate) fn translate_edge(e: &mut PositionedEdge, dx: f64, dy: f64) {
    for p in &mut e.points {
        p.x += dx;
        p.y += dy;
    }
    if let Some(p) = &mut e.label_position {
        p.x += dx;
        p.y += dy;
    }
}

pub(crate) fn node_bounds(n: &PositionedNode) -> Bounds {
    bounds_from_top_left(n.x, n.y, n.width, n.height)
}

pub(crate) fn group_bounds(g: &PositionedGroup) -> Bounds {
    bounds_from_top_left(g.x, g.y, g.width, g.height)
}

#[derive(Debug, Default)]
pub(crate) struct BoundsAcc {
    b: Option<Bounds>,
}

impl BoundsAcc {
    pub fn add(&mut self, other: Bounds) {
        self.b = Some(match self.b {
            Some(b) => hull(&b, &other),
            None => other,
        });
    }

    pub fn add_point(&mut self, x: f64, y: f64) {
        self.add(bounds_from_top_left(x, y, 0.0, 0.0));
    }

    pub fn add_group(&mut self, g: &PositionedGroup) {
        self.add(group_bounds(g));
        for c in &g.children {
            self.add_group(c);
        }
    }

    /// Edge points plus the label box, when the edge has one.
    pub fn add_edge(&mut self, e: &PositionedEdge) {
        for p in &e.points {
            self.add_point(p.x, p.y);
        }
        if let Some(p) = e.label_position {
            let (w, h) = e.label_size.map(|s| (s.width, s.height)).unwrap_or((0.0, 0.0));
            self.add(bounds_from_top_left(p.x - w / 2.0, p.y - h / 2.0, w, h));
        }
    }

    pub fn finish(self) -> Option<Bounds> {
        self.b
    }
}

/// Shifts geometry out of the padding band and returns the canvas size.
fn normalize_canvas(out: &mut ScopeLayout, padding: f64) -> (f64, f64) {
    let Some(b) = out.bounds() else {
        return (2.0 * padding, 2.0 * padding);
    };
    let dx = if b.min.x < padding { padding - b.min.x } else { 0.0 };
    let dy = if b.min.y < padding { padding - b.min.y } else { 0.0 };
    if dx != 0.0 || dy != 0.0 {
        out.translate(dx, dy);
    }
    (b.max.x + dx + padding, b.max.y + dy + padding)
}
