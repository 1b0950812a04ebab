//! Direction-override subgraphs are laid out in isolation and frozen before the enclosing scope
//! runs.

use super::pass::{self, Scope};
use super::{BoundsAcc, LayoutContext, ScopeLayout, group_bounds, node_bounds};
use crate::Result;
use crate::geom::{Bounds, Size, vector};
use crate::model::{Direction, PositionedEdge, PositionedGroup, PositionedNode, Subgraph};
use rustc_hash::FxHashSet;

/// A frozen subgraph layout. Coordinates are relative to the record's top-left corner.
#[derive(Debug, Clone)]
pub struct PreComputedSubgraph {
    pub id: String,
    pub label: String,
    pub direction: Direction,
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<PositionedNode>,
    /// Edges keyed by their index in the model's edge list.
    pub edges: Vec<(usize, PositionedEdge)>,
    pub groups: Vec<PositionedGroup>,
    /// Every node and nested subgraph id inside the record.
    pub node_ids: FxHashSet<String>,
    /// Indices of edges with both endpoints in `node_ids`.
    pub internal_edges: FxHashSet<usize>,
}

impl PreComputedSubgraph {
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Subgraphs below `subgraphs` whose direction differs from the root `direction`.
///
/// Does not descend into them; their own interiors are handled when they are precomputed. A
/// nested subgraph declaring the root direction is not an override, so it flows with the
/// enclosing override.
pub(crate) fn find_overrides<'m>(
    ctx: &LayoutContext<'m>,
    subgraphs: &'m [Subgraph],
    root: Direction,
    out: &mut Vec<&'m Subgraph>,
) {
    for sg in subgraphs {
        match sg.direction {
            Some(d) if d != root && ctx.has_members(sg) => out.push(sg),
            _ => find_overrides(ctx, &sg.children, root, out),
        }
    }
}

pub(crate) fn precompute<'m>(
    ctx: &mut LayoutContext<'m>,
    sg: &'m Subgraph,
    direction: Direction,
) -> Result<PreComputedSubgraph> {
    let node_ids = ctx.member_ids(sg);
    let pool: Vec<usize> = ctx
        .model
        .edges
        .iter()
        .enumerate()
        .filter(|(_, e)| node_ids.contains(&e.source) && node_ids.contains(&e.target))
        .map(|(i, _)| i)
        .collect();

    let scope = Scope {
        name: &sg.id,
        direction,
        nodes: ctx.owned_nodes(&sg.id).to_vec(),
        subgraphs: &sg.children,
    };
    let inner = pass::layout_scope(ctx, &scope, &pool)?;

    let record = freeze(ctx, sg, direction, inner, node_ids, pool.into_iter().collect());
    tracing::debug!(
        subgraph = %record.id,
        direction = %direction,
        width = record.width,
        height = record.height,
        nodes = record.nodes.len(),
        edges = record.edges.len(),
        "precomputed subgraph"
    );
    Ok(record)
}

/// Header band a labeled group will receive once the canvas is normalized.
fn reserved_bounds(acc: &mut BoundsAcc, g: &PositionedGroup, band: f64) {
    let mut b = group_bounds(g);
    if !g.label.trim().is_empty() {
        b.min.y -= band;
    }
    acc.add(b);
    for c in &g.children {
        reserved_bounds(acc, c, band);
    }
}

fn freeze(
    ctx: &LayoutContext<'_>,
    sg: &Subgraph,
    direction: Direction,
    mut inner: ScopeLayout,
    node_ids: FxHashSet<String>,
    internal_edges: FxHashSet<usize>,
) -> PreComputedSubgraph {
    let render = ctx.render();
    let pad = render.group_content_padding;
    let band = render.group_header_height + pad;

    let mut acc = BoundsAcc::default();
    for n in &inner.nodes {
        acc.add(node_bounds(n));
    }
    for g in &inner.groups {
        reserved_bounds(&mut acc, g, band);
    }
    for (_, e) in &inner.edges {
        acc.add_edge(e);
    }
    let content = acc.finish().unwrap_or_else(Bounds::zero);

    let mut width = content.width() + 2.0 * pad;
    let height = content.height() + 2.0 * pad;
    let title = if sg.label.trim().is_empty() {
        0.0
    } else {
        ctx.label_metrics(&sg.label).width + 2.0 * pad
    };
    let mut offset = vector(pad, pad) - content.min.to_vector();
    if title > width {
        offset.x += (title - width) / 2.0;
        width = title;
    }
    inner.translate(offset.x, offset.y);

    PreComputedSubgraph {
        id: sg.id.clone(),
        label: sg.label.clone(),
        direction,
        width,
        height,
        nodes: inner.nodes,
        edges: inner.edges,
        groups: inner.groups,
        node_ids,
        internal_edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutOptions;
    use crate::engine::testing::RecordingEngine;
    use crate::model::{Edge, GraphModel, NodeShape};
    use std::sync::Arc;

    fn model() -> GraphModel {
        let mut m = GraphModel::new(Direction::TB);
        for id in ["a", "b", "c", "out"] {
            m.add_node(id, id, NodeShape::Rectangle);
        }
        m.subgraphs.push(
            Subgraph::new("S", "A rather long subgraph title")
                .with_direction(Direction::LR)
                .with_nodes(["a", "b"])
                .with_child(Subgraph::new("T", "").with_nodes(["c"])),
        );
        m.edges.push(Edge::new("a", "b"));
        m.edges.push(Edge::new("b", "c"));
        m.edges.push(Edge::new("c", "out"));
        m
    }

    #[test]
    fn overrides_stop_at_the_first_differing_subgraph() {
        let m = model();
        let opts = LayoutOptions::default();
        let ctx = LayoutContext::new(&m, &opts);
        let mut found = Vec::new();
        find_overrides(&ctx, &m.subgraphs, Direction::TB, &mut found);
        assert_eq!(found.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(), ["S"]);

        let mut none = Vec::new();
        find_overrides(&ctx, &m.subgraphs, Direction::LR, &mut none);
        assert!(none.is_empty());
    }

    #[test]
    fn nested_subgraph_declaring_root_direction_follows_its_override() {
        let mut m = GraphModel::new(Direction::TB);
        for id in ["c", "d", "e", "f"] {
            m.add_node(id, id, NodeShape::Rectangle);
        }
        m.subgraphs.push(
            Subgraph::new("L", "Sideways")
                .with_direction(Direction::LR)
                .with_child(
                    Subgraph::new("T", "Same as root")
                        .with_direction(Direction::TB)
                        .with_nodes(["c", "d"]),
                )
                .with_child(
                    Subgraph::new("R", "Reversed")
                        .with_direction(Direction::RL)
                        .with_nodes(["e", "f"]),
                ),
        );
        m.add_edge("c", "d");
        m.add_edge("e", "f");

        let engine = RecordingEngine::default();
        let opts = LayoutOptions {
            engine: Arc::new(engine.clone()),
            ..Default::default()
        };
        let g = crate::layout::layout_graph_sync(&m, &opts).unwrap();

        let rec = engine.snapshot();
        let directions: Vec<Direction> = rec.configs.iter().map(|c| c.direction).collect();
        assert_eq!(directions, [Direction::RL, Direction::LR, Direction::TB]);
        assert!(rec.parents.contains(&("c".to_string(), "T".to_string())));
        assert!(!rec.parents.iter().any(|(c, _)| c == "e"));

        let (c, d) = (g.node("c").unwrap(), g.node("d").unwrap());
        assert!(d.x >= c.x + c.width, "{c:?} {d:?}");
        assert_eq!(c.y, d.y);
    }

    #[test]
    fn record_is_padded_and_title_fit() {
        let m = model();
        let opts = LayoutOptions {
            engine: Arc::new(RecordingEngine::default()),
            ..Default::default()
        };
        let mut ctx = LayoutContext::new(&m, &opts);
        let rec = precompute(&mut ctx, &m.subgraphs[0], Direction::LR).unwrap();

        assert_eq!(rec.internal_edges, [0usize, 1].into_iter().collect::<FxHashSet<_>>());
        assert!(rec.node_ids.contains("T"));
        assert!(rec.node_ids.contains("c"));
        assert!(!rec.node_ids.contains("out"));

        let pad = opts.render.group_content_padding;
        let title = ctx.label_metrics(&rec.label).width + 2.0 * pad;
        assert!(rec.width >= title);
        for n in &rec.nodes {
            assert!(n.x >= pad - 1e-9 && n.y >= pad - 1e-9, "{n:?}");
            assert!(n.x + n.width <= rec.width - pad + 1e-9);
            assert!(n.y + n.height <= rec.height - pad + 1e-9);
        }
        let ids: Vec<&str> = rec.nodes.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"a") && ids.contains(&"b") && ids.contains(&"c"));
    }
}
