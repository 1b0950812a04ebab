//! One primitive run per scope: graph building, endpoint redirection, spine weights and
//! extraction of node, group and edge geometry.

use super::compose::{self, group_anchor, node_anchor};
use super::precompute::{self, PreComputedSubgraph};
use super::redirect::RedirectMaps;
use super::{BoundsAcc, LayoutContext, ScopeLayout, group_bounds, node_bounds};
use crate::config::RenderOptions;
use crate::engine::{EdgeSpec, LayeredGraph, RankConfig};
use crate::geom::{
    Anchor, BendOrder, Bounds, Outline, Point, Size, bounds_from_center, center_to_top_left,
    finish_route, route_self_loop, to_layout_point,
};
use crate::model::{
    Direction, Edge, LayoutSize, PositionedEdge, PositionedGroup, PositionedNode, Subgraph,
};
use crate::{Error, Result};
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::time::Instant;

/// Weight of the first edge into a target; keeps that pair one rank apart.
pub(crate) const SPINE_WEIGHT: f64 = 2.0;
/// Weight of any later edge into an already introduced target.
pub(crate) const FEEDBACK_WEIGHT: f64 = 1.0;

const SELF_LOOP_PAD_RATIO: f64 = 0.4;

/// Default separation between dummy nodes.
const EDGE_SPACING: f64 = 10.0;

/// Header bands grow across the flow in LR/RL, into the gap the primitive leaves between
/// compound borders, so that gap must be at least one band.
fn edge_spacing(direction: Direction, render: &RenderOptions) -> f64 {
    if direction.is_vertical() {
        EDGE_SPACING
    } else {
        EDGE_SPACING.max(render.group_header_height + render.group_content_padding)
    }
}

/// The root graph, or the interior of a precomputed subgraph.
pub(crate) struct Scope<'m> {
    pub name: &'m str,
    pub direction: Direction,
    /// Nodes placed directly in the scope, outside any subgraph.
    pub nodes: Vec<String>,
    pub subgraphs: &'m [Subgraph],
}

struct SentEdge {
    idx: usize,
    key: String,
    source: String,
    target: String,
}

pub(crate) fn layout_scope<'m>(
    ctx: &mut LayoutContext<'m>,
    scope: &Scope<'m>,
    pool: &[usize],
) -> Result<ScopeLayout> {
    let mut overrides = Vec::new();
    precompute::find_overrides(ctx, scope.subgraphs, ctx.model.direction, &mut overrides);
    let mut table: IndexMap<String, PreComputedSubgraph> = IndexMap::new();
    for sg in overrides {
        let direction = sg.direction.unwrap_or(scope.direction);
        let rec = precompute::precompute(ctx, sg, direction)?;
        table.insert(sg.id.clone(), rec);
    }

    let model = ctx.model;
    let options = ctx.options;
    let render = &options.render;
    let mut g = options.engine.create(&RankConfig {
        direction: scope.direction,
        node_spacing: render.node_spacing,
        layer_spacing: render.layer_spacing,
        edge_spacing: edge_spacing(scope.direction, render),
    });

    for id in &scope.nodes {
        g.set_node(id, ctx.node_size(id));
    }
    for sg in scope.subgraphs {
        register_subgraph(ctx, g.as_mut(), sg, None, &table);
    }

    let interiors: FxHashMap<&str, &FxHashSet<String>> = table
        .iter()
        .map(|(id, r)| (id.as_str(), &r.node_ids))
        .collect();
    let redirects = RedirectMaps::build(scope.subgraphs, &ctx.owned, &interiors);

    let mut introduced: FxHashSet<String> = FxHashSet::default();
    let mut sent: Vec<SentEdge> = Vec::new();
    let mut deferred: Vec<usize> = Vec::new();
    for &idx in pool {
        if table.values().any(|r| r.internal_edges.contains(&idx)) {
            continue;
        }
        let e = &model.edges[idx];
        let source = redirects.source(&e.source);
        let target = redirects.target(&e.target);
        if e.source == e.target {
            deferred.push(idx);
            continue;
        }
        if source == target {
            tracing::debug!(
                edge = idx,
                source = %e.source,
                target = %e.target,
                via = %source,
                "edge collapses onto a single node"
            );
            deferred.push(idx);
            continue;
        }
        let weight = if introduced.insert(target.to_string()) {
            SPINE_WEIGHT
        } else {
            FEEDBACK_WEIGHT
        };
        let key = format!("e{idx}");
        g.set_edge(
            &key,
            source,
            target,
            EdgeSpec {
                weight,
                minlen: 1,
                label: e.label_text().map(|t| ctx.edge_label_size(t)),
            },
        );
        sent.push(SentEdge {
            idx,
            key,
            source: source.to_string(),
            target: target.to_string(),
        });
    }

    let start = Instant::now();
    let result = g.layout();
    ctx.timings.engine_calls += 1;
    ctx.timings.engine += start.elapsed();
    result.map_err(|message| Error::Layout {
        scope: scope.name.to_string(),
        direction: scope.direction,
        message,
    })?;

    let mut out = ScopeLayout::default();
    let mut anchors: FxHashMap<String, Anchor> = FxHashMap::default();
    for id in &scope.nodes {
        let n = place_node(ctx, g.as_ref(), scope, id)?;
        anchors.insert(id.clone(), node_anchor(&n));
        out.nodes.push(n);
    }
    for sg in scope.subgraphs {
        let group =
            extract_group(ctx, g.as_ref(), scope, sg, &table, &mut out.nodes, &mut anchors)?;
        out.groups.push(group);
    }

    let composed = compose::composite(&mut out, table);

    let bend = BendOrder::for_direction(scope.direction);
    for s in &sent {
        let e = &model.edges[s.idx];
        let (mut points, label) = match g.edge(&s.key) {
            Some(route) => (route.points, route.label),
            None => (Vec::new(), None),
        };
        let from = match composed.get(&e.source) {
            Some(a) => {
                if let Some(p) = points.first_mut() {
                    *p = a.center;
                }
                Some(*a)
            }
            None => anchors.get(&s.source).copied(),
        };
        let to = match composed.get(&e.target) {
            Some(a) => {
                if let Some(p) = points.last_mut() {
                    *p = a.center;
                }
                Some(*a)
            }
            None => anchors.get(&s.target).copied(),
        };
        let points = match (from, to) {
            (Some(from), Some(to)) => finish_route(&points, &from, &to, bend),
            _ => points,
        };
        out.edges.push((s.idx, positioned_edge(ctx, e, &points, label)));
    }

    let loop_pad = render.node_spacing * SELF_LOOP_PAD_RATIO;
    for idx in deferred {
        let e = &model.edges[idx];
        let from = lookup_anchor(&e.source, &composed, &anchors, &out.groups);
        let to = lookup_anchor(&e.target, &composed, &anchors, &out.groups);
        let (Some(from), Some(to)) = (from, to) else {
            continue;
        };
        let points = if e.source == e.target {
            route_self_loop(&from, scope.direction, loop_pad)
        } else {
            finish_route(&[], &from, &to, bend)
        };
        let label = e.label_text().map(|_| polyline_midpoint(&points));
        out.edges.push((idx, positioned_edge(ctx, e, &points, label)));
    }

    Ok(out)
}

fn register_subgraph(
    ctx: &LayoutContext<'_>,
    g: &mut dyn LayeredGraph,
    sg: &Subgraph,
    parent: Option<&str>,
    table: &IndexMap<String, PreComputedSubgraph>,
) {
    if let Some(rec) = table.get(&sg.id) {
        g.set_node(&sg.id, rec.size());
    } else if !ctx.has_members(sg) {
        g.set_node(&sg.id, ctx.empty_group_size(sg));
    } else {
        g.set_node(&sg.id, Size::zero());
        for id in ctx.owned_nodes(&sg.id) {
            g.set_node(id, ctx.node_size(id));
            g.set_parent(id, &sg.id);
        }
        for child in &sg.children {
            register_subgraph(ctx, g, child, Some(&sg.id), table);
        }
    }
    if let Some(p) = parent {
        g.set_parent(&sg.id, p);
    }
}

fn missing(scope: &Scope<'_>, id: &str) -> Error {
    Error::Layout {
        scope: scope.name.to_string(),
        direction: scope.direction,
        message: format!("{id} was not positioned"),
    }
}

fn place_node(
    ctx: &LayoutContext<'_>,
    g: &dyn LayeredGraph,
    scope: &Scope<'_>,
    id: &str,
) -> Result<PositionedNode> {
    let (Some(geom), Some(node), Some(info)) =
        (g.node(id), ctx.model.nodes.get(id), ctx.nodes.get(id))
    else {
        return Err(missing(scope, id));
    };
    let tl = center_to_top_left(geom.center, info.size);
    Ok(PositionedNode {
        id: id.to_string(),
        label: node.label.clone(),
        shape: node.shape,
        x: tl.x,
        y: tl.y,
        width: info.size.width,
        height: info.size.height,
        style: info.style.clone(),
    })
}

fn group_from_bounds(sg: &Subgraph, b: Bounds, children: Vec<PositionedGroup>) -> PositionedGroup {
    PositionedGroup {
        id: sg.id.clone(),
        label: sg.label.clone(),
        x: b.min.x,
        y: b.min.y,
        width: b.width(),
        height: b.height(),
        children,
    }
}

fn extract_group(
    ctx: &LayoutContext<'_>,
    g: &dyn LayeredGraph,
    scope: &Scope<'_>,
    sg: &Subgraph,
    table: &IndexMap<String, PreComputedSubgraph>,
    nodes: &mut Vec<PositionedNode>,
    anchors: &mut FxHashMap<String, Anchor>,
) -> Result<PositionedGroup> {
    if table.contains_key(&sg.id) || !ctx.has_members(sg) {
        let geom = g.node(&sg.id).ok_or_else(|| missing(scope, &sg.id))?;
        let size = table
            .get(&sg.id)
            .map(|r| r.size())
            .unwrap_or_else(|| ctx.empty_group_size(sg));
        let anchor = Anchor::new(geom.center, size, Outline::Rect);
        anchors.insert(sg.id.clone(), anchor);
        return Ok(group_from_bounds(sg, anchor.bounds(), Vec::new()));
    }

    let mut acc = BoundsAcc::default();
    if let Some(geom) = g.node(&sg.id) {
        if geom.size.width > 0.0 && geom.size.height > 0.0 {
            acc.add(bounds_from_center(geom.center, geom.size));
        }
    }
    for id in ctx.owned_nodes(&sg.id) {
        let n = place_node(ctx, g, scope, id)?;
        acc.add(node_bounds(&n));
        anchors.insert(id.clone(), node_anchor(&n));
        nodes.push(n);
    }
    let mut children = Vec::new();
    for child in &sg.children {
        let c = extract_group(ctx, g, scope, child, table, nodes, anchors)?;
        acc.add(group_bounds(&c));
        children.push(c);
    }
    let b = acc.finish().ok_or_else(|| missing(scope, &sg.id))?;
    Ok(group_from_bounds(sg, b, children))
}

fn lookup_anchor(
    id: &str,
    composed: &FxHashMap<String, Anchor>,
    anchors: &FxHashMap<String, Anchor>,
    groups: &[PositionedGroup],
) -> Option<Anchor> {
    composed
        .get(id)
        .or_else(|| anchors.get(id))
        .copied()
        .or_else(|| groups.iter().find_map(|g| g.find(id)).map(group_anchor))
}

fn positioned_edge(
    ctx: &LayoutContext<'_>,
    e: &Edge,
    points: &[Point],
    label: Option<Point>,
) -> PositionedEdge {
    let label_size = label
        .and(e.label_text())
        .map(|t| ctx.edge_label_size(t))
        .map(|s| LayoutSize {
            width: s.width,
            height: s.height,
        });
    PositionedEdge {
        source: e.source.clone(),
        target: e.target.clone(),
        label: e.label.clone(),
        style: e.style,
        arrow_start: e.arrow_start,
        arrow_end: e.arrow_end,
        points: points.iter().copied().map(to_layout_point).collect(),
        label_position: label.map(to_layout_point),
        label_size,
    }
}

/// Point halfway along the polyline's length.
fn polyline_midpoint(points: &[Point]) -> Point {
    let total: f64 = points.windows(2).map(|w| (w[1] - w[0]).length()).sum();
    let mut remaining = total / 2.0;
    for w in points.windows(2) {
        let len = (w[1] - w[0]).length();
        if len >= remaining && len > 0.0 {
            return w[0].lerp(w[1], remaining / len);
        }
        remaining -= len;
    }
    points.first().copied().unwrap_or_else(Point::origin)
}
