use super::{PreComputedSubgraph, ScopeLayout, translate_edge};
use crate::geom::{Anchor, Outline, Size, point};
use crate::model::{PositionedGroup, PositionedNode};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

/// Moves every record to its placeholder's top-left and splices it into `out`.
///
/// Returns the composed anchor of each node and nested group inside the records, keyed by id.
pub(crate) fn composite(
    out: &mut ScopeLayout,
    table: IndexMap<String, PreComputedSubgraph>,
) -> FxHashMap<String, Anchor> {
    let mut anchors = FxHashMap::default();
    for (id, mut rec) in table {
        let Some(placeholder) = out.groups.iter_mut().find_map(|g| g.find_mut(&id)) else {
            tracing::debug!(subgraph = %id, "no placeholder for precomputed subgraph");
            continue;
        };
        let (dx, dy) = (placeholder.x, placeholder.y);

        for g in &mut rec.groups {
            g.translate(dx, dy);
            collect_group_anchors(g, &mut anchors);
        }
        placeholder.children = rec.groups;

        for n in &mut rec.nodes {
            n.x += dx;
            n.y += dy;
            anchors.insert(n.id.clone(), node_anchor(n));
        }
        for (_, e) in &mut rec.edges {
            translate_edge(e, dx, dy);
        }
        out.nodes.extend(rec.nodes);
        out.edges.extend(rec.edges);
    }
    anchors
}

pub(crate) fn node_anchor(n: &PositionedNode) -> Anchor {
    Anchor::new(
        point(n.x + n.width / 2.0, n.y + n.height / 2.0),
        Size::new(n.width, n.height),
        Outline::from(n.shape),
    )
}

pub(crate) fn group_anchor(g: &PositionedGroup) -> Anchor {
    Anchor::new(
        point(g.x + g.width / 2.0, g.y + g.height / 2.0),
        Size::new(g.width, g.height),
        Outline::Rect,
    )
}

fn collect_group_anchors(g: &PositionedGroup, anchors: &mut FxHashMap<String, Anchor>) {
    anchors.insert(g.id.clone(), group_anchor(g));
    for c in &g.children {
        collect_group_anchors(c, anchors);
    }
}
