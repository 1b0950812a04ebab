//! Pulls apart disconnected components whose boxes overlap.

use super::{BoundsAcc, ScopeLayout, node_bounds, translate_edge};
use crate::geom::Bounds;
use crate::model::{Direction, Edge};
use rustc_hash::FxHashMap;

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[rb.max(ra)] = ra.min(rb);
        }
    }
}

/// Components are formed over top-level units (`unit_of` maps every node and subgraph id to
/// one). When any two component boxes intersect, all components are packed along the axis
/// perpendicular to the flow, `spacing` apart, keeping their current order on that axis.
pub(crate) fn separate_components(
    out: &mut ScopeLayout,
    unit_of: &FxHashMap<String, usize>,
    unit_count: usize,
    edges: &[Edge],
    direction: Direction,
    spacing: f64,
) {
    if unit_count < 2 {
        return;
    }
    let mut sets = DisjointSet::new(unit_count);
    for e in edges {
        if let (Some(&a), Some(&b)) = (unit_of.get(&e.source), unit_of.get(&e.target)) {
            sets.union(a, b);
        }
    }

    let component_of = |id: &str, sets: &mut DisjointSet| unit_of.get(id).map(|&u| sets.find(u));

    let mut boxes: FxHashMap<usize, BoundsAcc> = FxHashMap::default();
    for n in &out.nodes {
        if let Some(c) = component_of(&n.id, &mut sets) {
            boxes.entry(c).or_default().add(node_bounds(n));
        }
    }
    for g in &out.groups {
        if let Some(c) = component_of(&g.id, &mut sets) {
            boxes.entry(c).or_default().add_group(g);
        }
    }
    for (_, e) in &out.edges {
        if let Some(c) = component_of(&e.source, &mut sets) {
            boxes.entry(c).or_default().add_edge(e);
        }
    }

    let mut components: Vec<(usize, Bounds)> = boxes
        .into_iter()
        .filter_map(|(c, acc)| acc.finish().map(|b| (c, b)))
        .collect();
    if components.len() < 2 {
        return;
    }
    let overlapping = components.iter().enumerate().any(|(i, (_, a))| {
        components[i + 1..]
            .iter()
            .any(|(_, b)| a.intersects(b))
    });
    if !overlapping {
        return;
    }

    let vertical_flow = direction.is_vertical();
    let cross = |b: &Bounds| if vertical_flow { (b.min.x, b.max.x) } else { (b.min.y, b.max.y) };
    let main = |b: &Bounds| if vertical_flow { b.min.y } else { b.min.x };
    components.sort_by(|(ca, a), (cb, b)| {
        cross(a)
            .0
            .total_cmp(&cross(b).0)
            .then(main(a).total_cmp(&main(b)))
            .then(ca.cmp(cb))
    });

    let mut shift: FxHashMap<usize, f64> = FxHashMap::default();
    let mut cursor = cross(&components[0].1).0;
    for (c, b) in &components {
        let (lo, hi) = cross(b);
        shift.insert(*c, cursor - lo);
        cursor += (hi - lo) + spacing;
    }
    tracing::debug!(
        components = components.len(),
        direction = %direction,
        "packing overlapping components"
    );

    let delta = |d: f64| if vertical_flow { (d, 0.0) } else { (0.0, d) };
    for n in &mut out.nodes {
        if let Some(c) = component_of(&n.id, &mut sets) {
            let (dx, dy) = delta(shift.get(&c).copied().unwrap_or(0.0));
            n.x += dx;
            n.y += dy;
        }
    }
    for g in &mut out.groups {
        if let Some(c) = component_of(&g.id, &mut sets) {
            let (dx, dy) = delta(shift.get(&c).copied().unwrap_or(0.0));
            g.translate(dx, dy);
        }
    }
    for (_, e) in &mut out.edges {
        if let Some(c) = component_of(&e.source, &mut sets) {
            let (dx, dy) = delta(shift.get(&c).copied().unwrap_or(0.0));
            translate_edge(e, dx, dy);
        }
    }
}
