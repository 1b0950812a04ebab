use narwhal::{
    Direction, Edge, GraphModel, LayoutOptions, NodeShape, PositionedGraph, PositionedGroup,
    PositionedNode, Subgraph, layout_graph, layout_graph_sync,
};
use std::path::PathBuf;

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
}

fn load_fixture(name: &str) -> GraphModel {
    let path = workspace_root().join("fixtures").join(name);
    let text = std::fs::read_to_string(&path).expect("fixture");
    serde_json::from_str(&text).expect("fixture json")
}

fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn approx_gt(a: f64, b: f64) -> bool {
    a > b + 1e-6
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Rect {
    fn of_node(n: &PositionedNode) -> Self {
        Self {
            x0: n.x,
            y0: n.y,
            x1: n.x + n.width,
            y1: n.y + n.height,
        }
    }

    fn of_group(g: &PositionedGroup) -> Self {
        Self {
            x0: g.x,
            y0: g.y,
            x1: g.x + g.width,
            y1: g.y + g.height,
        }
    }

    fn union(self, o: Rect) -> Self {
        Self {
            x0: self.x0.min(o.x0),
            y0: self.y0.min(o.y0),
            x1: self.x1.max(o.x1),
            y1: self.y1.max(o.y1),
        }
    }

    /// Touching edges do not count as overlap.
    fn overlaps(&self, o: &Rect) -> bool {
        self.x0 < o.x1 - 1e-6
            && o.x0 < self.x1 - 1e-6
            && self.y0 < o.y1 - 1e-6
            && o.y0 < self.y1 - 1e-6
    }

    fn contains(&self, o: &Rect) -> bool {
        self.x0 <= o.x0 + 1e-6
            && self.y0 <= o.y0 + 1e-6
            && self.x1 + 1e-6 >= o.x1
            && self.y1 + 1e-6 >= o.y1
    }
}

fn node_rect(g: &PositionedGraph, id: &str) -> Rect {
    Rect::of_node(g.node(id).unwrap_or_else(|| panic!("node {id}")))
}

fn group_rect(g: &PositionedGraph, id: &str) -> Rect {
    Rect::of_group(g.group(id).unwrap_or_else(|| panic!("group {id}")))
}

fn chain(m: &mut GraphModel, ids: &[&str]) {
    for id in ids {
        m.add_node(*id, *id, NodeShape::Rectangle);
    }
    for pair in ids.windows(2) {
        m.add_edge(pair[0], pair[1]);
    }
}

fn assert_well_formed(g: &PositionedGraph) {
    for n in &g.nodes {
        assert!(n.x.is_finite() && n.y.is_finite(), "node {} position", n.id);
        assert!(n.width > 0.0 && n.height > 0.0, "node {} size", n.id);
        assert!(n.x >= 0.0 && n.y >= 0.0, "node {} inside canvas", n.id);
        assert!(n.x + n.width <= g.width + 1e-6, "node {} right edge", n.id);
        assert!(n.y + n.height <= g.height + 1e-6, "node {} bottom edge", n.id);
    }
    for e in &g.edges {
        assert!(e.points.len() >= 2, "edge {} -> {} points", e.source, e.target);
        for p in &e.points {
            assert!(p.x.is_finite() && p.y.is_finite());
            assert!(p.x >= 0.0 && p.y >= 0.0);
        }
    }
    fn walk(g: &PositionedGroup) {
        assert!(g.x >= 0.0 && g.y >= 0.0, "group {} inside canvas", g.id);
        let outer = Rect::of_group(g);
        for c in &g.children {
            assert!(outer.contains(&Rect::of_group(c)), "group {} contains {}", g.id, c.id);
            walk(c);
        }
    }
    for grp in &g.groups {
        walk(grp);
    }
}

#[test]
fn isolated_nodes_are_all_placed_without_overlap() {
    let mut m = GraphModel::new(Direction::LR);
    for id in ["A", "B", "C", "D", "E"] {
        m.add_node(id, id, NodeShape::Rectangle);
    }
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");

    assert_eq!(g.nodes.len(), 5);
    assert!(g.edges.is_empty());
    assert_well_formed(&g);
    for (i, a) in g.nodes.iter().enumerate() {
        for b in &g.nodes[i + 1..] {
            assert!(
                !Rect::of_node(a).overlaps(&Rect::of_node(b)),
                "{} overlaps {}",
                a.id,
                b.id
            );
        }
    }
}

#[test]
fn sibling_groups_do_not_overlap() {
    let m = load_fixture("today_next_wave.json");
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");
    assert_well_formed(&g);

    assert_eq!(g.nodes.len(), 7);
    assert_eq!(g.edges.len(), 5);
    assert_eq!(g.groups.len(), 2);

    let today = group_rect(&g, "Today");
    let next = group_rect(&g, "Tomorrow");
    assert!(!today.overlaps(&next), "{today:?} overlaps {next:?}");
    assert_eq!(g.group("Tomorrow").map(|grp| grp.label.as_str()), Some("Next Wave"));

    for id in ["A", "B", "C", "D"] {
        assert!(today.contains(&node_rect(&g, id)), "Today contains {id}");
    }
    for id in ["E", "F", "G"] {
        assert!(next.contains(&node_rect(&g, id)), "Next Wave contains {id}");
    }

    // Ranks advance left to right.
    let centers: Vec<f64> = ["A", "B", "C", "D"]
        .iter()
        .map(|id| {
            let r = node_rect(&g, id);
            (r.x0 + r.x1) / 2.0
        })
        .collect();
    for w in centers.windows(2) {
        assert!(approx_gt(w[1], w[0]));
    }
}

#[test]
fn labeled_group_reserves_header_above_its_nodes() {
    let m = load_fixture("today_next_wave.json");
    let opts = LayoutOptions::default();
    let g = layout_graph_sync(&m, &opts).expect("layout ok");

    let today = group_rect(&g, "Today");
    let top_node = ["A", "B", "C", "D"]
        .iter()
        .map(|id| node_rect(&g, id).y0)
        .fold(f64::INFINITY, f64::min);
    assert!(top_node - today.y0 >= opts.render.group_header_height - 1e-6);
}

#[test]
fn nested_group_headers_clear_sibling_nodes() {
    for direction in [Direction::LR, Direction::RL, Direction::TB, Direction::BT] {
        let mut m = GraphModel::new(direction);
        chain(&mut m, &["n", "q"]);
        chain(&mut m, &["z", "w"]);
        m.subgraphs.push(
            Subgraph::new("G", "Outer")
                .with_nodes(["n", "q"])
                .with_child(
                    Subgraph::new("M", "Middle")
                        .with_child(Subgraph::new("I", "Inner").with_nodes(["z", "w"])),
                ),
        );
        let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");
        assert_well_formed(&g);

        let outer = group_rect(&g, "G");
        let middle = group_rect(&g, "M");
        let inner = group_rect(&g, "I");
        assert!(outer.contains(&middle), "{direction}: G contains M");
        assert!(middle.contains(&inner), "{direction}: M contains I");
        for id in ["n", "q"] {
            let r = node_rect(&g, id);
            assert!(outer.contains(&r), "{direction}: G contains {id}");
            assert!(!middle.overlaps(&r), "{direction}: M {middle:?} overlaps {id} {r:?}");
        }
        for id in ["z", "w"] {
            assert!(inner.contains(&node_rect(&g, id)), "{direction}: I contains {id}");
        }
    }
}

fn embedded_lr_model(with_sibling: bool) -> GraphModel {
    let mut m = GraphModel::new(Direction::TB);
    chain(&mut m, &["a", "b", "c"]);
    m.subgraphs.push(
        Subgraph::new("S", "Sideways")
            .with_direction(Direction::LR)
            .with_nodes(["a", "b", "c"]),
    );
    if with_sibling {
        chain(&mut m, &["x", "y"]);
        m.add_node("z", "Loose", NodeShape::Rounded);
        m.subgraphs
            .push(Subgraph::new("T", "Other").with_nodes(["x", "y"]));
    }
    m
}

#[test]
fn differently_directed_subgraph_is_unaffected_by_siblings() {
    let opts = LayoutOptions::default();
    let alone = layout_graph_sync(&embedded_lr_model(false), &opts).expect("layout ok");
    let shared = layout_graph_sync(&embedded_lr_model(true), &opts).expect("layout ok");
    assert_well_formed(&alone);
    assert_well_formed(&shared);

    let s1 = group_rect(&alone, "S");
    let s2 = group_rect(&shared, "S");
    assert!(approx_eq(s1.x1 - s1.x0, s2.x1 - s2.x0));
    assert!(approx_eq(s1.y1 - s1.y0, s2.y1 - s2.y0));

    for id in ["a", "b", "c"] {
        let n1 = node_rect(&alone, id);
        let n2 = node_rect(&shared, id);
        assert!(approx_eq(n1.x0 - s1.x0, n2.x0 - s2.x0), "{id} x offset");
        assert!(approx_eq(n1.y0 - s1.y0, n2.y0 - s2.y0), "{id} y offset");
    }

    // The subgraph flows left to right even though the root flows top to bottom.
    let (a, b, c) = (node_rect(&alone, "a"), node_rect(&alone, "b"), node_rect(&alone, "c"));
    assert!(approx_gt(b.x0, a.x0) && approx_gt(c.x0, b.x0));
    assert!(approx_eq(a.y0, b.y0) && approx_eq(b.y0, c.y0));
}

#[test]
fn nested_subgraph_with_root_direction_flows_with_its_parent() {
    let mut m = GraphModel::new(Direction::TB);
    chain(&mut m, &["c", "d"]);
    m.add_node("top", "Top", NodeShape::Rectangle);
    m.add_edge("top", "L");
    m.subgraphs.push(
        Subgraph::new("L", "Sideways").with_direction(Direction::LR).with_child(
            Subgraph::new("T", "Declared TB")
                .with_direction(Direction::TB)
                .with_nodes(["c", "d"]),
        ),
    );
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");
    assert_well_formed(&g);

    let (c, d) = (node_rect(&g, "c"), node_rect(&g, "d"));
    assert!(d.x0 >= c.x1 - 1e-6, "d should sit right of c: {c:?} {d:?}");
    assert!(d.y0 < c.y1 && c.y0 < d.y1, "c and d share a row: {c:?} {d:?}");
    assert!(group_rect(&g, "T").contains(&c) && group_rect(&g, "T").contains(&d));
    assert!(group_rect(&g, "L").contains(&group_rect(&g, "T")));
}

fn components_model(direction: Direction) -> GraphModel {
    let mut m = GraphModel::new(direction);
    chain(&mut m, &["p1", "p2", "p3"]);
    chain(&mut m, &["q1", "q2"]);
    m.add_node("solo", "A rather long label", NodeShape::Rectangle);
    m.add_node("r1", "r1", NodeShape::Diamond);
    m.add_node("r2", "r2", NodeShape::Circle);
    m.add_edge("r1", "r2");
    m.subgraphs
        .push(Subgraph::new("G", "Grouped").with_nodes(["r1", "r2"]));

    let across = if direction.is_vertical() {
        Direction::LR
    } else {
        Direction::TB
    };
    chain(&mut m, &["o1", "o2", "o3"]);
    m.subgraphs.push(
        Subgraph::new("O", "Across")
            .with_direction(across)
            .with_nodes(["o1", "o2", "o3"]),
    );

    m.add_node("n1", "Outer node", NodeShape::Rectangle);
    m.add_node("m1", "Inner node", NodeShape::Rounded);
    m.add_edge("n1", "m1");
    m.subgraphs.push(
        Subgraph::new("N", "Nested")
            .with_nodes(["n1"])
            .with_child(Subgraph::new("M", "Inner").with_nodes(["m1"])),
    );
    m
}

#[test]
fn disconnected_components_never_overlap() {
    for direction in [Direction::TB, Direction::BT, Direction::LR, Direction::RL] {
        let m = components_model(direction);
        let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");
        assert_well_formed(&g);

        let unit = |ids: &[&str]| {
            ids.iter()
                .map(|id| node_rect(&g, id))
                .reduce(Rect::union)
                .expect("non-empty")
        };
        let components = [
            unit(&["p1", "p2", "p3"]),
            unit(&["q1", "q2"]),
            unit(&["solo"]),
            group_rect(&g, "G"),
            group_rect(&g, "O"),
            group_rect(&g, "N"),
        ];
        for (i, a) in components.iter().enumerate() {
            for b in &components[i + 1..] {
                assert!(!a.overlaps(b), "{direction}: {a:?} overlaps {b:?}");
            }
        }
        assert!(group_rect(&g, "N").contains(&group_rect(&g, "M")));
        for id in ["o1", "o2", "o3"] {
            assert!(group_rect(&g, "O").contains(&node_rect(&g, id)), "{direction}: O holds {id}");
        }
    }
}

#[test]
fn edge_into_precomputed_diamond_ends_on_its_outline() {
    let mut m = GraphModel::new(Direction::TB);
    m.add_node("src", "Source", NodeShape::Rectangle);
    m.add_node("dia", "Choose", NodeShape::Diamond);
    m.add_node("next", "Next", NodeShape::Rectangle);
    m.add_edge("dia", "next");
    m.add_edge("src", "dia");
    m.subgraphs.push(
        Subgraph::new("P", "Decisions")
            .with_direction(Direction::LR)
            .with_nodes(["dia", "next"]),
    );
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");
    assert_well_formed(&g);

    let d = g.node("dia").expect("dia");
    let (cx, cy) = (d.x + d.width / 2.0, d.y + d.height / 2.0);
    let into = &g.edges[1];
    assert_eq!((into.source.as_str(), into.target.as_str()), ("src", "dia"));
    let end = *into.points.last().expect("points");
    let l1 = (end.x - cx).abs() / (d.width / 2.0) + (end.y - cy).abs() / (d.height / 2.0);
    assert!((l1 - 1.0).abs() < 1e-6, "endpoint off the diamond outline: {l1}");
    for w in into.points.windows(2) {
        assert!(approx_eq(w[0].x, w[1].x) || approx_eq(w[0].y, w[1].y));
    }
}

#[test]
fn horizontal_flow_stacks_components_vertically() {
    let mut m = GraphModel::new(Direction::LR);
    chain(&mut m, &["a1", "a2", "a3"]);
    chain(&mut m, &["b1", "b2", "b3"]);
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");

    let span = |ids: &[&str]| {
        ids.iter()
            .map(|id| node_rect(&g, id))
            .reduce(Rect::union)
            .expect("non-empty")
    };
    let a = span(&["a1", "a2", "a3"]);
    let b = span(&["b1", "b2", "b3"]);
    assert!(a.y1 <= b.y0 + 1e-6 || b.y1 <= a.y0 + 1e-6, "{a:?} vs {b:?}");
}

#[test]
fn vertical_flow_places_components_side_by_side() {
    let mut m = GraphModel::new(Direction::TB);
    chain(&mut m, &["a1", "a2", "a3"]);
    chain(&mut m, &["b1", "b2", "b3"]);
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");

    let span = |ids: &[&str]| {
        ids.iter()
            .map(|id| node_rect(&g, id))
            .reduce(Rect::union)
            .expect("non-empty")
    };
    let a = span(&["a1", "a2", "a3"]);
    let b = span(&["b1", "b2", "b3"]);
    assert!(a.x1 <= b.x0 + 1e-6 || b.x1 <= a.x0 + 1e-6, "{a:?} vs {b:?}");
}

#[test]
fn back_edge_keeps_rank_spread() {
    let mut m = GraphModel::new(Direction::TB);
    chain(&mut m, &["S", "A", "B", "C"]);
    m.add_edge("C", "A");
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");
    assert_well_formed(&g);

    let y = |id: &str| g.node(id).map(|n| n.y + n.height / 2.0).expect("node");
    assert!(approx_gt(y("A"), y("S")), "A below S");
    assert!(approx_gt(y("B"), y("A")), "B below A");
    assert!(approx_gt(y("C"), y("B")), "C below B");
    assert_eq!(g.edges.len(), 4);
    assert_eq!((g.edges[3].source.as_str(), g.edges[3].target.as_str()), ("C", "A"));
}

#[test]
fn diamond_and_circle_endpoints_sit_on_their_outlines() {
    let mut m = GraphModel::new(Direction::TB);
    m.add_node("A", "Begin", NodeShape::Rectangle);
    m.add_node("D", "Decide", NodeShape::Diamond);
    m.add_node("O", "End", NodeShape::Circle);
    m.add_edge("A", "D");
    m.add_edge("D", "O");
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");
    assert_well_formed(&g);

    let d = g.node("D").expect("D");
    let (dcx, dcy) = (d.x + d.width / 2.0, d.y + d.height / 2.0);
    let end = *g.edges[0].points.last().expect("points");
    let l1 = (end.x - dcx).abs() / (d.width / 2.0) + (end.y - dcy).abs() / (d.height / 2.0);
    assert!((l1 - 1.0).abs() < 1e-6, "diamond endpoint off outline: {l1}");

    let start = g.edges[1].points[0];
    let l1 = (start.x - dcx).abs() / (d.width / 2.0) + (start.y - dcy).abs() / (d.height / 2.0);
    assert!((l1 - 1.0).abs() < 1e-6, "diamond start off outline: {l1}");

    let o = g.node("O").expect("O");
    let (ocx, ocy) = (o.x + o.width / 2.0, o.y + o.height / 2.0);
    let end = *g.edges[1].points.last().expect("points");
    let r = o.width.min(o.height) / 2.0;
    let dist = ((end.x - ocx).powi(2) + (end.y - ocy).powi(2)).sqrt();
    assert!((dist - r).abs() < 1e-6, "circle endpoint at {dist}, radius {r}");
}

#[test]
fn edge_routes_are_orthogonal_between_plain_boxes() {
    let m = load_fixture("today_next_wave.json");
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");
    for e in &g.edges {
        for w in e.points.windows(2) {
            assert!(
                approx_eq(w[0].x, w[1].x) || approx_eq(w[0].y, w[1].y),
                "diagonal segment in {} -> {}",
                e.source,
                e.target
            );
        }
    }
}

#[test]
fn mixed_direction_fixture_lays_out() {
    let m = load_fixture("mixed_directions.json");
    let g = futures::executor::block_on(layout_graph(&m, &LayoutOptions::default()))
        .expect("layout ok");
    assert_well_formed(&g);

    assert_eq!(g.nodes.len(), 6);
    assert_eq!(g.edges.len(), 6);
    let ids: Vec<&str> = g.nodes.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(ids, ["start", "check", "fetch", "parse", "store", "done"]);

    let pipeline = group_rect(&g, "pipeline");
    for id in ["fetch", "parse", "store"] {
        assert!(pipeline.contains(&node_rect(&g, id)), "pipeline contains {id}");
    }
    let (f, p, s) = (node_rect(&g, "fetch"), node_rect(&g, "parse"), node_rect(&g, "store"));
    assert!(approx_gt(p.x0, f.x0) && approx_gt(s.x0, p.x0));

    let start = g.node("start").expect("start");
    assert_eq!((start.width, start.height), (28.0, 28.0));

    let check = g.node("check").expect("check");
    assert_eq!(check.style.get("stroke").map(String::as_str), Some("#c00"));
    assert_eq!(check.style.get("fill").map(String::as_str), Some("#f9f9f9"));
    let done = g.node("done").expect("done");
    assert_eq!(done.style.get("fill").map(String::as_str), Some("#9f9"));

    let retry = g
        .edges
        .iter()
        .find(|e| e.source == "check" && e.target == "check")
        .expect("self loop");
    assert_eq!(retry.points.len(), 5);
    assert!(retry.label_position.is_some());

    let into_group = &g.edges[1];
    assert_eq!(into_group.target, "pipeline");
    assert!(into_group.label_position.is_some());
}

#[test]
fn node_sharing_a_subgraph_id_is_dropped() {
    let mut m = GraphModel::new(Direction::TB);
    m.add_node("S", "S", NodeShape::Rectangle);
    m.add_node("a", "a", NodeShape::Rectangle);
    m.edges.push(Edge::new("a", "S"));
    m.subgraphs.push(Subgraph::new("S", "Group"));
    let g = layout_graph_sync(&m, &LayoutOptions::default()).expect("layout ok");

    assert!(g.node("S").is_none());
    assert!(g.group("S").is_some());
    assert_eq!(g.nodes.len(), 1);
    assert_eq!(g.edges.len(), 1);
}

#[test]
fn layout_is_deterministic() {
    let m = load_fixture("mixed_directions.json");
    let opts = LayoutOptions::default();
    let first = layout_graph_sync(&m, &opts).expect("layout ok");
    let second = layout_graph_sync(&m, &opts).expect("layout ok");
    assert_eq!(first, second);
}
