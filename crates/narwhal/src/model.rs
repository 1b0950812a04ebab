//! Graph model consumed by the layout and the positioned graph it produces.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Resolved style properties (`fill`, `stroke`, `font-size`, ...) in declaration order.
pub type Style = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(alias = "TD", alias = "td", alias = "tb")]
    TB,
    #[serde(alias = "bt")]
    BT,
    #[serde(alias = "lr")]
    LR,
    #[serde(alias = "rl")]
    RL,
}

impl Direction {
    /// Ranks advance along the y axis.
    pub fn is_vertical(self) -> bool {
        matches!(self, Direction::TB | Direction::BT)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::TB => "TB",
            Direction::BT => "BT",
            Direction::LR => "LR",
            Direction::RL => "RL",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "TB" | "TD" => Ok(Direction::TB),
            "BT" => Ok(Direction::BT),
            "LR" => Ok(Direction::LR),
            "RL" => Ok(Direction::RL),
            other => Err(format!("unknown direction: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeShape {
    #[default]
    Rectangle,
    Rounded,
    Stadium,
    Subroutine,
    Diamond,
    Circle,
    DoubleCircle,
    Hexagon,
    Trapezoid,
    TrapezoidAlt,
    Parallelogram,
    ParallelogramAlt,
    Cylinder,
    Asymmetric,
    StateStart,
    StateEnd,
}

impl NodeShape {
    pub fn is_diamond(self) -> bool {
        self == NodeShape::Diamond
    }

    pub fn is_round(self) -> bool {
        matches!(self, NodeShape::Circle | NodeShape::DoubleCircle)
    }

    /// Shapes whose box is always square.
    pub fn is_square(self) -> bool {
        self.is_diamond() || self.is_round() || self.is_pseudo_state()
    }

    pub fn is_pseudo_state(self) -> bool {
        matches!(self, NodeShape::StateStart | NodeShape::StateEnd)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeStyle {
    #[default]
    Solid,
    Dotted,
    Thick,
    Invisible,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub shape: NodeShape,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub style: EdgeStyle,
    #[serde(default)]
    pub arrow_start: bool,
    #[serde(default = "default_true")]
    pub arrow_end: bool,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: None,
            style: EdgeStyle::Solid,
            arrow_start: false,
            arrow_end: true,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub(crate) fn label_text(&self) -> Option<&str> {
        self.label.as_deref().filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subgraph {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub nodes: Vec<String>,
    #[serde(default)]
    pub children: Vec<Subgraph>,
}

impl Subgraph {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            ..Default::default()
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_nodes<I, S>(mut self, nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.nodes.extend(nodes.into_iter().map(Into::into));
        self
    }

    pub fn with_child(mut self, child: Subgraph) -> Self {
        self.children.push(child);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleMaps {
    #[serde(default)]
    pub class_defs: IndexMap<String, Style>,
    #[serde(default)]
    pub classes: IndexMap<String, Vec<String>>,
    #[serde(default)]
    pub inline_styles: IndexMap<String, Style>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphModel {
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub nodes: IndexMap<String, Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub subgraphs: Vec<Subgraph>,
    #[serde(default)]
    pub styles: StyleMaps,
}

impl GraphModel {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            ..Default::default()
        }
    }

    pub fn add_node(&mut self, id: impl Into<String>, label: impl Into<String>, shape: NodeShape) {
        self.nodes.insert(
            id.into(),
            Node {
                label: label.into(),
                shape,
            },
        );
    }

    pub fn add_edge(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.edges.push(Edge::new(source, target));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutSize {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedNode {
    pub id: String,
    pub label: String,
    pub shape: NodeShape,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedEdge {
    pub source: String,
    pub target: String,
    pub label: Option<String>,
    pub style: EdgeStyle,
    pub arrow_start: bool,
    pub arrow_end: bool,
    pub points: Vec<LayoutPoint>,
    /// Center of the label box.
    pub label_position: Option<LayoutPoint>,
    #[serde(default)]
    pub label_size: Option<LayoutSize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedGroup {
    pub id: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub children: Vec<PositionedGroup>,
}

impl PositionedGroup {
    /// Depth-first search through this group and its descendants.
    pub fn find(&self, id: &str) -> Option<&PositionedGroup> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut PositionedGroup> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    pub(crate) fn translate(&mut self, dx: f64, dy: f64) {
        self.x += dx;
        self.y += dy;
        for c in &mut self.children {
            c.translate(dx, dy);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionedGraph {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<PositionedNode>,
    pub edges: Vec<PositionedEdge>,
    pub groups: Vec<PositionedGroup>,
}

impl PositionedGraph {
    pub fn node(&self, id: &str) -> Option<&PositionedNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn group(&self, id: &str) -> Option<&PositionedGroup> {
        self.groups.iter().find_map(|g| g.find(id))
    }
}
