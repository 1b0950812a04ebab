//! Geometry adapter: coordinate conversion, boundary clipping and orthogonal edge snapping.
//!
//! The layered primitive reports node centers and edge polylines that end on bounding boxes.
//! These helpers move endpoints onto the real shape outline and make every segment axis-aligned.

use crate::model::{Direction, LayoutPoint, NodeShape};

pub type Unit = euclid::UnknownUnit;

pub type Point = euclid::Point2D<f64, Unit>;
pub type Vector = euclid::Vector2D<f64, Unit>;
pub type Size = euclid::Size2D<f64, Unit>;
pub type Bounds = euclid::Box2D<f64, Unit>;

const EPS: f64 = 1e-9;

pub fn point(x: f64, y: f64) -> Point {
    euclid::point2(x, y)
}

pub fn vector(x: f64, y: f64) -> Vector {
    euclid::vec2(x, y)
}

pub fn bounds_from_center(center: Point, size: Size) -> Bounds {
    let half = vector(size.width / 2.0, size.height / 2.0);
    Bounds::new(center - half, center + half)
}

pub fn bounds_from_top_left(x: f64, y: f64, width: f64, height: f64) -> Bounds {
    Bounds::new(point(x, y), point(x + width, y + height))
}

pub fn center_to_top_left(center: Point, size: Size) -> Point {
    point(center.x - size.width / 2.0, center.y - size.height / 2.0)
}

pub fn to_layout_point(p: Point) -> LayoutPoint {
    LayoutPoint { x: p.x, y: p.y }
}

/// Smallest box covering both, including degenerate (zero-area) boxes.
pub fn hull(a: &Bounds, b: &Bounds) -> Bounds {
    Bounds::new(a.min.min(b.min), a.max.max(b.max))
}

/// Which axis the inserted bend travels first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BendOrder {
    VerticalFirst,
    HorizontalFirst,
}

impl BendOrder {
    pub fn for_direction(direction: Direction) -> Self {
        if direction.is_vertical() {
            BendOrder::VerticalFirst
        } else {
            BendOrder::HorizontalFirst
        }
    }
}

/// Outline used when clipping an edge endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outline {
    Rect,
    Diamond,
    Circle,
}

impl From<NodeShape> for Outline {
    fn from(shape: NodeShape) -> Self {
        if shape.is_diamond() {
            Outline::Diamond
        } else if shape.is_round() || shape.is_pseudo_state() {
            Outline::Circle
        } else {
            Outline::Rect
        }
    }
}

/// The box an edge endpoint attaches to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub center: Point,
    pub size: Size,
    pub outline: Outline,
}

impl Anchor {
    pub fn new(center: Point, size: Size, outline: Outline) -> Self {
        Self {
            center,
            size,
            outline,
        }
    }

    pub fn bounds(&self) -> Bounds {
        bounds_from_center(self.center, self.size)
    }
}

/// Point on a diamond outline along the ray from its center toward `toward`.
pub fn clip_to_diamond(center: Point, size: Size, toward: Point) -> Option<Point> {
    let v = toward - center;
    if !(v.x.is_finite() && v.y.is_finite()) || (v.x.abs() <= EPS && v.y.abs() <= EPS) {
        return None;
    }
    let hw = (size.width / 2.0).max(EPS);
    let hh = (size.height / 2.0).max(EPS);
    let denom = v.x.abs() / hw + v.y.abs() / hh;
    if !(denom.is_finite() && denom > 0.0) {
        return None;
    }
    Some(center + v * (1.0 / denom))
}

/// Point on the inscribed circle (radius `min(w, h) / 2`) toward `toward`.
pub fn clip_to_circle(center: Point, size: Size, toward: Point) -> Option<Point> {
    let v = toward - center;
    let len = v.length();
    if !len.is_finite() || len <= EPS {
        return None;
    }
    let r = size.width.min(size.height) / 2.0;
    Some(center + v * (r / len))
}

fn clip_to_outline(anchor: &Anchor, toward: Point) -> Option<Point> {
    match anchor.outline {
        Outline::Diamond => clip_to_diamond(anchor.center, anchor.size, toward),
        Outline::Circle => clip_to_circle(anchor.center, anchor.size, toward),
        Outline::Rect => None,
    }
}

/// Inserts one bend between consecutive points that share neither coordinate.
pub fn snap_orthogonal(points: &[Point], bend: BendOrder) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(points.len() * 2);
    for &p in points {
        if let Some(&prev) = out.last() {
            let aligned = (prev.x - p.x).abs() <= EPS || (prev.y - p.y).abs() <= EPS;
            if !aligned {
                let corner = match bend {
                    BendOrder::VerticalFirst => point(prev.x, p.y),
                    BendOrder::HorizontalFirst => point(p.x, prev.y),
                };
                out.push(corner);
            }
        }
        push_dedup(&mut out, p);
    }
    out
}

fn push_dedup(out: &mut Vec<Point>, p: Point) {
    if let Some(last) = out.last() {
        if (last.x - p.x).abs() <= EPS && (last.y - p.y).abs() <= EPS {
            return;
        }
    }
    out.push(p);
}

fn strictly_inside(b: &Bounds, p: Point) -> bool {
    p.x > b.min.x + EPS && p.x < b.max.x - EPS && p.y > b.min.y + EPS && p.y < b.max.y - EPS
}

/// Moves `points[0]` onto the boundary of `b` where the polyline first leaves the box.
///
/// Only applies when the endpoint is strictly inside the box. Leading points that are also
/// inside are dropped, so an orthogonal polyline stays orthogonal.
pub fn clip_start_to_bounds(points: &mut Vec<Point>, b: &Bounds) {
    if points.is_empty() || !strictly_inside(b, points[0]) {
        return;
    }
    match points.iter().position(|p| !strictly_inside(b, *p)) {
        Some(k) => {
            let q = exit_point(b, points[k - 1], points[k]);
            points.drain(..k);
            let dup = (q.x - points[0].x).abs() <= EPS && (q.y - points[0].y).abs() <= EPS;
            if !dup || points.len() < 2 {
                points.insert(0, q);
            }
        }
        None => {
            let toward = points.last().copied().unwrap_or(points[0]);
            points[0] = nearest_side(b, points[0], toward);
        }
    }
}

/// Where the segment from `inside` toward `outside` crosses the boundary of `b`.
fn exit_point(b: &Bounds, inside: Point, outside: Point) -> Point {
    let d = outside - inside;
    let mut t: f64 = 1.0;
    if d.x > EPS {
        t = t.min((b.max.x - inside.x) / d.x);
    } else if d.x < -EPS {
        t = t.min((b.min.x - inside.x) / d.x);
    }
    if d.y > EPS {
        t = t.min((b.max.y - inside.y) / d.y);
    } else if d.y < -EPS {
        t = t.min((b.min.y - inside.y) / d.y);
    }
    inside + d * t.max(0.0)
}

pub fn clip_end_to_bounds(points: &mut Vec<Point>, b: &Bounds) {
    points.reverse();
    clip_start_to_bounds(points, b);
    points.reverse();
}

/// Side of `b` facing `toward`, falling back to the side closest to `p`.
fn nearest_side(b: &Bounds, p: Point, toward: Point) -> Point {
    let d = toward - p;
    if d.x.abs() > EPS || d.y.abs() > EPS {
        if d.x.abs() >= d.y.abs() {
            return point(if d.x > 0.0 { b.max.x } else { b.min.x }, p.y);
        }
        return point(p.x, if d.y > 0.0 { b.max.y } else { b.min.y });
    }
    let candidates = [
        (p.x - b.min.x, point(b.min.x, p.y)),
        (b.max.x - p.x, point(b.max.x, p.y)),
        (p.y - b.min.y, point(p.x, b.min.y)),
        (b.max.y - p.y, point(p.x, b.max.y)),
    ];
    candidates
        .into_iter()
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, q)| q)
        .unwrap_or(p)
}

/// Shape clipping, orthogonal snapping, then rectangular clipping of both endpoints.
pub fn finish_route(points: &[Point], from: &Anchor, to: &Anchor, bend: BendOrder) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    if pts.len() < 2 {
        pts = vec![from.center, to.center];
    }

    let n = pts.len();
    if let Some(p) = clip_to_outline(from, pts[1]) {
        pts[0] = p;
    }
    if let Some(p) = clip_to_outline(to, pts[n - 2]) {
        pts[n - 1] = p;
    }

    let mut pts = snap_orthogonal(&pts, bend);

    if from.outline == Outline::Rect {
        clip_start_to_bounds(&mut pts, &from.bounds());
    }
    if to.outline == Outline::Rect {
        clip_end_to_bounds(&mut pts, &to.bounds());
    }
    if pts.len() == 1 {
        pts.push(pts[0]);
    }
    pts
}

/// Five-point loop leaving the trailing side and re-entering on the adjacent side.
pub fn route_self_loop(anchor: &Anchor, direction: Direction, pad: f64) -> Vec<Point> {
    let b = anchor.bounds();
    let c = anchor.center;
    match direction {
        Direction::LR | Direction::RL => vec![
            point(b.max.x, c.y),
            point(b.max.x + pad, c.y),
            point(b.max.x + pad, b.min.y - pad),
            point(c.x, b.min.y - pad),
            point(c.x, b.min.y),
        ],
        Direction::TB | Direction::BT => vec![
            point(c.x, b.max.y),
            point(c.x, b.max.y + pad),
            point(b.max.x + pad, b.max.y + pad),
            point(b.max.x + pad, c.y),
            point(b.max.x, c.y),
        ],
    }
}
