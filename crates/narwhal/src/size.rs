//! Node box sizing from measured label text and shape.

use crate::geom::Size;
use crate::model::NodeShape;
use crate::text::{TextMeasurer, TextMetrics, TextStyle};

pub const MIN_NODE_WIDTH: f64 = 60.0;
pub const MIN_NODE_HEIGHT: f64 = 36.0;
pub const PSEUDO_STATE_SIZE: f64 = 28.0;

const PADDING_X: f64 = 15.0;
const PADDING_Y: f64 = 10.0;
const DIAMOND_SLACK: f64 = 8.0;
const DOUBLE_CIRCLE_GAP: f64 = 5.0;
const SUBROUTINE_FRAME: f64 = 8.0;

/// Measures `label` (falling back to `id` when blank) and sizes the node box for `shape`.
pub fn estimate_node_size(
    id: &str,
    label: &str,
    shape: NodeShape,
    style: &TextStyle,
    measurer: &dyn TextMeasurer,
) -> Size {
    if shape.is_pseudo_state() {
        return Size::new(PSEUDO_STATE_SIZE, PSEUDO_STATE_SIZE);
    }
    let text = if label.trim().is_empty() { id } else { label };
    let metrics = measurer.measure(text, style);
    shape_size(shape, metrics)
}

fn shape_size(shape: NodeShape, metrics: TextMetrics) -> Size {
    let w = metrics.width.max(0.0) + 2.0 * PADDING_X;
    let h = metrics.height.max(0.0) + 2.0 * PADDING_Y;

    let (width, height) = match shape {
        NodeShape::Rectangle | NodeShape::Rounded => (w, h),
        NodeShape::Stadium => (w + h / 2.0, h),
        NodeShape::Subroutine => (w + 2.0 * SUBROUTINE_FRAME, h),
        NodeShape::Asymmetric => (w + h / 4.0, h),
        NodeShape::Hexagon => (w + h / 2.0, h),
        NodeShape::Trapezoid
        | NodeShape::TrapezoidAlt
        | NodeShape::Parallelogram
        | NodeShape::ParallelogramAlt => (w + h, h),
        NodeShape::Cylinder => {
            let rx = w / 2.0;
            let ry = rx / (2.5 + w / 50.0);
            (w, h + 2.0 * ry)
        }
        NodeShape::Diamond => {
            let s = w + h + DIAMOND_SLACK;
            (s, s)
        }
        NodeShape::Circle => {
            let d = w.hypot(h);
            (d, d)
        }
        NodeShape::DoubleCircle => {
            let d = w.hypot(h) + 2.0 * DOUBLE_CIRCLE_GAP;
            (d, d)
        }
        NodeShape::StateStart | NodeShape::StateEnd => (PSEUDO_STATE_SIZE, PSEUDO_STATE_SIZE),
    };

    if shape.is_square() {
        let side = width.max(height).max(MIN_NODE_WIDTH).max(MIN_NODE_HEIGHT);
        return Size::new(side, side);
    }
    Size::new(width.max(MIN_NODE_WIDTH), height.max(MIN_NODE_HEIGHT))
}
