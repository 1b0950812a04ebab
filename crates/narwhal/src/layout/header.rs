use super::group_bounds;
use crate::config::RenderOptions;
use crate::geom::hull;
use crate::model::PositionedGroup;

/// Grows groups bottom-up so each contains its children and, when labeled, a header band on top.
///
/// Groups never shrink. A labeled group is also widened symmetrically until its title fits.
pub(crate) fn reserve_header_space(
    groups: &mut [PositionedGroup],
    render: &RenderOptions,
    label_width: &dyn Fn(&str) -> f64,
) {
    for g in groups {
        expand(g, render, label_width);
    }
}

fn expand(g: &mut PositionedGroup, render: &RenderOptions, label_width: &dyn Fn(&str) -> f64) {
    for c in &mut g.children {
        expand(c, render, label_width);
    }

    if !g.children.is_empty() {
        let mut b = group_bounds(g);
        for c in &g.children {
            b = hull(&b, &group_bounds(c));
        }
        g.x = b.min.x;
        g.y = b.min.y;
        g.width = b.width();
        g.height = b.height();
    }

    if g.label.trim().is_empty() {
        return;
    }
    let pad = render.group_content_padding;
    let band = render.group_header_height + pad;
    g.y -= band;
    g.height += band;

    let min_width = label_width(&g.label) + 2.0 * pad;
    if g.width < min_width {
        g.x -= (min_width - g.width) / 2.0;
        g.width = min_width;
    }
}
