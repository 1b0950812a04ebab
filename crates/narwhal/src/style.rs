use crate::model::{Style, StyleMaps};
use crate::text::TextStyle;
use std::borrow::Cow;

const DEFAULT_CLASS: &str = "default";

/// Merges `default` class, assigned classes (in order) and inline overrides; later entries win.
pub fn resolve_node_style(maps: &StyleMaps, node_id: &str) -> Style {
    let mut out = Style::new();
    let mut apply = |decls: &Style| {
        for (k, v) in decls {
            out.insert(k.trim().to_string(), v.trim().trim_end_matches(';').trim().to_string());
        }
    };

    if let Some(decls) = maps.class_defs.get(DEFAULT_CLASS) {
        apply(decls);
    }
    if let Some(classes) = maps.classes.get(node_id) {
        for class in classes {
            if class == DEFAULT_CLASS {
                continue;
            }
            if let Some(decls) = maps.class_defs.get(class) {
                apply(decls);
            }
        }
    }
    if let Some(decls) = maps.inline_styles.get(node_id) {
        apply(decls);
    }
    out
}

fn parse_css_px_f64(v: &str) -> Option<f64> {
    let v = v.trim().trim_end_matches(';').trim();
    let v = v.trim_end_matches("px").trim();
    if v.is_empty() {
        return None;
    }
    v.parse::<f64>().ok().filter(|n| n.is_finite() && *n > 0.0)
}

/// Text style for a node: `base` overridden by `font-size`, `font-weight` and `font-family`.
pub fn effective_text_style<'a>(base: &'a TextStyle, style: &Style) -> Cow<'a, TextStyle> {
    let mut out = Cow::Borrowed(base);
    for (k, v) in style {
        match k.as_str() {
            "font-size" => {
                if let Some(px) = parse_css_px_f64(v) {
                    out.to_mut().font_size = px;
                }
            }
            "font-family" => {
                out.to_mut().font_family = Some(v.trim().to_string());
            }
            "font-weight" => {
                out.to_mut().font_weight = Some(v.trim().to_string());
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style(pairs: &[(&str, &str)]) -> Style {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn later_sources_win() {
        let mut maps = StyleMaps::default();
        maps.class_defs
            .insert("default".into(), style(&[("fill", "#fff"), ("stroke", "#000")]));
        maps.class_defs
            .insert("hot".into(), style(&[("fill", "red"), ("font-size", "20px")]));
        maps.classes.insert("A".into(), vec!["hot".into()]);
        maps.inline_styles
            .insert("A".into(), style(&[("stroke", "blue;")]));

        let a = resolve_node_style(&maps, "A");
        assert_eq!(a["fill"], "red");
        assert_eq!(a["stroke"], "blue");
        assert_eq!(a["font-size"], "20px");

        let b = resolve_node_style(&maps, "B");
        assert_eq!(b["fill"], "#fff");
        assert!(!b.contains_key("font-size"));
    }

    #[test]
    fn text_style_follows_font_properties() {
        let base = TextStyle::default();
        let unchanged = effective_text_style(&base, &style(&[("fill", "red")]));
        assert!(matches!(unchanged, Cow::Borrowed(_)));

        let s = effective_text_style(
            &base,
            &style(&[("font-size", "24px"), ("font-weight", "bold"), ("font-family", "serif")]),
        );
        assert_eq!(s.font_size, 24.0);
        assert!(s.is_bold());
        assert_eq!(s.font_family.as_deref(), Some("serif"));

        let bad = effective_text_style(&base, &style(&[("font-size", "large")]));
        assert_eq!(bad.font_size, 16.0);
    }
}
