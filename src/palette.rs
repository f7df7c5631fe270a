use crate::annotation::{AnnotationStyle, ColorId};
use ratatui::style::Color;
use serde::Serialize;

/// Fill opacity applied to every mark color.
pub const FILL_ALPHA: f32 = 0.25;
/// Opacity of the hover ring drawn around the active mark.
pub const HOVER_ALPHA: f32 = 0.45;
pub const HOVER_RING_WIDTH: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xFF) as u8,
            g: ((hex >> 8) & 0xFF) as u8,
            b: (hex & 0xFF) as u8,
            a: 0xFF,
        }
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    /// Parses `#rrggbb` or `rrggbb`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let digits = value.trim().trim_start_matches('#');
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::rgb)
    }

    /// Source-over blend onto an opaque background, for surfaces without alpha.
    pub fn over(self, background: Rgba) -> Rgba {
        let alpha = f32::from(self.a) / 255.0;
        let mix = |fg: u8, bg: u8| {
            (f32::from(fg) * alpha + f32::from(bg) * (1.0 - alpha)).round() as u8
        };
        Rgba {
            r: mix(self.r, background.r),
            g: mix(self.g, background.g),
            b: mix(self.b, background.b),
            a: 0xFF,
        }
    }

    pub fn to_color(self) -> Color {
        Color::Rgb(self.r, self.g, self.b)
    }

    pub fn css(&self) -> String {
        if self.a == 0xFF {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!(
                "rgba({}, {}, {}, {:.2})",
                self.r,
                self.g,
                self.b,
                f32::from(self.a) / 255.0
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ColorDefinition {
    pub id: ColorId,
    pub label: &'static str,
    pub swatch: Rgba,
    pub fill: Rgba,
    pub stroke: Rgba,
}

impl ColorDefinition {
    const fn new(id: ColorId, label: &'static str, swatch: u32, stroke: u32) -> Self {
        let swatch = Rgba::rgb(swatch);
        Self {
            id,
            label,
            swatch,
            // 0x40 == 25% of 0xFF
            fill: Rgba { a: 0x40, ..swatch },
            stroke: Rgba::rgb(stroke),
        }
    }
}

static COLOR_DEFINITIONS: [ColorDefinition; 7] = [
    ColorDefinition::new(ColorId::Amber, "Amber", 0xFBBF24, 0xD97706),
    ColorDefinition::new(ColorId::Rose, "Rose", 0xFB7185, 0xE11D48),
    ColorDefinition::new(ColorId::Blue, "Blue", 0x60A5FA, 0x2563EB),
    ColorDefinition::new(ColorId::Emerald, "Emerald", 0x34D399, 0x059669),
    ColorDefinition::new(ColorId::Violet, "Violet", 0xA78BFA, 0x7C3AED),
    ColorDefinition::new(ColorId::Orange, "Orange", 0xFB923C, 0xEA580C),
    ColorDefinition::new(ColorId::Cyan, "Cyan", 0x22D3EE, 0x0891B2),
];

pub fn color_definitions() -> &'static [ColorDefinition] {
    &COLOR_DEFINITIONS
}

pub fn color_definition(id: ColorId) -> &'static ColorDefinition {
    match id {
        ColorId::Amber => &COLOR_DEFINITIONS[0],
        ColorId::Rose => &COLOR_DEFINITIONS[1],
        ColorId::Blue => &COLOR_DEFINITIONS[2],
        ColorId::Emerald => &COLOR_DEFINITIONS[3],
        ColorId::Violet => &COLOR_DEFINITIONS[4],
        ColorId::Orange => &COLOR_DEFINITIONS[5],
        ColorId::Cyan => &COLOR_DEFINITIONS[6],
    }
}

/// Looks a color up by its stored name; missing or unknown names resolve to amber.
pub fn resolve_color(name: Option<&str>) -> &'static ColorDefinition {
    color_definition(ColorId::from_name(name))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HoverShadow {
    pub width: f32,
    pub color: Rgba,
}

impl HoverShadow {
    pub fn css(&self) -> String {
        format!("0 0 0 {}px {}", self.width, self.color.css())
    }
}

pub fn hover_shadow(color: ColorId) -> HoverShadow {
    HoverShadow {
        width: HOVER_RING_WIDTH,
        color: color_definition(color).stroke.with_alpha(HOVER_ALPHA),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decoration {
    Underline,
    Border,
    Ellipse,
    Brackets,
    Background,
    MarginOnly,
}

/// Everything a host needs to paint one mark.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarkVisual {
    pub style: AnnotationStyle,
    pub color: ColorId,
    pub decoration: Decoration,
    pub fill: Option<Rgba>,
    pub stroke: Option<Rgba>,
    pub stroke_width: f32,
}

pub fn mark_visual(style: AnnotationStyle, color: ColorId) -> MarkVisual {
    let definition = color_definition(color);
    let (decoration, fill, stroke, stroke_width) = match style {
        AnnotationStyle::Underline => (Decoration::Underline, None, Some(definition.stroke), 2.0),
        AnnotationStyle::Box => (Decoration::Border, None, Some(definition.stroke), 1.5),
        AnnotationStyle::Circle => (Decoration::Ellipse, None, Some(definition.stroke), 1.5),
        AnnotationStyle::Bracket => (Decoration::Brackets, None, Some(definition.stroke), 2.0),
        AnnotationStyle::Highlight => (Decoration::Background, Some(definition.fill), None, 0.0),
        AnnotationStyle::Aside => (Decoration::MarginOnly, None, Some(definition.stroke), 1.0),
    };
    MarkVisual {
        style,
        color,
        decoration,
        fill,
        stroke,
        stroke_width,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_color_falls_back_to_amber() {
        let amber = color_definition(ColorId::Amber);
        assert_eq!(resolve_color(None), amber);
        assert_eq!(resolve_color(Some("unknown")), amber);
        assert_eq!(resolve_color(Some("")), amber);
        assert_eq!(resolve_color(Some("rose")).id, ColorId::Rose);
    }

    #[test]
    fn test_every_color_has_quarter_alpha_fill_and_solid_stroke() {
        for definition in color_definitions() {
            assert_eq!(definition.fill.a, 0x40, "{} fill alpha", definition.label);
            assert_eq!(definition.stroke.a, 0xFF, "{} stroke alpha", definition.label);
            assert_eq!(
                (definition.fill.r, definition.fill.g, definition.fill.b),
                (definition.swatch.r, definition.swatch.g, definition.swatch.b)
            );
        }
        assert_eq!(color_definitions().len(), ColorId::all().len());
    }

    #[test]
    fn test_lookup_table_matches_ids() {
        for id in ColorId::all() {
            assert_eq!(color_definition(*id).id, *id);
        }
    }

    #[test]
    fn test_hover_shadow_uses_stroke_at_reduced_alpha() {
        let shadow = hover_shadow(ColorId::Blue);
        let stroke = color_definition(ColorId::Blue).stroke;
        assert_eq!(shadow.width, HOVER_RING_WIDTH);
        assert_eq!(
            (shadow.color.r, shadow.color.g, shadow.color.b),
            (stroke.r, stroke.g, stroke.b)
        );
        assert_eq!(shadow.color.a, 115);
        assert_eq!(shadow.css(), "0 0 0 2px rgba(37, 99, 235, 0.45)");
    }

    #[test]
    fn test_any_style_pairs_with_any_color() {
        for style in AnnotationStyle::all() {
            for color in ColorId::all() {
                let visual = mark_visual(*style, *color);
                assert_eq!(visual.color, *color);
                assert!(visual.fill.is_some() || visual.stroke.is_some());
            }
        }
        let highlight = mark_visual(AnnotationStyle::Highlight, ColorId::Rose);
        assert_eq!(highlight.fill, Some(color_definition(ColorId::Rose).fill));
        assert_eq!(highlight.stroke, None);
    }

    #[test]
    fn test_blend_over_background() {
        let white = Rgba::rgb(0xFFFFFF);
        let black = Rgba::rgb(0x000000);
        assert_eq!(white.with_alpha(0.5).over(black), Rgba::rgb(0x808080));
        assert_eq!(white.over(black), white);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(Rgba::parse_hex("#1B2B34"), Some(Rgba::rgb(0x1B2B34)));
        assert_eq!(Rgba::parse_hex("1b2b34"), Some(Rgba::rgb(0x1B2B34)));
        assert_eq!(Rgba::parse_hex("#12"), None);
        assert_eq!(Rgba::parse_hex("zzzzzz"), None);
    }
}
