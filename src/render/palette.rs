use serde::{Deserialize, Serialize};

use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_css(&self) -> String {
        format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
    }
}

/// Colors for every overlay element, derived once from the current theme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Palette {
    pub zone_fill: Rgba,
    pub zone_border: Rgba,
    pub pending_fill: Rgba,
    pub draft_line: Rgba,
    pub draft_vertex: Rgba,
    pub label_text: Rgba,
    pub occupied: Rgba,
    pub free: Rgba,
    pub unknown: Rgba,
}

const GREEN: Rgba = Rgba::opaque(34, 197, 94);
const AMBER: Rgba = Rgba::opaque(245, 158, 11);
const RED: Rgba = Rgba::opaque(239, 68, 68);
const BLUE: Rgba = Rgba::opaque(59, 130, 246);
const SLATE: Rgba = Rgba::opaque(148, 163, 184);

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        let (fill_alpha, label_text) = match theme {
            Theme::Light => (0.3, Rgba::opaque(17, 24, 39)),
            Theme::Dark => (0.4, Rgba::opaque(243, 244, 246)),
        };

        Self {
            zone_fill: GREEN.with_alpha(fill_alpha),
            zone_border: GREEN,
            pending_fill: AMBER.with_alpha(fill_alpha),
            draft_line: match theme {
                Theme::Light => RED,
                Theme::Dark => Rgba::opaque(248, 113, 113),
            },
            draft_vertex: BLUE,
            label_text,
            occupied: RED,
            free: GREEN,
            unknown: SLATE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_rendering() {
        assert_eq!(Rgba::new(1, 2, 3, 0.5).to_css(), "rgba(1, 2, 3, 0.5)");
        assert_eq!(GREEN.with_alpha(0.3).a, 0.3);
    }

    #[test]
    fn draft_color_is_distinct_from_completed_zones() {
        for theme in [Theme::Light, Theme::Dark] {
            let palette = Palette::for_theme(theme);
            assert_ne!(palette.draft_line, palette.zone_border);
            assert_ne!(palette.occupied, palette.free);
            assert!(palette.zone_fill.a < 1.0);
        }
        assert_ne!(
            Palette::for_theme(Theme::Light).label_text,
            Palette::for_theme(Theme::Dark).label_text
        );
    }
}
