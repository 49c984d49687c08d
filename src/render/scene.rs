//! Display lists for the drawing surface.
//!
//! A [`Scene`] is an ordered list of layers, bottom to top, in image pixel
//! space. Hosts replay it onto whatever canvas they have.

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{polygon_centroid, ImageSize, Point},
    models::{OccupancySnapshot, PersistedZone, ZoneDraft},
};

use super::palette::{Palette, Rgba};

const ZONE_STROKE_WIDTH: f64 = 2.0;
const DRAFT_STROKE_WIDTH: f64 = 2.0;
const VERTEX_RADIUS: f64 = 4.0;
const LABEL_OFFSET: (f64, f64) = (5.0, -5.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Layer {
    Image {
        width: u32,
        height: u32,
    },
    Polygon {
        points: Vec<Point>,
        fill: Rgba,
        stroke: Rgba,
        stroke_width: f64,
    },
    Polyline {
        points: Vec<Point>,
        stroke: Rgba,
        stroke_width: f64,
    },
    Vertex {
        at: Point,
        radius: f64,
        color: Rgba,
    },
    Label {
        text: String,
        at: Point,
        color: Rgba,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub layers: Vec<Layer>,
}

impl Scene {
    fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn polygons(&self) -> impl Iterator<Item = &Layer> {
        self.layers
            .iter()
            .filter(|layer| matches!(layer, Layer::Polygon { .. }))
    }
}

fn label_anchor(first: Point, image: Option<ImageSize>) -> Point {
    let anchor = first.offset(LABEL_OFFSET.0, LABEL_OFFSET.1);
    match image {
        Some(size) => size.clamp(anchor),
        None => anchor,
    }
}

/// Editor surface: image, completed zones with their space number near the
/// first vertex, then the open draft polyline with vertex markers.
pub fn editor_scene(
    image: Option<ImageSize>,
    completed: &[ZoneDraft],
    draft: &[Point],
    palette: &Palette,
) -> Scene {
    let mut scene = Scene::default();

    if let Some(size) = image {
        scene.push(Layer::Image {
            width: size.width,
            height: size.height,
        });
    }

    for zone in completed {
        let Some(first) = zone.coordinates.first().copied() else {
            continue;
        };
        let fill = if zone.is_complete {
            palette.zone_fill
        } else {
            palette.pending_fill
        };
        scene.push(Layer::Polygon {
            points: zone.coordinates.clone(),
            fill,
            stroke: palette.zone_border,
            stroke_width: ZONE_STROKE_WIDTH,
        });
        scene.push(Layer::Label {
            text: zone.space_number.to_string(),
            at: label_anchor(first, image),
            color: palette.label_text,
        });
    }

    if !draft.is_empty() {
        scene.push(Layer::Polyline {
            points: draft.to_vec(),
            stroke: palette.draft_line,
            stroke_width: DRAFT_STROKE_WIDTH,
        });
        for point in draft {
            scene.push(Layer::Vertex {
                at: *point,
                radius: VERTEX_RADIUS,
                color: palette.draft_vertex,
            });
        }
    }

    scene
}

/// Live surface: persisted zones filled by their current occupancy. Zones the
/// snapshot does not mention are drawn in the neutral color.
pub fn occupancy_scene(
    image: Option<ImageSize>,
    zones: &[PersistedZone],
    snapshot: Option<&OccupancySnapshot>,
    palette: &Palette,
) -> Scene {
    let mut scene = Scene::default();

    if let Some(size) = image {
        scene.push(Layer::Image {
            width: size.width,
            height: size.height,
        });
    }

    for zone in zones {
        if zone.coordinates.len() < 3 {
            continue;
        }
        let state = snapshot.and_then(|snap| {
            snap.spaces
                .iter()
                .find(|space| {
                    (!space.id.is_empty() && space.id == zone.id)
                        || space.space_number == zone.space_number
                })
                .map(|space| space.is_occupied)
        });
        let color = match state {
            Some(true) => palette.occupied,
            Some(false) => palette.free,
            None => palette.unknown,
        };
        scene.push(Layer::Polygon {
            points: zone.coordinates.clone(),
            fill: color.with_alpha(palette.zone_fill.a),
            stroke: color,
            stroke_width: ZONE_STROKE_WIDTH,
        });
        if let Some(center) = polygon_centroid(&zone.coordinates) {
            scene.push(Layer::Label {
                text: zone.space_number.to_string(),
                at: center,
                color: palette.label_text,
            });
        }
    }

    scene
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SpaceStatus;
    use crate::theme::Theme;

    fn triangle(offset: f64) -> Vec<Point> {
        vec![
            Point::new(offset, offset),
            Point::new(offset + 10.0, offset),
            Point::new(offset, offset + 10.0),
        ]
    }

    fn draft(n: u32, offset: f64) -> ZoneDraft {
        ZoneDraft {
            space_number: n,
            name: ZoneDraft::default_name(n),
            coordinates: triangle(offset),
            is_complete: true,
        }
    }

    #[test]
    fn editor_layers_are_ordered_bottom_to_top() {
        let palette = Palette::for_theme(Theme::Light);
        let scene = editor_scene(
            Some(ImageSize::new(100, 100)),
            &[draft(1, 0.0), draft(2, 50.0)],
            &[Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
            &palette,
        );

        let kinds: Vec<&str> = scene
            .layers
            .iter()
            .map(|layer| match layer {
                Layer::Image { .. } => "image",
                Layer::Polygon { .. } => "polygon",
                Layer::Polyline { .. } => "polyline",
                Layer::Vertex { .. } => "vertex",
                Layer::Label { .. } => "label",
            })
            .collect();
        assert_eq!(
            kinds,
            vec!["image", "polygon", "label", "polygon", "label", "polyline", "vertex", "vertex"]
        );
        assert_eq!(scene.polygons().count(), 2);
    }

    #[test]
    fn labels_sit_near_first_vertex_inside_the_image() {
        let palette = Palette::for_theme(Theme::Dark);
        let scene = editor_scene(Some(ImageSize::new(100, 100)), &[draft(7, 0.0)], &[], &palette);
        let label = scene
            .layers
            .iter()
            .find_map(|layer| match layer {
                Layer::Label { text, at, .. } => Some((text.clone(), *at)),
                _ => None,
            })
            .unwrap();
        assert_eq!(label.0, "7");
        assert_eq!(label.1, Point::new(5.0, 0.0));
    }

    #[test]
    fn draft_is_open_polyline_in_draft_color() {
        let palette = Palette::for_theme(Theme::Light);
        let scene = editor_scene(None, &[], &triangle(0.0), &palette);
        assert_eq!(scene.polygons().count(), 0);
        match &scene.layers[0] {
            Layer::Polyline { points, stroke, .. } => {
                assert_eq!(points.len(), 3);
                assert_eq!(*stroke, palette.draft_line);
            }
            other => panic!("expected polyline, got {other:?}"),
        }
    }

    #[test]
    fn occupancy_scene_colors_by_state() {
        let palette = Palette::for_theme(Theme::Light);
        let zones = vec![
            PersistedZone {
                id: "a".into(),
                space_number: 1,
                name: "Space 1".into(),
                coordinates: triangle(0.0),
                is_occupied: false,
            },
            PersistedZone {
                id: "b".into(),
                space_number: 2,
                name: "Space 2".into(),
                coordinates: triangle(20.0),
                is_occupied: false,
            },
            PersistedZone {
                id: "c".into(),
                space_number: 3,
                name: "Space 3".into(),
                coordinates: triangle(40.0),
                is_occupied: false,
            },
        ];
        let snapshot = OccupancySnapshot {
            spaces: vec![
                SpaceStatus { id: "a".into(), space_number: 1, is_occupied: true },
                SpaceStatus { id: String::new(), space_number: 2, is_occupied: false },
            ],
            ..Default::default()
        };

        let scene = occupancy_scene(None, &zones, Some(&snapshot), &palette);
        let strokes: Vec<Rgba> = scene
            .polygons()
            .map(|layer| match layer {
                Layer::Polygon { stroke, .. } => *stroke,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(strokes, vec![palette.occupied, palette.free, palette.unknown]);
    }
}
