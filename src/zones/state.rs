use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{polygon_area, polygon_contains, BoundingBox, ImageSize, Point},
    models::{PersistedZone, ZoneDraft, ZoneSubmission},
    render::{editor_scene, Palette, Scene},
    settings::StartZonePolicy,
};

use super::error::EditorError;

const ENABLE_LOGS: bool = true;

use crate::log_warn;

pub const MIN_ZONE_POINTS: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum EditorMode {
    #[default]
    Idle,
    Drawing,
}

/// Zone editor state machine. Pure and synchronous; the controller wraps it
/// with image loading, persistence and event emission.
#[derive(Debug, Clone)]
pub struct EditorState {
    image: Option<ImageSize>,
    completed: Vec<ZoneDraft>,
    /// `Some` while drawing. Disjoint from `completed` by construction.
    draft: Option<Vec<Point>>,
    next_space_number: u32,
    policy: StartZonePolicy,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ZoneSummary {
    pub space_number: u32,
    pub name: String,
    pub points: usize,
    pub area_px: f64,
}

/// Everything a host needs to redraw the editor after a change.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub mode: EditorMode,
    pub image: Option<ImageSize>,
    pub zones: Vec<ZoneSummary>,
    pub draft_points: Vec<Point>,
    pub next_space_number: u32,
    pub can_start: bool,
    pub can_complete: bool,
    pub can_save: bool,
    pub scene: Scene,
}

impl Default for EditorState {
    fn default() -> Self {
        Self::new(StartZonePolicy::default())
    }
}

impl EditorState {
    pub fn new(policy: StartZonePolicy) -> Self {
        Self {
            image: None,
            completed: Vec::new(),
            draft: None,
            next_space_number: 1,
            policy,
        }
    }

    pub fn image(&self) -> Option<ImageSize> {
        self.image
    }

    pub fn completed(&self) -> &[ZoneDraft] {
        &self.completed
    }

    pub fn draft_points(&self) -> &[Point] {
        self.draft.as_deref().unwrap_or(&[])
    }

    pub fn mode(&self) -> EditorMode {
        if self.draft.is_some() {
            EditorMode::Drawing
        } else {
            EditorMode::Idle
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.draft.is_some()
    }

    pub fn next_space_number(&self) -> u32 {
        self.next_space_number
    }

    pub fn set_policy(&mut self, policy: StartZonePolicy) {
        self.policy = policy;
    }

    /// Reset onto a freshly loaded image, seeding the completed list from
    /// zones the camera already has. Stored zones that could never have been
    /// completed here (fewer than three points, space number 0, or a repeated
    /// space number) are left out. Their numbers are still not reused.
    pub fn load(&mut self, image: ImageSize, existing: &[PersistedZone]) {
        let mut seen = HashSet::new();
        let mut completed = Vec::with_capacity(existing.len());
        for zone in existing {
            if zone.space_number == 0
                || zone.coordinates.len() < MIN_ZONE_POINTS
                || !seen.insert(zone.space_number)
            {
                log_warn!(
                    "skipping stored zone {} (space {}, {} points)",
                    zone.id,
                    zone.space_number,
                    zone.coordinates.len()
                );
                continue;
            }
            completed.push(ZoneDraft::from(zone));
        }

        self.image = Some(image);
        self.completed = completed;
        self.draft = None;
        self.next_space_number = existing
            .iter()
            .map(|zone| zone.space_number)
            .max()
            .map_or(1, |max| max.saturating_add(1));
    }

    /// Drop the image after a failed reload. Completed zones stay; drawing
    /// is unavailable until an image loads again.
    pub fn unload(&mut self) {
        self.image = None;
        self.draft = None;
    }

    pub fn start_zone(&mut self) -> Result<(), EditorError> {
        if self.image.is_none() {
            return Err(EditorError::ImageNotLoaded);
        }

        if let Some(points) = self.draft.as_mut() {
            return match self.policy {
                StartZonePolicy::Reject => Err(EditorError::AlreadyDrawing),
                StartZonePolicy::Reset => {
                    points.clear();
                    Ok(())
                }
            };
        }

        self.draft = Some(Vec::new());
        Ok(())
    }

    /// Append a pixel-space point to the draft. Returns `false` (and does
    /// nothing) when not drawing.
    pub fn add_point(&mut self, point: Point) -> bool {
        let image = self.image;
        match self.draft.as_mut() {
            Some(points) => {
                let point = match image {
                    Some(size) => size.clamp(point),
                    None => point,
                };
                points.push(point);
                true
            }
            None => false,
        }
    }

    pub fn undo_last_point(&mut self) -> Option<Point> {
        self.draft.as_mut().and_then(|points| points.pop())
    }

    pub fn complete_zone(&mut self) -> Result<ZoneDraft, EditorError> {
        let points = match self.draft.as_ref() {
            Some(points) => points,
            None => return Err(EditorError::NotDrawing),
        };
        if points.len() < MIN_ZONE_POINTS {
            return Err(EditorError::InsufficientPoints {
                points: points.len(),
            });
        }

        let space_number = self.next_space_number;
        let zone = ZoneDraft {
            space_number,
            name: ZoneDraft::default_name(space_number),
            coordinates: self.draft.take().unwrap_or_default(),
            is_complete: true,
        };
        self.completed.push(zone.clone());
        self.next_space_number = space_number.saturating_add(1);
        Ok(zone)
    }

    /// Abandon the draft without completing it.
    pub fn discard_zone(&mut self) -> bool {
        self.draft.take().is_some()
    }

    pub fn delete_zone(&mut self, index: usize) -> Result<ZoneDraft, EditorError> {
        if index >= self.completed.len() {
            return Err(EditorError::NoSuchZone {
                index,
                len: self.completed.len(),
            });
        }
        Ok(self.completed.remove(index))
    }

    pub fn clear_all(&mut self, confirmed: bool) -> Result<(), EditorError> {
        if !confirmed {
            return Err(EditorError::ConfirmationRequired);
        }
        self.completed.clear();
        self.draft = None;
        self.next_space_number = 1;
        Ok(())
    }

    /// Validate and strip completed zones down to what persistence accepts.
    pub fn save_payload(&self) -> Result<Vec<ZoneSubmission>, EditorError> {
        if self.is_drawing() {
            return Err(EditorError::DrawingInProgress);
        }
        let payload: Vec<ZoneSubmission> = self
            .completed
            .iter()
            .filter(|zone| zone.is_complete && zone.coordinates.len() >= MIN_ZONE_POINTS)
            .map(ZoneDraft::to_submission)
            .collect();
        if payload.is_empty() {
            return Err(EditorError::NothingToSave);
        }
        Ok(payload)
    }

    /// Index of the topmost completed zone containing `point`.
    pub fn zone_at(&self, point: &Point) -> Option<usize> {
        self.completed
            .iter()
            .enumerate()
            .rev()
            .find(|(_, zone)| {
                let in_bounds = BoundingBox::of(&zone.coordinates).is_some_and(|bbox| {
                    point.x >= bbox.x
                        && point.x <= bbox.x + bbox.width
                        && point.y >= bbox.y
                        && point.y <= bbox.y + bbox.height
                });
                in_bounds && polygon_contains(&zone.coordinates, point)
            })
            .map(|(index, _)| index)
    }

    pub fn view(&self, palette: &Palette) -> EditorView {
        EditorView {
            mode: self.mode(),
            image: self.image,
            zones: self
                .completed
                .iter()
                .map(|zone| ZoneSummary {
                    space_number: zone.space_number,
                    name: zone.name.clone(),
                    points: zone.coordinates.len(),
                    area_px: polygon_area(&zone.coordinates),
                })
                .collect(),
            draft_points: self.draft_points().to_vec(),
            next_space_number: self.next_space_number,
            can_start: self.image.is_some()
                && (!self.is_drawing() || self.policy == StartZonePolicy::Reset),
            can_complete: self.draft_points().len() >= MIN_ZONE_POINTS,
            can_save: !self.is_drawing() && !self.completed.is_empty(),
            scene: editor_scene(self.image, &self.completed, self.draft_points(), palette),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> EditorState {
        let mut state = EditorState::default();
        state.load(ImageSize::new(1000, 800), &[]);
        state
    }

    fn draw(state: &mut EditorState, points: &[(f64, f64)]) -> Result<ZoneDraft, EditorError> {
        state.start_zone()?;
        for (x, y) in points {
            assert!(state.add_point(Point::new(*x, *y)));
        }
        state.complete_zone()
    }

    const TRIANGLE: [(f64, f64); 3] = [(10.0, 10.0), (50.0, 10.0), (30.0, 40.0)];

    #[test]
    fn square_zone_gets_space_one() {
        let mut state = loaded();
        let zone = draw(
            &mut state,
            &[(100.0, 100.0), (200.0, 100.0), (200.0, 200.0), (100.0, 200.0)],
        )
        .unwrap();

        assert_eq!(zone.space_number, 1);
        assert_eq!(zone.name, "Space 1");
        assert_eq!(zone.coordinates.len(), 4);
        assert!(zone.is_complete);
        assert_eq!(state.completed().len(), 1);
        assert!(state.draft_points().is_empty());
        assert_eq!(state.mode(), EditorMode::Idle);
    }

    #[test]
    fn existing_zones_continue_numbering() {
        let mut state = EditorState::default();
        let existing = PersistedZone {
            id: "z-5".into(),
            space_number: 5,
            name: "Space 5".into(),
            coordinates: vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0), Point::new(0.0, 5.0)],
            is_occupied: true,
        };
        state.load(ImageSize::new(640, 480), &[existing]);
        assert_eq!(state.completed().len(), 1);
        assert!(state.completed()[0].is_complete);

        let zone = draw(&mut state, &TRIANGLE).unwrap();
        assert_eq!(zone.space_number, 6);
    }

    #[test]
    fn degenerate_stored_zones_are_not_loaded() {
        let stored = |id: &str, space_number: u32, points: usize| PersistedZone {
            id: id.into(),
            space_number,
            name: format!("Space {space_number}"),
            coordinates: (0..points)
                .map(|i| Point::new(i as f64 * 10.0, (i % 2) as f64 * 10.0))
                .collect(),
            is_occupied: false,
        };
        let mut state = EditorState::default();
        state.load(
            ImageSize::new(640, 480),
            &[
                stored("two-points", 1, 2),
                stored("zero", 0, 3),
                stored("first-3", 3, 3),
                stored("dup-3", 3, 4),
            ],
        );

        assert_eq!(state.completed().len(), 1);
        assert_eq!(state.completed()[0].coordinates.len(), 3);
        assert_eq!(state.next_space_number(), 4);

        let mut only_bad = EditorState::default();
        only_bad.load(ImageSize::new(640, 480), &[stored("two-points", 1, 2)]);
        assert!(only_bad.completed().is_empty());
        assert_eq!(only_bad.save_payload(), Err(EditorError::NothingToSave));
    }

    #[test]
    fn two_points_cannot_complete() {
        let mut state = loaded();
        state.start_zone().unwrap();
        state.add_point(Point::new(1.0, 1.0));
        state.add_point(Point::new(2.0, 2.0));

        assert_eq!(
            state.complete_zone(),
            Err(EditorError::InsufficientPoints { points: 2 })
        );
        assert!(state.completed().is_empty());
        assert_eq!(state.draft_points().len(), 2);
        assert!(state.is_drawing());

        state.add_point(Point::new(3.0, 1.0));
        assert!(state.complete_zone().is_ok());
    }

    #[test]
    fn undo_removes_only_the_last_point() {
        let mut state = loaded();
        state.start_zone().unwrap();
        for i in 0..4 {
            state.add_point(Point::new(f64::from(i), 0.0));
        }
        assert_eq!(state.undo_last_point(), Some(Point::new(3.0, 0.0)));
        assert_eq!(state.draft_points().len(), 3);
        assert_eq!(state.draft_points()[2], Point::new(2.0, 0.0));

        for _ in 0..3 {
            assert!(state.undo_last_point().is_some());
        }
        assert_eq!(state.undo_last_point(), None);
        assert_eq!(state.undo_last_point(), None);
        assert!(state.is_drawing());
    }

    #[test]
    fn points_are_ignored_unless_drawing() {
        let mut state = loaded();
        assert!(!state.add_point(Point::new(1.0, 1.0)));
        assert_eq!(state.undo_last_point(), None);
        assert_eq!(state.complete_zone(), Err(EditorError::NotDrawing));
    }

    #[test]
    fn drawing_requires_a_loaded_image() {
        let mut state = EditorState::default();
        assert_eq!(state.start_zone(), Err(EditorError::ImageNotLoaded));
        assert_eq!(state.mode(), EditorMode::Idle);
    }

    #[test]
    fn start_while_drawing_follows_policy() {
        let mut rejecting = loaded();
        rejecting.start_zone().unwrap();
        rejecting.add_point(Point::new(1.0, 1.0));
        assert_eq!(rejecting.start_zone(), Err(EditorError::AlreadyDrawing));
        assert_eq!(rejecting.draft_points().len(), 1);

        let mut resetting = loaded();
        resetting.set_policy(StartZonePolicy::Reset);
        resetting.start_zone().unwrap();
        resetting.add_point(Point::new(1.0, 1.0));
        assert_eq!(resetting.start_zone(), Ok(()));
        assert!(resetting.draft_points().is_empty());
        assert!(resetting.is_drawing());
    }

    #[test]
    fn space_numbers_strictly_increase_and_are_not_recycled() {
        let mut state = loaded();
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(draw(&mut state, &TRIANGLE).unwrap().space_number);
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);

        let removed = state.delete_zone(3).unwrap();
        assert_eq!(removed.space_number, 4);
        state.delete_zone(0).unwrap();
        let remaining: Vec<u32> = state.completed().iter().map(|z| z.space_number).collect();
        assert_eq!(remaining, vec![2, 3]);

        assert_eq!(draw(&mut state, &TRIANGLE).unwrap().space_number, 5);
        assert_eq!(
            state.delete_zone(9),
            Err(EditorError::NoSuchZone { index: 9, len: 3 })
        );
    }

    #[test]
    fn clear_all_needs_confirmation_and_resets_numbering() {
        let mut state = loaded();
        draw(&mut state, &TRIANGLE).unwrap();
        draw(&mut state, &TRIANGLE).unwrap();
        state.start_zone().unwrap();
        state.add_point(Point::new(5.0, 5.0));

        assert_eq!(state.clear_all(false), Err(EditorError::ConfirmationRequired));
        assert_eq!(state.completed().len(), 2);
        assert!(state.is_drawing());

        state.clear_all(true).unwrap();
        assert!(state.completed().is_empty());
        assert!(!state.is_drawing());
        assert_eq!(state.next_space_number(), 1);

        let zone = draw(&mut state, &TRIANGLE).unwrap();
        assert_eq!(zone.space_number, 1);
        assert_eq!(state.completed().len(), 1);
    }

    #[test]
    fn save_payload_validation() {
        let mut state = loaded();
        assert_eq!(state.save_payload(), Err(EditorError::NothingToSave));

        draw(&mut state, &TRIANGLE).unwrap();
        state.start_zone().unwrap();
        assert_eq!(state.save_payload(), Err(EditorError::DrawingInProgress));

        assert!(state.discard_zone());
        let payload = state.save_payload().unwrap();
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].space_number, 1);
        assert_eq!(payload[0].name, "Space 1");
        assert_eq!(payload[0].coordinates.len(), 3);
        // Saving does not change the editor.
        assert_eq!(state.completed().len(), 1);
    }

    #[test]
    fn points_are_clamped_to_the_image() {
        let mut state = loaded();
        state.start_zone().unwrap();
        state.add_point(Point::new(1200.0, -3.0));
        assert_eq!(state.draft_points()[0], Point::new(1000.0, 0.0));
    }

    #[test]
    fn hit_test_prefers_topmost_zone() {
        let mut state = loaded();
        draw(&mut state, &[(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)]).unwrap();
        draw(&mut state, &[(50.0, 50.0), (150.0, 50.0), (150.0, 150.0), (50.0, 150.0)]).unwrap();

        assert_eq!(state.zone_at(&Point::new(75.0, 75.0)), Some(1));
        assert_eq!(state.zone_at(&Point::new(25.0, 25.0)), Some(0));
        assert_eq!(state.zone_at(&Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn view_reports_affordances() {
        let mut state = loaded();
        let palette = Palette::for_theme(crate::theme::Theme::Light);
        let idle = state.view(&palette);
        assert!(idle.can_start);
        assert!(!idle.can_save);

        state.start_zone().unwrap();
        for (x, y) in TRIANGLE {
            state.add_point(Point::new(x, y));
        }
        let drawing = state.view(&palette);
        assert_eq!(drawing.mode, EditorMode::Drawing);
        assert!(!drawing.can_start);
        assert!(drawing.can_complete);
        assert!(!drawing.can_save);

        state.complete_zone().unwrap();
        let done = state.view(&palette);
        assert!(done.can_save);
        assert_eq!(done.zones[0].points, 3);
        assert!(done.zones[0].area_px > 0.0);
    }
}
