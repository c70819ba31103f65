//! Circular slice surface input.
//!
//! [`geometry`] turns a pointer position into a [`HitRegion`]; [`session`]
//! tracks one press and decides which [`GestureCommand`] to emit.
//! [`CircularSurface`] glues the two together and forwards every command to a
//! [`SurfaceActions`] implementation, normally the bridge.

pub mod geometry;
pub mod session;

pub use geometry::{hit_test, HitRegion, Point, SurfaceGeometry, WEDGE_DEGREES};
pub use session::{GestureCommand, GestureSession, GestureState};

use crate::{config::SurfaceConfig, protocol::NoteEvent};

/// The only things the surface can ask of the host.
pub trait SurfaceActions {
    fn trigger_slice(&self, index: u8);
    fn soft_reset(&self);
    fn sync_playheads(&self);

    fn dispatch(&self, command: GestureCommand) {
        match command {
            GestureCommand::TriggerSlice(index) => self.trigger_slice(index),
            GestureCommand::SoftReset => self.soft_reset(),
            GestureCommand::SyncPlayheads => self.sync_playheads(),
        }
    }
}

/// Surface geometry plus the live gesture session.
#[derive(Debug, Clone)]
pub struct CircularSurface {
    geometry: SurfaceGeometry,
    session: GestureSession,
    last_original_playhead: Option<u8>,
}

impl CircularSurface {
    pub fn new(geometry: SurfaceGeometry, swipe_threshold: f64) -> Self {
        Self {
            geometry,
            session: GestureSession::new(swipe_threshold),
            last_original_playhead: None,
        }
    }

    pub fn from_config(config: &SurfaceConfig) -> Self {
        Self::new(SurfaceGeometry::from_config(config), config.swipe_threshold)
    }

    pub fn geometry(&self) -> &SurfaceGeometry {
        &self.geometry
    }

    pub fn session(&self) -> &GestureSession {
        &self.session
    }

    pub fn pointer_down(&mut self, point: Point, actions: &dyn SurfaceActions) -> Option<GestureCommand> {
        let hit = self.geometry.hit_test(point);
        let command = self.session.pointer_down(point, hit);
        Self::emit(command, actions)
    }

    pub fn pointer_move(&mut self, point: Point, actions: &dyn SurfaceActions) -> Option<GestureCommand> {
        let hit = self.geometry.hit_test(point);
        let command = self.session.pointer_move(point, hit);
        Self::emit(command, actions)
    }

    pub fn pointer_up(&mut self, point: Point, actions: &dyn SurfaceActions) -> Option<GestureCommand> {
        let command = self.session.pointer_up(point);
        Self::emit(command, actions)
    }

    pub fn pointer_leave(&mut self, actions: &dyn SurfaceActions) -> Option<GestureCommand> {
        let command = self.session.pointer_leave();
        Self::emit(command, actions)
    }

    /// Feeds a host `note` event. Only a change of the original playhead
    /// counts as the playhead advancing.
    pub fn on_note(&mut self, note: &NoteEvent, actions: &dyn SurfaceActions) -> Option<GestureCommand> {
        let original = note.original?;
        if self.last_original_playhead == Some(original) {
            return None;
        }
        self.last_original_playhead = Some(original);
        Self::emit(self.session.playhead_advanced(), actions)
    }

    fn emit(command: Option<GestureCommand>, actions: &dyn SurfaceActions) -> Option<GestureCommand> {
        if let Some(command) = command {
            tracing::debug!(?command, "gesture");
            actions.dispatch(command);
        }
        command
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        fired: RefCell<Vec<GestureCommand>>,
    }

    impl SurfaceActions for Recorder {
        fn trigger_slice(&self, index: u8) {
            self.fired.borrow_mut().push(GestureCommand::TriggerSlice(index));
        }

        fn soft_reset(&self) {
            self.fired.borrow_mut().push(GestureCommand::SoftReset);
        }

        fn sync_playheads(&self) {
            self.fired.borrow_mut().push(GestureCommand::SyncPlayheads);
        }
    }

    fn note(original: u8) -> NoteEvent {
        NoteEvent {
            triggered: None,
            original: Some(original),
        }
    }

    #[test]
    fn swipe_across_wedges_dispatches_triggers() {
        let mut surface = CircularSurface::from_config(&SurfaceConfig::default());
        let actions = Recorder::default();
        let geometry = *surface.geometry();

        surface.pointer_down(geometry.wedge_center(0, 0.7), &actions);
        surface.pointer_move(geometry.point_at(5.0, 0.7), &actions);
        surface.pointer_move(geometry.wedge_center(1, 0.7), &actions);
        surface.pointer_move(geometry.wedge_center(2, 0.7), &actions);
        surface.pointer_up(geometry.wedge_center(2, 0.7), &actions);

        assert_eq!(
            actions.fired.into_inner(),
            vec![
                GestureCommand::TriggerSlice(0),
                GestureCommand::TriggerSlice(1),
                GestureCommand::TriggerSlice(2),
            ]
        );
    }

    #[test]
    fn hub_tap_and_swipe() {
        let mut surface = CircularSurface::from_config(&SurfaceConfig::default());
        let actions = Recorder::default();
        let center = surface.geometry().center;

        surface.pointer_down(center, &actions);
        surface.pointer_up(Point::new(center.x + 5.0, center.y), &actions);

        surface.pointer_down(center, &actions);
        let far = Point::new(center.x + 120.0, center.y);
        surface.pointer_move(far, &actions);
        surface.pointer_up(far, &actions);

        assert_eq!(
            actions.fired.into_inner(),
            vec![GestureCommand::SyncPlayheads, GestureCommand::SoftReset]
        );
    }

    #[test]
    fn retrigger_only_when_original_playhead_changes() {
        let mut surface = CircularSurface::from_config(&SurfaceConfig::default());
        let actions = Recorder::default();
        let point = surface.geometry().wedge_center(6, 0.7);

        surface.pointer_down(point, &actions);
        surface.on_note(&note(0), &actions);
        surface.on_note(&note(0), &actions);
        surface.on_note(&NoteEvent { triggered: Some(3), original: None }, &actions);
        surface.on_note(&note(1), &actions);
        surface.pointer_up(point, &actions);
        surface.on_note(&note(2), &actions);

        assert_eq!(
            actions.fired.into_inner(),
            vec![GestureCommand::TriggerSlice(6); 3]
        );
    }
}
