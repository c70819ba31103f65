use serde::{Deserialize, Serialize};

use super::geometry::{HitRegion, Point};

/// Output of the recognizer. Each variant maps to one bridge action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GestureCommand {
    TriggerSlice(u8),
    SoftReset,
    SyncPlayheads,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    SliceDragging { last: u8 },
    CenterDragging { origin: Point, current: Point },
}

/// One pointer-down-to-pointer-up interaction.
#[derive(Debug, Clone)]
pub struct GestureSession {
    state: GestureState,
    swipe_threshold: f64,
}

impl GestureSession {
    pub fn new(swipe_threshold: f64) -> Self {
        Self {
            state: GestureState::Idle,
            swipe_threshold,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == GestureState::Idle
    }

    /// Distance the center hub has been dragged so far.
    pub fn displacement(&self) -> Option<f64> {
        match self.state {
            GestureState::CenterDragging { origin, current } => Some(origin.distance_to(current)),
            _ => None,
        }
    }

    /// Starts a session. Any live session is abandoned without output.
    pub fn pointer_down(&mut self, point: Point, hit: HitRegion) -> Option<GestureCommand> {
        match hit {
            HitRegion::Slice(index) => {
                self.state = GestureState::SliceDragging { last: index };
                Some(GestureCommand::TriggerSlice(index))
            }
            HitRegion::CenterHub => {
                self.state = GestureState::CenterDragging {
                    origin: point,
                    current: point,
                };
                None
            }
            HitRegion::Outside => {
                self.state = GestureState::Idle;
                None
            }
        }
    }

    pub fn pointer_move(&mut self, point: Point, hit: HitRegion) -> Option<GestureCommand> {
        match (&mut self.state, hit) {
            (GestureState::SliceDragging { last }, HitRegion::Slice(index)) if *last != index => {
                *last = index;
                Some(GestureCommand::TriggerSlice(index))
            }
            (GestureState::CenterDragging { current, .. }, _) => {
                *current = point;
                None
            }
            _ => None,
        }
    }

    /// Ends the session. A center release is a swipe only when it lands
    /// strictly farther than the threshold from where it started.
    pub fn pointer_up(&mut self, point: Point) -> Option<GestureCommand> {
        let state = std::mem::replace(&mut self.state, GestureState::Idle);
        match state {
            GestureState::CenterDragging { origin, .. } => {
                if origin.distance_to(point) > self.swipe_threshold {
                    Some(GestureCommand::SoftReset)
                } else {
                    Some(GestureCommand::SyncPlayheads)
                }
            }
            GestureState::SliceDragging { .. } | GestureState::Idle => None,
        }
    }

    /// Cancels the session without output.
    pub fn pointer_leave(&mut self) -> Option<GestureCommand> {
        self.state = GestureState::Idle;
        None
    }

    /// Host playback moved on; a held slice fires again.
    pub fn playhead_advanced(&self) -> Option<GestureCommand> {
        match self.state {
            GestureState::SliceDragging { last } => Some(GestureCommand::TriggerSlice(last)),
            _ => None,
        }
    }
}

impl Default for GestureSession {
    fn default() -> Self {
        Self::new(crate::config::SurfaceConfig::default().swipe_threshold)
    }
}
