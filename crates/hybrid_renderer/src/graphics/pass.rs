//! Explicit state machine for the per-view pass sequence
//!
//! A frame is `begin()` .. `end()`. Inside it, each view runs
//! depth → shadow* → light → forward → postprocess. Shadow may repeat once
//! per cascade and may be left out entirely. Light, forward and postprocess
//! may be left out too; [`PassTracker::pending_passes`] reports which of them
//! a backend has to run empty so later passes read initialized images.
//! Beginning a depth pass starts the next view.

use std::fmt;

use super::error::{RenderError, RenderResult};
use super::limits::GraphicsLimits;

/// The five passes of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Gbuffer and depth fill
    Depth,
    /// One shadow cascade
    Shadow,
    /// Deferred light accumulation
    Light,
    /// Composition, skybox and forward shaded geometry
    Forward,
    /// Ping-pong effect chain and tonemap
    Postprocess,
}

impl PassKind {
    /// Passes a view needs for its output to be complete, in order
    pub const REQUIRED: [Self; 3] = [Self::Light, Self::Forward, Self::Postprocess];

    /// Position in the per-view order
    pub const fn rank(self) -> u8 {
        match self {
            Self::Depth => 0,
            Self::Shadow => 1,
            Self::Light => 2,
            Self::Forward => 3,
            Self::Postprocess => 4,
        }
    }

    /// Lower case name used in diagnostics
    pub const fn name(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Shadow => "shadow",
            Self::Light => "light",
            Self::Forward => "forward",
            Self::Postprocess => "postprocess",
        }
    }
}

/// Where the recording currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    /// Outside `begin()`/`end()`
    Idle,
    /// Frame open with no pass recording; `completed` is the last pass ended in the current view
    Recording {
        /// Last finished pass of the current view, `None` before the first view
        completed: Option<PassKind>,
    },
    /// A pass is open
    InPass(PassKind),
}

impl fmt::Display for PassState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "no frame is recording"),
            Self::Recording { completed: None } => write!(f, "recording with no view started"),
            Self::Recording { completed: Some(kind) } => {
                write!(f, "recording after the {} pass", kind.name())
            }
            Self::InPass(kind) => write!(f, "inside the {} pass", kind.name()),
        }
    }
}

/// Validates every pass transition before a backend records anything
#[derive(Debug, Clone)]
pub struct PassTracker {
    state: PassState,
    cascades: u32,
    effect_open: bool,
    effects: u32,
    views: u32,
}

impl Default for PassTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PassTracker {
    /// Tracker in the idle state
    pub fn new() -> Self {
        Self {
            state: PassState::Idle,
            cascades: 0,
            effect_open: false,
            effects: 0,
            views: 0,
        }
    }

    /// Current state
    pub fn state(&self) -> PassState {
        self.state
    }

    /// Views begun since `begin()`
    pub fn views(&self) -> u32 {
        self.views
    }

    /// Effects drawn in the open postprocess pass
    pub fn effects(&self) -> u32 {
        self.effects
    }

    /// Cascades rendered in the current view, as a bit mask
    pub fn cascade_mask(&self) -> u32 {
        self.cascades
    }

    /// Whether a frame is recording
    pub fn is_recording(&self) -> bool {
        !matches!(self.state, PassState::Idle)
    }

    fn reject(&self, action: &'static str) -> RenderError {
        RenderError::InvalidPassTransition {
            action,
            state: self.state,
        }
    }

    /// `begin()`
    pub fn begin_frame(&mut self) -> RenderResult<()> {
        if self.state != PassState::Idle {
            return Err(self.reject("begin a frame"));
        }
        self.state = PassState::Recording { completed: None };
        self.views = 0;
        Ok(())
    }

    /// `end()`; the caller completes pending passes first
    pub fn end_frame(&mut self) -> RenderResult<()> {
        match self.state {
            PassState::Recording { .. } => {
                self.state = PassState::Idle;
                Ok(())
            }
            _ => Err(self.reject("end the frame")),
        }
    }

    /// Open `kind`; shadow passes go through [`Self::begin_shadow`]
    pub fn begin_pass(&mut self, kind: PassKind) -> RenderResult<()> {
        let PassState::Recording { completed } = self.state else {
            return Err(self.reject(begin_action(kind)));
        };

        let allowed = match (kind, completed) {
            (PassKind::Depth, _) => true,
            (_, None) => false,
            (PassKind::Shadow, Some(PassKind::Shadow)) => true,
            (_, Some(done)) => kind.rank() > done.rank() && done != PassKind::Postprocess,
        };
        if !allowed {
            return Err(self.reject(begin_action(kind)));
        }

        match kind {
            PassKind::Depth => {
                self.cascades = 0;
                self.views += 1;
            }
            PassKind::Postprocess => {
                self.effect_open = false;
                self.effects = 0;
            }
            _ => {}
        }
        self.state = PassState::InPass(kind);
        Ok(())
    }

    /// Open a shadow pass for `cascade`, the next unrendered cascade of the view
    pub fn begin_shadow(&mut self, cascade: u32) -> RenderResult<()> {
        if cascade >= GraphicsLimits::MAX_SHADOW_CASCADES {
            return Err(RenderError::CascadeOutOfRange {
                cascade,
                max: GraphicsLimits::MAX_SHADOW_CASCADES,
            });
        }
        if self.cascades & (1 << cascade) != 0 {
            return Err(RenderError::DuplicateCascade(cascade));
        }
        // cascades fill 0..n so the shaded count matches what was rendered
        let expected = self.cascades.count_ones();
        if cascade != expected {
            return Err(RenderError::CascadeOutOfOrder { cascade, expected });
        }
        self.begin_pass(PassKind::Shadow)?;
        self.cascades |= 1 << cascade;
        Ok(())
    }

    /// Close `kind`
    pub fn end_pass(&mut self, kind: PassKind) -> RenderResult<()> {
        if self.state != PassState::InPass(kind) {
            return Err(self.reject(end_action(kind)));
        }
        if kind == PassKind::Postprocess && self.effect_open {
            return Err(RenderError::PostprocessStep(
                "next_postprocess_pass was not followed by an effect",
            ));
        }
        self.state = PassState::Recording {
            completed: Some(kind),
        };
        Ok(())
    }

    /// Check that `call` is made inside `kind`
    pub fn require(&self, kind: PassKind, call: &'static str) -> RenderResult<()> {
        if self.state == PassState::InPass(kind) {
            Ok(())
        } else {
            Err(RenderError::DrawOutsidePass {
                call,
                expected: kind,
                state: self.state,
            })
        }
    }

    /// `next_postprocess_pass`
    pub fn next_effect(&mut self) -> RenderResult<()> {
        self.require(PassKind::Postprocess, "next_postprocess_pass")?;
        if self.effect_open {
            return Err(RenderError::PostprocessStep(
                "previous step has no effect drawn",
            ));
        }
        self.effect_open = true;
        Ok(())
    }

    /// One of the `draw_<effect>` calls
    pub fn draw_effect(&mut self, call: &'static str) -> RenderResult<()> {
        self.require(PassKind::Postprocess, call)?;
        if !self.effect_open {
            return Err(RenderError::PostprocessStep(
                "call next_postprocess_pass before each effect",
            ));
        }
        self.effect_open = false;
        self.effects += 1;
        Ok(())
    }

    /// Required passes skipped between the current view's progress and `next`
    ///
    /// `None` (or a depth pass, which starts a new view) asks for everything
    /// needed to finish the current view.
    pub fn pending_passes(&self, next: Option<PassKind>) -> Vec<PassKind> {
        let PassState::Recording {
            completed: Some(done),
        } = self.state
        else {
            return Vec::new();
        };
        let limit = next
            .filter(|kind| *kind != PassKind::Depth)
            .map_or(u8::MAX, PassKind::rank);

        PassKind::REQUIRED
            .into_iter()
            .filter(|kind| kind.rank() > done.rank() && kind.rank() < limit)
            .collect()
    }
}

fn begin_action(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Depth => "begin the depth pass",
        PassKind::Shadow => "begin a shadow pass",
        PassKind::Light => "begin the light pass",
        PassKind::Forward => "begin the forward pass",
        PassKind::Postprocess => "begin the postprocess pass",
    }
}

fn end_action(kind: PassKind) -> &'static str {
    match kind {
        PassKind::Depth => "end the depth pass",
        PassKind::Shadow => "end a shadow pass",
        PassKind::Light => "end the light pass",
        PassKind::Forward => "end the forward pass",
        PassKind::Postprocess => "end the postprocess pass",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tracker: &mut PassTracker, kind: PassKind) {
        tracker.begin_pass(kind).unwrap();
        tracker.end_pass(kind).unwrap();
    }

    #[test]
    fn test_full_sequence_is_accepted() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        run(&mut tracker, PassKind::Depth);
        for cascade in 0..4 {
            tracker.begin_shadow(cascade).unwrap();
            tracker.end_pass(PassKind::Shadow).unwrap();
        }
        run(&mut tracker, PassKind::Light);
        run(&mut tracker, PassKind::Forward);
        tracker.begin_pass(PassKind::Postprocess).unwrap();
        tracker.next_effect().unwrap();
        tracker.draw_effect("draw_fxaa").unwrap();
        tracker.end_pass(PassKind::Postprocess).unwrap();
        tracker.end_frame().unwrap();
        assert_eq!(tracker.state(), PassState::Idle);
    }

    #[test]
    fn test_pass_before_depth_is_rejected() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        assert!(matches!(
            tracker.begin_pass(PassKind::Light),
            Err(RenderError::InvalidPassTransition { .. })
        ));
    }

    #[test]
    fn test_backwards_transition_is_rejected() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        run(&mut tracker, PassKind::Depth);
        run(&mut tracker, PassKind::Light);
        assert!(tracker.begin_shadow(0).is_err(), "shadow after light");
        assert!(tracker.begin_pass(PassKind::Light).is_err(), "light twice");
    }

    #[test]
    fn test_nested_begin_is_rejected() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        tracker.begin_pass(PassKind::Depth).unwrap();
        assert!(tracker.begin_pass(PassKind::Depth).is_err());
        assert!(tracker.end_pass(PassKind::Light).is_err());
        assert!(tracker.end_frame().is_err(), "cannot end the frame inside a pass");
    }

    #[test]
    fn test_cascade_limits() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        run(&mut tracker, PassKind::Depth);
        assert!(matches!(
            tracker.begin_shadow(4),
            Err(RenderError::CascadeOutOfRange { cascade: 4, max: 4 })
        ));
        tracker.begin_shadow(0).unwrap();
        tracker.end_pass(PassKind::Shadow).unwrap();
        assert!(matches!(tracker.begin_shadow(0), Err(RenderError::DuplicateCascade(0))));
    }

    #[test]
    fn test_cascades_must_be_contiguous() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        run(&mut tracker, PassKind::Depth);
        assert!(matches!(
            tracker.begin_shadow(3),
            Err(RenderError::CascadeOutOfOrder { cascade: 3, expected: 0 })
        ));
        assert_eq!(tracker.cascade_mask(), 0);
        tracker.begin_shadow(0).unwrap();
        tracker.end_pass(PassKind::Shadow).unwrap();
        assert!(matches!(
            tracker.begin_shadow(2),
            Err(RenderError::CascadeOutOfOrder { cascade: 2, expected: 1 })
        ));
        tracker.begin_shadow(1).unwrap();
        tracker.end_pass(PassKind::Shadow).unwrap();
        assert_eq!(tracker.cascade_mask(), 0b11);
    }

    #[test]
    fn test_cascades_reset_per_view() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        run(&mut tracker, PassKind::Depth);
        tracker.begin_shadow(0).unwrap();
        tracker.end_pass(PassKind::Shadow).unwrap();
        run(&mut tracker, PassKind::Light);
        run(&mut tracker, PassKind::Forward);
        run(&mut tracker, PassKind::Postprocess);

        run(&mut tracker, PassKind::Depth);
        assert_eq!(tracker.views(), 2);
        tracker.begin_shadow(0).unwrap();
    }

    #[test]
    fn test_draw_outside_pass_is_rejected() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        tracker.begin_pass(PassKind::Depth).unwrap();
        assert!(tracker.require(PassKind::Depth, "draw_depth").is_ok());
        assert!(matches!(
            tracker.require(PassKind::Forward, "draw_forward"),
            Err(RenderError::DrawOutsidePass { expected: PassKind::Forward, .. })
        ));
    }

    #[test]
    fn test_effect_needs_a_step() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        run(&mut tracker, PassKind::Depth);
        tracker.begin_pass(PassKind::Postprocess).unwrap();
        assert!(tracker.draw_effect("draw_blur").is_err(), "no step opened");
        tracker.next_effect().unwrap();
        assert!(tracker.next_effect().is_err(), "empty step");
        tracker.draw_effect("draw_blur").unwrap();
        tracker.next_effect().unwrap();
        assert!(tracker.end_pass(PassKind::Postprocess).is_err(), "dangling step");
    }

    #[test]
    fn test_pending_passes_fill_the_gaps() {
        let mut tracker = PassTracker::new();
        tracker.begin_frame().unwrap();
        assert!(tracker.pending_passes(None).is_empty(), "no view yet");

        run(&mut tracker, PassKind::Depth);
        assert_eq!(tracker.pending_passes(Some(PassKind::Forward)), vec![PassKind::Light]);
        assert_eq!(
            tracker.pending_passes(None),
            vec![PassKind::Light, PassKind::Forward, PassKind::Postprocess]
        );
        assert_eq!(tracker.pending_passes(Some(PassKind::Depth)), tracker.pending_passes(None));

        run(&mut tracker, PassKind::Light);
        run(&mut tracker, PassKind::Forward);
        run(&mut tracker, PassKind::Postprocess);
        assert!(tracker.pending_passes(None).is_empty());
    }
}
