//! Action playback clock
//!
//! The player turns simulated time into a `(frame, next frame, t)` triple
//! for the current action and raises an "iteration finished" signal once per
//! completed loop.

use crate::error::RigError;
use crate::model::RiggedModel;

/// Sentinel for "no next frame recorded yet"
const NO_FRAME: usize = usize::MAX;

/// Keyframe pair and blend factor for one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameState {
    /// Action being sampled
    pub action: usize,
    /// Earlier keyframe of the bracketing pair
    pub frame_index: usize,
    /// Later keyframe of the bracketing pair
    pub next_frame: usize,
    /// Interpolation factor in `[0, 1)`
    pub t: f32,
}

impl FrameState {
    /// Frame 0 of `action`, no interpolation
    pub fn start_of(action: usize) -> Self {
        Self {
            action,
            ..Self::default()
        }
    }
}

/// Result of sampling the player for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    /// Frame triple to evaluate
    pub frame: FrameState,
    /// A full loop (or a static pose change) just completed
    pub iteration_finished: bool,
    /// The action switched since the last sample
    pub action_changed: bool,
}

/// Playback state for one instance
#[derive(Debug, Clone)]
pub struct ActionPlayer {
    /// Simulated clock (seconds)
    now: f64,
    current_action: usize,
    prior_action: Option<usize>,
    /// Clock value when the current action started
    action_start: f64,
    /// External speed multiplier
    animation_speed: f32,
    last_next_frame: usize,
    /// Completed loops seen so far, for two-frame actions
    last_loop: u64,
    static_finish_pending: bool,
    action_changed: bool,
    /// Re-anchor `action_start` at the next sample
    restart_pending: bool,
    clamp_reported: bool,
}

impl ActionPlayer {
    /// Create a player starting `action` at time zero
    pub fn new(action: usize) -> Self {
        Self {
            now: 0.0,
            current_action: action,
            prior_action: None,
            action_start: 0.0,
            animation_speed: 1.0,
            last_next_frame: NO_FRAME,
            last_loop: 0,
            static_finish_pending: true,
            action_changed: true,
            restart_pending: false,
            clamp_reported: false,
        }
    }

    /// Advance the simulated clock
    pub fn advance(&mut self, delta_seconds: f64) {
        if delta_seconds.is_finite() && delta_seconds >= 0.0 {
            self.now += delta_seconds;
        } else {
            log::warn!("Ignoring invalid time step {delta_seconds}");
        }
    }

    /// Switch to another action; returns false if it was already playing
    ///
    /// The new action starts at the clock value of the next sample, so that
    /// sample is frame 0 even when the clock advanced in between.
    pub fn set_action(&mut self, action: usize) -> bool {
        if action == self.current_action {
            return false;
        }
        log::debug!("Action switch {} -> {}", self.current_action, action);
        self.prior_action = Some(self.current_action);
        self.current_action = action;
        self.restart();
        true
    }

    /// Restart the current action from frame 0 at the next sample
    pub fn restart(&mut self) {
        self.action_start = self.now;
        self.restart_pending = true;
        self.last_next_frame = NO_FRAME;
        self.last_loop = 0;
        self.static_finish_pending = true;
        self.action_changed = true;
        self.clamp_reported = false;
    }

    /// Set the external speed multiplier
    pub fn set_animation_speed(&mut self, speed: f32) {
        self.animation_speed = speed;
    }

    /// Get the external speed multiplier
    pub fn animation_speed(&self) -> f32 {
        self.animation_speed
    }

    /// Get the current action index
    pub fn current_action(&self) -> usize {
        self.current_action
    }

    /// Get the action that played before the last switch
    pub fn prior_action(&self) -> Option<usize> {
        self.prior_action
    }

    /// Get the simulated clock (seconds)
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Get the clock value at which the current action started
    pub fn action_start(&self) -> f64 {
        self.action_start
    }

    /// Compute the frame triple for the current clock
    pub fn sample(&mut self, model: &RiggedModel) -> TickOutcome {
        let action_changed = std::mem::take(&mut self.action_changed);
        if std::mem::take(&mut self.restart_pending) {
            self.action_start = self.now;
        }

        if model.actions.is_empty() {
            return TickOutcome {
                frame: FrameState::default(),
                iteration_finished: false,
                action_changed,
            };
        }

        if self.current_action >= model.action_count() {
            if !self.clamp_reported {
                log::warn!(
                    "{}",
                    RigError::ActionIndexOutOfRange {
                        index: self.current_action,
                        count: model.action_count(),
                    }
                );
            }
            self.current_action = 0;
            self.clamp_reported = true;
        }

        let index = self.current_action;
        let action = &model.actions[index];

        if action.is_static() {
            let iteration_finished = std::mem::take(&mut self.static_finish_pending);
            return TickOutcome {
                frame: FrameState::start_of(index),
                iteration_finished,
                action_changed,
            };
        }

        let total = (action.frame_count - 1) as f64;
        let elapsed = self.now - self.action_start;
        let rate = self.animation_speed as f64 * action.playback_speed as f64;
        // Non-positive rates freeze the pose at frame 0
        let raw = if rate > 0.0 { elapsed * rate } else { 0.0 };
        let raw = if raw.is_finite() { raw } else { 0.0 };

        let frame = raw.rem_euclid(total);
        let frame_index = (frame.floor() as usize).min(action.frame_count - 2);
        let t = (frame - frame_index as f64) as f32;
        let next_frame = (frame_index + 1) % (action.frame_count - 1);

        let iteration_finished = if action.frame_count == 2 {
            // A single segment never wraps its next frame; count loops instead
            let loops = (raw / total).floor().max(0.0) as u64;
            let finished = loops > self.last_loop;
            self.last_loop = loops;
            finished
        } else {
            let finished =
                self.last_next_frame != NO_FRAME && next_frame < self.last_next_frame;
            self.last_next_frame = if finished { NO_FRAME } else { next_frame };
            finished
        };

        TickOutcome {
            frame: FrameState {
                action: index,
                frame_index,
                next_frame,
                t,
            },
            iteration_finished,
            action_changed,
        }
    }
}

impl Default for ActionPlayer {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, KeyframeTrack};
    use glam::{Quat, Vec3};
    use test_case::test_case;

    fn model_with(actions: &[Action]) -> RiggedModel {
        let mut builder = RiggedModel::builder("player").bone("root", None);
        for action in actions {
            builder = builder.action(
                action.clone(),
                vec![KeyframeTrack::constant(
                    Quat::IDENTITY,
                    Vec3::ZERO,
                    action.frame_count.max(1),
                )],
            );
        }
        builder.build()
    }

    #[test]
    fn test_scenario_b_frame_math() {
        let model = model_with(&[Action::new(10, 2.0)]);
        let mut player = ActionPlayer::new(0);
        player.advance(2.5);
        let out = player.sample(&model);
        assert_eq!(out.frame.frame_index, 5);
        assert_eq!(out.frame.next_frame, 6);
        assert!(out.frame.t.abs() < 1e-6);
    }

    #[test_case(0.0, 0, 1, 0.0 ; "start")]
    #[test_case(1.5, 1, 2, 0.5 ; "between")]
    #[test_case(3.25, 3, 0, 0.25 ; "last segment wraps next")]
    #[test_case(4.0, 0, 1, 0.0 ; "full loop")]
    #[test_case(9.75, 1, 2, 0.75 ; "second loop")]
    fn test_looping_frame_index(time: f64, index: usize, next: usize, t: f32) {
        let model = model_with(&[Action::new(5, 1.0)]);
        let mut player = ActionPlayer::new(0);
        player.advance(time);
        let out = player.sample(&model);
        assert_eq!(out.frame.frame_index, index);
        assert_eq!(out.frame.next_frame, next);
        assert!((out.frame.t - t).abs() < 1e-5);
    }

    #[test]
    fn test_iteration_finished_once_per_loop() {
        let model = model_with(&[Action::new(5, 1.0)]);
        let mut player = ActionPlayer::new(0);

        let mut finished = 0;
        let first = player.sample(&model);
        assert!(!first.iteration_finished);

        // Three loops of four frames, sampled at 0.25s
        for _ in 0..48 {
            player.advance(0.25);
            if player.sample(&model).iteration_finished {
                finished += 1;
            }
        }
        assert_eq!(finished, 3);
    }

    #[test]
    fn test_iteration_finished_two_frame_action() {
        let model = model_with(&[Action::new(2, 1.0)]);
        let mut player = ActionPlayer::new(0);
        assert!(!player.sample(&model).iteration_finished);

        let mut finished = 0;
        for _ in 0..12 {
            player.advance(0.5);
            if player.sample(&model).iteration_finished {
                finished += 1;
            }
        }
        assert_eq!(finished, 6);
    }

    #[test]
    fn test_no_finish_right_after_switch() {
        let model = model_with(&[Action::new(5, 1.0), Action::new(5, 1.0)]);
        let mut player = ActionPlayer::new(0);
        player.advance(3.5);
        player.sample(&model);

        assert!(player.set_action(1));
        let out = player.sample(&model);
        assert!(out.action_changed);
        assert!(!out.iteration_finished);
        assert_eq!(out.frame.action, 1);
        assert_eq!(out.frame.frame_index, 0);
        assert_eq!(out.frame.t, 0.0);
        assert_eq!(player.prior_action(), Some(0));
        assert!((player.action_start() - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_switch_starts_at_next_sample() {
        let model = model_with(&[Action::new(5, 10.0), Action::new(5, 10.0)]);
        let mut player = ActionPlayer::new(0);
        player.advance(0.35);
        player.sample(&model);

        player.set_action(1);
        player.advance(1.0 / 60.0);
        let out = player.sample(&model);
        assert_eq!(
            out.frame,
            FrameState {
                action: 1,
                frame_index: 0,
                next_frame: 1,
                t: 0.0,
            }
        );
        assert!((player.action_start() - (0.35 + 1.0 / 60.0)).abs() < 1e-9);

        player.advance(0.05);
        let out = player.sample(&model);
        assert!((out.frame.t - 0.5).abs() < 1e-5);
    }

    #[test_case(-1.0, 1.0 ; "negative playback speed")]
    #[test_case(0.0, 1.0 ; "zero playback speed")]
    #[test_case(2.0, -1.0 ; "negative animation speed")]
    fn test_non_positive_rate_freezes(playback_speed: f32, animation_speed: f32) {
        let model = model_with(&[Action::new(5, playback_speed)]);
        let mut player = ActionPlayer::new(0);
        player.set_animation_speed(animation_speed);
        player.sample(&model);

        for _ in 0..20 {
            player.advance(0.5);
            let out = player.sample(&model);
            assert_eq!(out.frame.frame_index, 0);
            assert_eq!(out.frame.next_frame, 1);
            assert_eq!(out.frame.t, 0.0);
            assert!(!out.iteration_finished);
        }
    }

    #[test]
    fn test_static_action_finishes_once() {
        let model = model_with(&[Action::new(5, 1.0), Action::new(1, 1.0)]);
        let mut player = ActionPlayer::new(0);
        player.sample(&model);

        player.set_action(1);
        assert!(player.sample(&model).iteration_finished);
        for _ in 0..10 {
            player.advance(1.0);
            let out = player.sample(&model);
            assert!(!out.iteration_finished);
            assert_eq!(out.frame, FrameState::start_of(1));
        }
    }

    #[test]
    fn test_out_of_range_action_clamps() {
        let model = model_with(&[Action::new(5, 1.0)]);
        let mut player = ActionPlayer::new(7);
        let out = player.sample(&model);
        assert_eq!(out.frame.action, 0);
        assert_eq!(player.current_action(), 0);
    }

    #[test]
    fn test_animation_speed_multiplier() {
        let model = model_with(&[Action::new(10, 1.0)]);
        let mut player = ActionPlayer::new(0);
        player.set_animation_speed(3.0);
        player.advance(1.0);
        assert_eq!(player.sample(&model).frame.frame_index, 3);
    }

    #[test]
    fn test_invalid_time_step_is_ignored() {
        let mut player = ActionPlayer::new(0);
        player.advance(f64::NAN);
        player.advance(-1.0);
        assert_eq!(player.now(), 0.0);
    }
}
