//! Client-side camera animation
//!
//! Produces the orientation actually rendered for a camera. It follows the
//! shared target at a bounded angular speed, taking the short way around the
//! yaw wrap point, and zooms linearly. `current` is owned by the animator:
//! everything else writes targets.

use std::sync::Arc;
use std::time::Duration;

use super::orientation::{clamp_pitch, normalize_yaw, shortest_yaw, Target, ViewAngles};
use super::settings::CameraSettings;

/// Default pan speed in degrees per second
pub const DEFAULT_PAN_SPEED: f64 = 50.0;

/// Default zoom speed in degrees of fov per second
pub const DEFAULT_ZOOM_SPEED: f64 = 15.0;

/// Zoom speed multiplier while the requested fov is automatic
pub const AUTO_ZOOM_FACTOR: f64 = 4.0;

/// Animates one camera towards its target
#[derive(Debug, Clone)]
pub struct OrientationAnimator {
    settings: Arc<CameraSettings>,
    target: Target,
    current: ViewAngles,
    pending_jump: bool,
    pan_speed: f64,
    zoom_speed: f64,
}

impl OrientationAnimator {
    /// Start at the camera's initial orientation
    pub fn new(settings: Arc<CameraSettings>) -> Self {
        let target = Target::new(settings.initial, true);
        let current = settings.resolve(&settings.initial);

        Self {
            settings,
            target,
            current,
            pending_jump: false,
            pan_speed: DEFAULT_PAN_SPEED,
            zoom_speed: DEFAULT_ZOOM_SPEED,
        }
    }

    /// Set pan speed (degrees per second)
    pub fn pan_speed(mut self, speed: f64) -> Self {
        self.pan_speed = speed;
        self
    }

    /// Set zoom speed (degrees of fov per second)
    pub fn zoom_speed(mut self, speed: f64) -> Self {
        self.zoom_speed = speed;
        self
    }

    pub fn settings(&self) -> &CameraSettings {
        &self.settings
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn current(&self) -> ViewAngles {
        self.current
    }

    /// Accept a new target; a jump is applied on the next tick
    ///
    /// The latest target decides: a non-jump target cancels a jump that
    /// hasn't been applied yet.
    pub fn set_target(&mut self, target: Target) {
        self.target = target;
        self.pending_jump = target.jump;
    }

    /// Whether `current` has reached the resolved target
    pub fn is_settled(&self) -> bool {
        let to = self.settings.resolve(&self.target.to);
        self.current.pan_distance(&to) < 1e-9 && (self.current.fov - to.fov).abs() < 1e-9
    }

    /// Advance the animation by `elapsed` and return the new orientation
    pub fn tick(&mut self, elapsed: Duration) -> ViewAngles {
        let to = self.settings.resolve(&self.target.to);

        if self.pending_jump {
            self.pending_jump = false;
            self.current = ViewAngles::new(clamp_pitch(to.pitch), normalize_yaw(to.yaw), to.fov);
            return self.current;
        }

        let dt = elapsed.as_secs_f64();

        self.step_pan(&to, self.pan_speed * dt);

        let zoom_speed = if self.target.to.fov.is_auto() {
            self.zoom_speed * AUTO_ZOOM_FACTOR
        } else {
            self.zoom_speed
        };
        self.step_zoom(to.fov, zoom_speed * dt);

        self.current
    }

    fn step_pan(&mut self, to: &ViewAngles, travel: f64) {
        let target_yaw = shortest_yaw(self.current.yaw, to.yaw);
        let delta_yaw = target_yaw - self.current.yaw;
        let delta_pitch = to.pitch - self.current.pitch;
        let distance = delta_yaw.hypot(delta_pitch);

        let (yaw, pitch) = if travel >= distance {
            (target_yaw, to.pitch)
        } else {
            let direction = delta_pitch.atan2(delta_yaw);
            (
                self.current.yaw + travel * direction.cos(),
                self.current.pitch + travel * direction.sin(),
            )
        };

        self.current.yaw = normalize_yaw(yaw);
        self.current.pitch = clamp_pitch(pitch);
    }

    fn step_zoom(&mut self, to: f64, travel: f64) {
        let delta = to - self.current.fov;
        if delta.abs() <= travel {
            self.current.fov = to;
        } else {
            self.current.fov += travel.copysign(delta);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{AutoFovStep, AutoFovTable, Fov, Orientation};

    fn settings() -> Arc<CameraSettings> {
        Arc::new(CameraSettings {
            key: "main".into(),
            ratio: 1.0,
            min_fov: 30.0,
            max_fov: 200.0,
            auto_fov: AutoFovTable::new(vec![
                AutoFovStep::new(0.0, 40.0),
                AutoFovStep::new(60.0, 120.0),
            ]),
            initial: Orientation::new(0.0, 90.0, Fov::Fixed(75.0)),
        })
    }

    const FRAME: Duration = Duration::from_millis(16);

    #[test]
    fn test_jump_applies_on_next_tick() {
        let mut animator = OrientationAnimator::new(settings());

        animator.set_target(Target::new(
            Orientation::new(0.0, 0.0, Fov::Fixed(75.0)),
            true,
        ));
        let current = animator.tick(FRAME);

        assert_eq!(current, ViewAngles::new(0.0, 0.0, 75.0));
        assert!(animator.is_settled());
    }

    #[test]
    fn test_animate_yaw_monotonically() {
        let mut animator = OrientationAnimator::new(settings());
        assert_eq!(animator.current(), ViewAngles::new(0.0, 90.0, 75.0));

        animator.set_target(Target::new(
            Orientation::new(0.0, 0.0, Fov::Fixed(75.0)),
            false,
        ));

        let mut last = f64::MAX;
        for _ in 0..50 {
            let distance = animator.tick(FRAME).yaw.abs();
            assert!(distance < last);
            last = distance;
        }

        // 50°/s for 0.8s = 40°
        assert!((animator.current().yaw - 50.0).abs() < 1e-6);

        // Long enough to arrive exactly
        animator.tick(Duration::from_secs(2));
        assert_eq!(animator.current().yaw, 0.0);
        assert!(animator.is_settled());
    }

    #[test]
    fn test_yaw_wraps_the_short_way() {
        let mut animator = OrientationAnimator::new(settings());
        animator.set_target(Target::new(Orientation::new(0.0, 170.0, Fov::Fixed(75.0)), true));
        animator.tick(FRAME);

        animator.set_target(Target::new(
            Orientation::new(0.0, -170.0, Fov::Fixed(75.0)),
            false,
        ));

        // 0.1s at 50°/s = 5°, moving towards 180
        let current = animator.tick(Duration::from_millis(100));
        assert!((current.yaw - 175.0).abs() < 1e-9);

        // Crossing the wrap point lands in canonical range
        let current = animator.tick(Duration::from_millis(100));
        assert_eq!(current.yaw, 180.0);
        let current = animator.tick(Duration::from_millis(100));
        assert!((current.yaw - -175.0).abs() < 1e-9);

        animator.tick(Duration::from_millis(100));
        assert!(animator.is_settled());
    }

    #[test]
    fn test_combined_pan_follows_direction() {
        let mut animator = OrientationAnimator::new(settings());
        animator.set_target(Target::new(Orientation::new(0.0, 0.0, Fov::Fixed(75.0)), true));
        animator.tick(FRAME);

        // 30 up, 40 right: distance 50
        animator.set_target(Target::new(
            Orientation::new(30.0, 40.0, Fov::Fixed(75.0)),
            false,
        ));
        let current = animator.tick(Duration::from_millis(500));

        // 25° travelled along (0.8, 0.6)
        assert!((current.yaw - 20.0).abs() < 1e-9);
        assert!((current.pitch - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_clamped() {
        let mut animator = OrientationAnimator::new(settings());
        animator.set_target(Target::new(Orientation::new(90.0, 0.0, Fov::Fixed(75.0)), false));

        for _ in 0..500 {
            let current = animator.tick(FRAME);
            assert!(current.pitch <= 90.0);
        }
        assert_eq!(animator.current().pitch, 90.0);
    }

    #[test]
    fn test_zoom_speed() {
        let mut animator = OrientationAnimator::new(settings());
        animator.set_target(Target::new(Orientation::new(0.0, 90.0, Fov::Fixed(45.0)), false));

        // 15°/s
        let current = animator.tick(Duration::from_secs(1));
        assert!((current.fov - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_auto_zoom_is_faster() {
        let mut animator = OrientationAnimator::new(settings());
        // Auto at pitch 0 resolves to 40
        animator.set_target(Target::new(Orientation::new(0.0, 90.0, Fov::Auto), false));

        // 15 * 4 = 60°/s, 35° to go
        let current = animator.tick(Duration::from_millis(500));
        assert!((current.fov - 45.0).abs() < 1e-9);

        let current = animator.tick(Duration::from_millis(500));
        assert_eq!(current.fov, 40.0);
    }

    #[test]
    fn test_auto_fov_follows_current_pitch_of_target() {
        let mut animator = OrientationAnimator::new(settings());
        animator.set_target(Target::new(Orientation::new(30.0, 0.0, Fov::Auto), true));

        let current = animator.tick(FRAME);
        assert_eq!(current, ViewAngles::new(30.0, 0.0, 80.0));
    }

    #[test]
    fn test_jump_flag_resets() {
        let mut animator = OrientationAnimator::new(settings());
        animator.set_target(Target::new(Orientation::new(0.0, 0.0, Fov::Fixed(75.0)), true));
        animator.tick(FRAME);

        // Same jump target re-sent as a non-jump update animates
        animator.set_target(Target::new(Orientation::new(0.0, 45.0, Fov::Fixed(75.0)), false));
        let current = animator.tick(Duration::from_millis(100));
        assert!((current.yaw - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_later_animate_cancels_pending_jump() {
        let mut animator = OrientationAnimator::new(settings());

        // Both arrive within one frame
        animator.set_target(Target::new(Orientation::new(0.0, 10.0, Fov::Fixed(75.0)), true));
        animator.set_target(Target::new(Orientation::new(0.0, 120.0, Fov::Fixed(75.0)), false));

        // 50°/s for 16ms from yaw 90
        let current = animator.tick(FRAME);
        assert!((current.yaw - 90.8).abs() < 1e-9);
        assert!(!animator.is_settled());
    }
}
