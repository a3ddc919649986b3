//! Driver intent, independent of the input device that produced it.

use std::f32::consts::PI;

/// Discrete controls sampled once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InputIntent {
    pub accelerate: bool,
    pub brake: bool,
    pub left: bool,
    pub right: bool,
}

impl InputIntent {
    /// Accelerate and brake are mutually exclusive; accelerate wins when both are held.
    pub fn normalized(mut self) -> Self {
        if self.accelerate {
            self.brake = false;
        }
        self
    }

    /// Map a touch joystick direction to intents.
    ///
    /// `angle` is in radians, `0` pointing right and increasing counter-clockwise, as reported
    /// by the on-screen stick. The side zones steer, the bottom quarter brakes and everything
    /// else accelerates, so the diagonals combine steering with throttle.
    pub fn from_joystick(angle: f32) -> Self {
        let a = angle.rem_euclid(2.0 * PI);
        let mut intent = Self::default();

        if a > PI * 0.75 && a < PI * 1.25 {
            intent.left = true;
        } else if a > PI * 1.75 || a < PI * 0.25 {
            intent.right = true;
        }

        if a > PI * 1.25 && a < PI * 1.75 {
            intent.brake = true;
        } else if a < PI * 0.75 || a > PI * 1.75 {
            intent.accelerate = true;
        }

        intent
    }

    pub fn is_idle(&self) -> bool {
        !(self.accelerate || self.brake || self.left || self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accelerate_wins_over_brake() {
        let i = InputIntent {
            accelerate: true,
            brake: true,
            ..Default::default()
        }
        .normalized();
        assert!(i.accelerate);
        assert!(!i.brake);
    }

    #[test]
    fn joystick_zones() {
        // Straight up: throttle only.
        let up = InputIntent::from_joystick(PI * 0.5);
        assert_eq!(
            up,
            InputIntent {
                accelerate: true,
                ..Default::default()
            }
        );

        // Pointing right: throttle plus right steer.
        let right = InputIntent::from_joystick(0.0);
        assert!(right.accelerate && right.right && !right.left);

        // Pointing left: steer only.
        let left = InputIntent::from_joystick(PI);
        assert!(left.left && !left.accelerate && !left.brake);

        // Pointing down: brake only.
        let down = InputIntent::from_joystick(PI * 1.5);
        assert!(down.brake && !down.accelerate && !down.left && !down.right);

        // Lower right diagonal: right steer with throttle.
        let lower_right = InputIntent::from_joystick(PI * 1.9);
        assert!(lower_right.right && lower_right.accelerate);
    }

    #[test]
    fn idle_detection() {
        assert!(InputIntent::default().is_idle());
        assert!(!InputIntent::from_joystick(PI).is_idle());
    }
}
