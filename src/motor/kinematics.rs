// Omniwheel inverse kinematics for a 4-wheel X-configuration base
// Converts a stick vector or a rotation request into per-wheel speed percentages.

use std::f64::consts::FRAC_PI_4;

use serde::{Deserialize, Serialize};

/// Wheel positions, in motor-address order
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    FrontLeft = 1,
    BackLeft = 2,
    BackRight = 3,
    FrontRight = 4,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [
        Wheel::FrontLeft,
        Wheel::BackLeft,
        Wheel::BackRight,
        Wheel::FrontRight,
    ];

    /// Motor bus address (1-4)
    pub fn address(self) -> u8 {
        self as u8
    }

    /// Index into address-ordered arrays
    pub fn index(self) -> usize {
        self as usize - 1
    }
}

/// Speed percentages for the four wheels
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSpeeds {
    pub front_left: f64,  // Motor 1
    pub back_left: f64,   // Motor 2
    pub back_right: f64,  // Motor 3
    pub front_right: f64, // Motor 4
}

impl WheelSpeeds {
    pub fn new(front_left: f64, back_left: f64, back_right: f64, front_right: f64) -> Self {
        Self {
            front_left,
            back_left,
            back_right,
            front_right,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns speeds as array in address order [1, 2, 3, 4]
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.front_left,
            self.back_left,
            self.back_right,
            self.front_right,
        ]
    }

    pub fn get(&self, wheel: Wheel) -> f64 {
        self.as_array()[wheel.index()]
    }
}

/// Holonomic translation from a stick vector
///
/// # Arguments
/// * `x`, `y` - Stick position; only its direction matters
/// * `max_speed` - Wheel speed percentage along the drive diagonals
///
/// A zero vector means "no motion" and yields all-zero speeds.
pub fn shift(x: i32, y: i32, max_speed: f64) -> WheelSpeeds {
    let (x, y) = (x as f64, y as f64);
    let distance = x.hypot(y);
    if distance == 0.0 {
        return WheelSpeeds::zero();
    }

    // acos only covers [0, pi]; the sign of y restores the lower half-plane
    let mut angle = (x / distance).clamp(-1.0, 1.0).acos();
    if y < 0.0 {
        angle = -angle;
    }
    // Wheel pairs 1-3 and 2-4 sit on the diagonals
    angle -= FRAC_PI_4;

    let vector_13 = angle.cos() * max_speed;
    let vector_24 = angle.sin() * max_speed;

    WheelSpeeds {
        front_left: vector_13,
        back_left: vector_24,
        back_right: -vector_13,
        front_right: -vector_24,
    }
}

/// In-place rotation: every wheel turns at the same speed
pub fn turn(speed: f64) -> WheelSpeeds {
    WheelSpeeds::new(speed, speed, speed, speed)
}
