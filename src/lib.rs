// Runtime for a 4-wheel omni base driven over a CAN actuator bus

pub mod config;
pub mod messages;
pub mod motor;
pub mod runtime;
