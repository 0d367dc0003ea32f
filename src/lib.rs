//! Shows how much time was spent in each app of an Android device over the last 24 hours.
//! The device is reached through `adb` or replayed from a JSON snapshot, and the report is only
//! produced once usage access was granted.
//!

pub mod cli;
pub mod config;
pub mod platform;
pub mod usage;
pub mod utils;
