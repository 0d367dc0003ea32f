//! The usage core: aggregating raw records, resolving display names and formatting durations.
//! [refresh::refresh] composes them into one screen refresh.

pub mod aggregator;
pub mod duration;
pub mod entities;
pub mod names;
pub mod refresh;
pub mod screen;
