#![forbid(unsafe_code)]

pub mod model;
pub mod progression;
pub mod quiz;
pub mod time;

pub use time::Clock;
