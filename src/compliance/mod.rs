//! Politeness and compliance: robots.txt checks, request pacing, and the
//! retrying navigator that composes them in front of every page load.

mod navigator;
mod pacing;
mod robots;

pub use navigator::{NavError, Navigator};
pub use pacing::Pacer;
pub use robots::{RobotsCache, RobotsDecision, RobotsPolicy};
