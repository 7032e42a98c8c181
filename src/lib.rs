// Library exports for VibeBeats - mood-matched music from your webcam

pub mod camera;
pub mod config;
pub mod emotion;
pub mod error;
pub mod models;
pub mod player;
pub mod search;
pub mod session;
pub mod ui;
pub mod worker;
