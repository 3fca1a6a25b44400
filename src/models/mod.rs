// src/models/mod.rs

pub mod content;
pub mod learner;
pub mod progress;
pub mod quiz;
