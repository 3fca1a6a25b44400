// src/services/mod.rs

pub mod feed;
pub mod grading;
pub mod session;
