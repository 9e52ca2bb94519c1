// src/services/mod.rs

pub mod attempt;
pub mod grading;

pub use attempt::AttemptService;
