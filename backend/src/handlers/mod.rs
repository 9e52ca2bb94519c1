// src/handlers/mod.rs

pub mod attempt;
pub mod exam;
pub mod question;
