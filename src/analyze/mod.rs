// src/analyze/mod.rs
pub mod gateway;
pub mod judgment;
