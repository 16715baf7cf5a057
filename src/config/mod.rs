// src/config/mod.rs
pub mod content;
