// src/lib.rs
pub mod config;
pub mod engine;
pub mod feed;
pub mod gui;
pub mod scope;
pub mod types;
