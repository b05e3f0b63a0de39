// src/lib.rs

//! Course material and forum synchronizer library

pub mod error;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
