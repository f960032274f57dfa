// src/lib.rs

//! Clinic Crawler Library
//!
//! Extracts store and clinic locations (name, address, access, phone,
//! hours) from Japanese business websites.

pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod services;
pub mod utils;
