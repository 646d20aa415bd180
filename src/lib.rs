// src/lib.rs

pub mod app_state;
pub mod audit;
pub mod cache;
pub mod config;
pub mod database;
pub mod keyvalue;
pub mod localization;
pub mod pagination;
pub mod service;
