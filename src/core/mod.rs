//! Configuration and the data types shared by the engine and its collaborators

pub mod config;
pub mod models;
