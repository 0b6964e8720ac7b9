// src/lib.rs

pub mod achievements;
pub mod config;
pub mod constants;
pub mod database;
pub mod error;
pub mod events;
pub mod models;
pub mod progress;
pub mod repository;
pub mod scheduler;
pub mod service;

pub use error::{NexusError, Result};
pub use models::{Quality, ReviewRecord};
pub use progress::{apply_manual_override, compute_from_children, Completable};
pub use scheduler::ReviewScheduler;
