pub mod app;
pub mod appointment_handlers;
pub mod auth_handlers;
pub mod config;
pub mod doctor_handlers;
pub mod metrics;
pub mod pagination;
pub mod patient_handlers;
pub mod scheduling;

pub use app::{router, AppState};
