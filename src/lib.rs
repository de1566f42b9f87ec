/// Basic application code
pub mod app;
/// Refund and reschedule fee rules
pub mod cancellation;
/// REST clients for outside services
pub mod client;
/// Time sources
pub mod clock;
/// Controllers for REST endpoints
pub mod controller;
/// Cryptography-related objects
pub mod crypto;
/// Domain objects
pub mod domain;
/// Error enums
pub mod error;
/// Out-of-band booking notifications
pub mod notifications;
/// Price calculation
pub mod pricing;
/// Repositories
pub mod repo;
/// Slot holds and the booking lifecycle
pub mod reservations;
/// Distance and service-area resolution
pub mod service_area;
/// Application settings
pub mod settings;
/// Application telemetry for tracing and logging
pub mod telemetry;
