pub mod bookings;
pub mod error;
pub mod pricing;
pub mod reservations;
pub mod services;
