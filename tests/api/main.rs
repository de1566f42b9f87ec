mod bookings;
mod health_check;
mod helpers;
mod pricing;
mod reservations;
