mod address;
mod booking;
mod customer;
mod email_address;
mod money;
mod person_name;
mod promo_code;
mod reservation;
mod service_offering;

pub use address::Address;
pub use booking::{Booking, BookingStatus, Cancellation, CancellationInitiator, RescheduleRequest};
pub use customer::{parse_location, CustomerContact};
pub use email_address::EmailAddress;
pub use money::Money;
pub use person_name::PersonName;
pub use promo_code::{DiscountCode, DiscountKind, PromoCode, PromoStatus};
pub use reservation::{HolderId, NewHold, ReservationStatus, SlotReservation};
pub use service_offering::ServiceOffering;

#[cfg(test)]
pub(crate) use service_offering::fixtures;
