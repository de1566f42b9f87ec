use chrono::{DateTime, Utc};

use uuid::Uuid;

use crate::domain::{
    Booking, Cancellation, DiscountCode, NewHold, PromoCode, PromoStatus, RescheduleRequest,
    ReservationStatus, ServiceOffering, SlotReservation,
};
use crate::error::{Error, Result};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Persistent storage for the booking flow.
///
/// Every method that changes state is atomic: either all of its writes land or none do.
/// Implementations must keep at most one active reservation (held and unexpired, or
/// confirmed) per service and start time, treating lapsed holds as absent.
/// TODO: Swap async-trait for native async fn in traits once `dyn` dispatch is supported
#[async_trait::async_trait]
pub trait BookingStore: Send + Sync {
    async fn fetch_service(&self, id: &str) -> Result<Option<ServiceOffering>>;

    /// Active offerings, ordered by name
    async fn list_services(&self) -> Result<Vec<ServiceOffering>>;

    async fn fetch_promo_code(&self, code: &DiscountCode) -> Result<Option<PromoCode>>;

    /// Place a hold, failing with `SlotConflict` when the slot is taken at `now`
    async fn insert_hold(&self, hold: NewHold, now: DateTime<Utc>) -> Result<SlotReservation>;

    async fn fetch_reservation(&self, id: Uuid) -> Result<Option<SlotReservation>>;

    /// `held -> released`
    async fn release_hold(&self, id: Uuid, now: DateTime<Utc>) -> Result<SlotReservation>;

    /// `held -> confirmed`, redeem the applied promo code and create the booking
    async fn confirm_hold(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking>;

    async fn fetch_booking(&self, id: Uuid) -> Result<Option<Booking>>;

    /// Cancel an active booking still scheduled at `expected_scheduled_at` and free its slot
    async fn cancel_booking(
        &self,
        id: Uuid,
        expected_scheduled_at: DateTime<Utc>,
        cancellation: Cancellation,
    ) -> Result<Booking>;

    /// Confirm the new hold, release the old reservation and move the booking onto it
    async fn reschedule_booking(
        &self,
        request: RescheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking>;

    /// Mark every lapsed hold as expired, returning how many changed
    async fn expire_stale_holds(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// A hold can be confirmed or released only while it is held and unexpired
fn ensure_held(reservation: &SlotReservation, now: DateTime<Utc>) -> Result<()> {
    match reservation.status {
        ReservationStatus::Held if now < reservation.expires_at => Ok(()),
        ReservationStatus::Held | ReservationStatus::Expired => {
            Err(Error::ReservationExpired(reservation.id))
        }
        status => Err(Error::Conflict(format!(
            "Reservation {} is already {}",
            reservation.id,
            status.as_str()
        ))),
    }
}

/// The promo code priced into a hold must still be redeemable when the hold is confirmed
fn ensure_redeemable(code: &DiscountCode, promo: Option<&PromoCode>, now: DateTime<Utc>) -> Result<()> {
    let Some(promo) = promo else {
        return Err(Error::Conflict(format!("Promo code {} is no longer offered", code)));
    };
    let problem = match promo.availability(now) {
        Ok(()) => return Ok(()),
        Err(PromoStatus::Inactive) => "has been withdrawn",
        Err(PromoStatus::NotYetValid) => "is not valid yet",
        Err(PromoStatus::Expired) => "has expired",
        Err(PromoStatus::Exhausted) => "has no uses left",
        Err(_) => "cannot be redeemed",
    };
    Err(Error::Conflict(format!("Promo code {} {}", code, problem)))
}

/// Compare-and-swap guard: the booking is still active and still at `expected_scheduled_at`
fn ensure_movable(booking: &Booking, expected_scheduled_at: DateTime<Utc>) -> Result<()> {
    if !booking.status.is_active() {
        return Err(Error::Conflict(format!("Booking {} is cancelled", booking.id)));
    }
    if booking.scheduled_at != expected_scheduled_at {
        return Err(Error::Conflict(format!(
            "Booking {} was changed concurrently, try again",
            booking.id
        )));
    }
    Ok(())
}
