use std::collections::HashMap;

use chrono::{DateTime, Utc};

use tokio::sync::Mutex;

use uuid::Uuid;

use super::{ensure_held, ensure_movable, ensure_redeemable, BookingStore};
use crate::domain::{
    Booking, BookingStatus, Cancellation, DiscountCode, NewHold, PromoCode, RescheduleRequest,
    ReservationStatus, ServiceOffering, SlotReservation,
};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct State {
    services: HashMap<String, ServiceOffering>,
    promo_codes: HashMap<DiscountCode, PromoCode>,
    reservations: HashMap<Uuid, SlotReservation>,
    bookings: HashMap<Uuid, Booking>,
}

impl State {
    fn slot_taken(&self, service_id: &str, start_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.reservations.values().any(|reservation| {
            reservation.service_id == service_id
                && reservation.start_at == start_at
                && reservation.is_active(now)
        })
    }

    fn expire_lapsed(&mut self, now: DateTime<Utc>, key: Option<(&str, DateTime<Utc>)>) -> u64 {
        let mut expired = 0;
        for reservation in self.reservations.values_mut() {
            let matches_key = key.map_or(true, |(service_id, start_at)| {
                reservation.service_id == service_id && reservation.start_at == start_at
            });
            if matches_key && reservation.is_lapsed(now) {
                reservation.status = ReservationStatus::Expired;
                expired += 1;
            }
        }
        expired
    }

    /// Check that `id` is a hold that can still be confirmed at `now`
    fn confirmable(&self, id: Uuid, now: DateTime<Utc>) -> Result<&SlotReservation> {
        let reservation = self
            .reservations
            .get(&id)
            .ok_or_else(|| Error::not_found("Reservation", id))?;
        ensure_held(reservation, now)?;
        Ok(reservation)
    }

    fn set_reservation_status(&mut self, id: Uuid, status: ReservationStatus) {
        if let Some(reservation) = self.reservations.get_mut(&id) {
            reservation.status = status;
        }
    }

    /// Check that `id` is an active booking still scheduled at `expected`
    fn movable_booking(&mut self, id: Uuid, expected: DateTime<Utc>) -> Result<&mut Booking> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("Booking", id))?;
        ensure_movable(booking, expected)?;
        Ok(booking)
    }
}

/// Store kept in process memory. One lock guards all records, so every operation is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_service(&self, service: ServiceOffering) -> Result<()> {
        service.validate().map_err(Error::Validation)?;
        self.state
            .lock()
            .await
            .services
            .insert(service.id.clone(), service);
        Ok(())
    }

    pub async fn insert_promo_code(&self, promo: PromoCode) {
        self.state
            .lock()
            .await
            .promo_codes
            .insert(promo.code.clone(), promo);
    }
}

#[async_trait::async_trait]
impl BookingStore for MemoryStore {
    async fn fetch_service(&self, id: &str) -> Result<Option<ServiceOffering>> {
        Ok(self.state.lock().await.services.get(id).cloned())
    }

    async fn list_services(&self) -> Result<Vec<ServiceOffering>> {
        let state = self.state.lock().await;
        let mut services: Vec<_> = state
            .services
            .values()
            .filter(|service| service.active)
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    async fn fetch_promo_code(&self, code: &DiscountCode) -> Result<Option<PromoCode>> {
        Ok(self.state.lock().await.promo_codes.get(code).cloned())
    }

    #[tracing::instrument(name = "Insert hold in memory", skip(self, hold), fields(service_id = %hold.service_id, start_at = %hold.start_at))]
    async fn insert_hold(&self, hold: NewHold, now: DateTime<Utc>) -> Result<SlotReservation> {
        let mut state = self.state.lock().await;

        state.expire_lapsed(now, Some((hold.service_id.as_str(), hold.start_at)));
        if state.slot_taken(&hold.service_id, hold.start_at, now) {
            return Err(Error::SlotConflict(
                "The requested time slot is no longer available".into(),
            ));
        }

        let reservation = SlotReservation {
            id: Uuid::new_v4(),
            service_id: hold.service_id,
            start_at: hold.start_at,
            holder_id: hold.holder_id,
            created_at: now,
            expires_at: hold.expires_at,
            status: ReservationStatus::Held,
            pricing: hold.pricing,
            customer: hold.customer,
            location: hold.location,
        };
        state
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn fetch_reservation(&self, id: Uuid) -> Result<Option<SlotReservation>> {
        Ok(self.state.lock().await.reservations.get(&id).cloned())
    }

    async fn release_hold(&self, id: Uuid, now: DateTime<Utc>) -> Result<SlotReservation> {
        let mut state = self.state.lock().await;
        state.confirmable(id, now)?;
        state.set_reservation_status(id, ReservationStatus::Released);
        state
            .reservations
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found("Reservation", id))
    }

    #[tracing::instrument(name = "Confirm hold in memory", skip(self))]
    async fn confirm_hold(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking> {
        let mut state = self.state.lock().await;

        let reservation = state.confirmable(id, now)?.clone();

        if let Some(code) = &reservation.pricing.promo_code {
            let promo = state.promo_codes.get_mut(code);
            ensure_redeemable(code, promo.as_deref(), now)?;
            if let Some(promo) = promo {
                promo.used_count += 1;
            }
        }

        state.set_reservation_status(id, ReservationStatus::Confirmed);
        let booking = Booking::from_hold(&reservation, now);
        state.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn fetch_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn cancel_booking(
        &self,
        id: Uuid,
        expected_scheduled_at: DateTime<Utc>,
        cancellation: Cancellation,
    ) -> Result<Booking> {
        let mut state = self.state.lock().await;

        let booking = state.movable_booking(id, expected_scheduled_at)?;
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = cancellation.cancelled_at;
        booking.cancellation = Some(cancellation);
        let booking = booking.clone();

        state.set_reservation_status(booking.reservation_id, ReservationStatus::Released);
        Ok(booking)
    }

    async fn reschedule_booking(
        &self,
        request: RescheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut state = self.state.lock().await;

        state.movable_booking(request.booking_id, request.expected_scheduled_at)?;
        let new_start = state.confirmable(request.new_reservation_id, now)?.start_at;

        let booking = state
            .bookings
            .get_mut(&request.booking_id)
            .ok_or_else(|| Error::not_found("Booking", request.booking_id))?;
        let old_reservation_id = booking.reservation_id;
        booking.scheduled_at = new_start;
        booking.reservation_id = request.new_reservation_id;
        booking.status = BookingStatus::Rescheduled;
        booking.reschedule_count += 1;
        booking.reschedule_fees = booking.reschedule_fees + request.fee;
        booking.last_reschedule_reason = request.reason;
        booking.updated_at = now;
        let booking = booking.clone();

        state.set_reservation_status(request.new_reservation_id, ReservationStatus::Confirmed);
        state.set_reservation_status(old_reservation_id, ReservationStatus::Released);
        Ok(booking)
    }

    async fn expire_stale_holds(&self, now: DateTime<Utc>) -> Result<u64> {
        Ok(self.state.lock().await.expire_lapsed(now, None))
    }
}
