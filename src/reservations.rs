use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use rust_decimal::Decimal;

use tokio_util::sync::CancellationToken;

use uuid::Uuid;

use crate::cancellation::{
    calculate_refund, calculate_reschedule_fee, full_refund, hours_until, CancellationPolicy,
    RescheduleFee,
};
use crate::clock::Clock;
use crate::domain::{
    Address, Booking, Cancellation, CancellationInitiator, CustomerContact, DiscountCode, HolderId,
    Money, NewHold, RescheduleRequest, ServiceOffering, SlotReservation,
};
use crate::error::{Error, InvalidServiceReason, Result};
use crate::notifications::{Notification, NotificationQueue};
use crate::pricing::{calculate_price, PriceInput, PricingCalculation, PricingPolicy};
use crate::repo::BookingStore;
use crate::service_area::{DistanceResolution, ServiceAreaResolver};

/// What a customer asks to be priced
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteRequest {
    pub service_id: String,
    /// Explicit distance; takes precedence over `address`
    pub distance_miles: Option<Decimal>,
    pub address: Option<Address>,
    pub input: PriceInput,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub pricing: PricingCalculation,
    /// Present when the distance was resolved from an address
    pub service_area: Option<DistanceResolution>,
}

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub quote: QuoteRequest,
    pub start_at: DateTime<Utc>,
    pub holder_id: HolderId,
    pub customer: Option<CustomerContact>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rescheduled {
    pub booking: Booking,
    pub fee: RescheduleFee,
}

/// Tunables for the booking flow
#[derive(Debug, Clone)]
pub struct BookingPolicies {
    pub pricing: PricingPolicy,
    pub cancellation: CancellationPolicy,
    pub hold_ttl: Duration,
}

impl Default for BookingPolicies {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            cancellation: CancellationPolicy::default(),
            hold_ttl: Duration::minutes(15),
        }
    }
}

/// Quotes, holds and books appointment slots
pub struct ReservationManager {
    store: Arc<dyn BookingStore>,
    clock: Arc<dyn Clock>,
    resolver: ServiceAreaResolver,
    notifications: NotificationQueue,
    policies: BookingPolicies,
}

impl ReservationManager {
    pub fn new(
        store: Arc<dyn BookingStore>,
        clock: Arc<dyn Clock>,
        resolver: ServiceAreaResolver,
        notifications: NotificationQueue,
        policies: BookingPolicies,
    ) -> Self {
        Self {
            store,
            clock,
            resolver,
            notifications,
            policies,
        }
    }

    async fn service(&self, service_id: &str) -> Result<ServiceOffering> {
        self.store
            .fetch_service(service_id)
            .await?
            .ok_or_else(|| Error::InvalidService {
                service_id: service_id.to_string(),
                reason: InvalidServiceReason::Unknown,
            })
    }

    #[tracing::instrument(name = "List services", skip(self))]
    pub async fn list_services(&self) -> Result<Vec<ServiceOffering>> {
        self.store.list_services().await
    }

    /// Distance and service-area membership for `address`, against a service's radius if given
    #[tracing::instrument(name = "Check service area", skip(self))]
    pub async fn service_area(
        &self,
        address: &Address,
        service_id: Option<&str>,
    ) -> Result<DistanceResolution> {
        let radius = match service_id {
            Some(service_id) => self.service(service_id).await?.service_radius_miles,
            None => None,
        };
        Ok(self.resolver.resolve(address, radius).await)
    }

    #[tracing::instrument(name = "Quote a service", skip(self))]
    pub async fn quote(&self, request: &QuoteRequest) -> Result<Quote> {
        let service = self.service(&request.service_id).await?;

        let service_area = match (&request.address, request.distance_miles) {
            (Some(address), None) if service.active && !service.is_remote() => Some(
                self.resolver
                    .resolve(address, service.service_radius_miles)
                    .await,
            ),
            _ => None,
        };

        let input = PriceInput {
            distance_miles: request
                .distance_miles
                .or_else(|| service_area.as_ref().map(|area| area.miles)),
            ..request.input.clone()
        };

        // A malformed code can't match any stored code; it prices as unknown
        let promo = match input.promo_code.as_deref().map(str::parse::<DiscountCode>) {
            Some(Ok(code)) => self.store.fetch_promo_code(&code).await?,
            _ => None,
        };

        let pricing = calculate_price(
            &service,
            &self.policies.pricing,
            &input,
            promo.as_ref(),
            self.clock.now(),
        )?;

        Ok(Quote {
            pricing,
            service_area,
        })
    }

    /// Price the request and hold its slot for the hold TTL
    #[tracing::instrument(
        name = "Reserve a slot",
        skip(self, request),
        fields(service_id = %request.quote.service_id, start_at = %request.start_at)
    )]
    pub async fn reserve(&self, request: ReserveRequest) -> Result<SlotReservation> {
        let now = self.clock.now();
        if request.start_at <= now {
            return Err(Error::Validation(
                "Appointment time must be in the future".into(),
            ));
        }

        let quote = self.quote(&request.quote).await?;
        let hold = NewHold {
            service_id: request.quote.service_id,
            start_at: request.start_at,
            holder_id: request.holder_id,
            expires_at: now + self.policies.hold_ttl,
            pricing: quote.pricing,
            customer: request.customer,
            location: request.location,
        };

        let reservation = self.store.insert_hold(hold, now).await?;
        tracing::info!(reservation_id = %reservation.id, expires_at = %reservation.expires_at, "Slot held");
        Ok(reservation)
    }

    pub async fn fetch_reservation(&self, id: Uuid) -> Result<SlotReservation> {
        self.store
            .fetch_reservation(id)
            .await?
            .ok_or_else(|| Error::not_found("Reservation", id))
    }

    /// Turn a hold into a booking.
    ///
    /// When the payment amount is known it must equal the hold's `total_due`; a mismatch
    /// leaves the hold untouched and alerts an operator.
    #[tracing::instrument(name = "Confirm a reservation", skip(self))]
    pub async fn confirm(&self, id: Uuid, amount_charged: Option<Money>) -> Result<Booking> {
        if let Some(charged) = amount_charged {
            let expected = self.fetch_reservation(id).await?.pricing.total_due;
            if charged != expected {
                tracing::error!(
                    reservation_id = %id,
                    %expected,
                    %charged,
                    "Payment does not match amount due, manual reconciliation required"
                );
                self.notifications
                    .enqueue(Notification::ReconciliationRequired {
                        reservation_id: id,
                        expected,
                        charged,
                    });
                return Err(Error::Consistency { expected, charged });
            }
        }

        let booking = self.store.confirm_hold(id, self.clock.now()).await?;
        tracing::info!(booking_id = %booking.id, "Reservation confirmed");
        self.notifications
            .enqueue(Notification::BookingConfirmed(booking.clone()));
        Ok(booking)
    }

    #[tracing::instrument(name = "Release a reservation", skip(self))]
    pub async fn release(&self, id: Uuid) -> Result<SlotReservation> {
        self.store.release_hold(id, self.clock.now()).await
    }

    pub async fn fetch_booking(&self, id: Uuid) -> Result<Booking> {
        self.store
            .fetch_booking(id)
            .await?
            .ok_or_else(|| Error::not_found("Booking", id))
    }

    /// Cancel a booking, refunding from the price captured when it was booked
    #[tracing::instrument(name = "Cancel a booking", skip(self))]
    pub async fn cancel(
        &self,
        id: Uuid,
        reason: Option<String>,
        initiated_by: CancellationInitiator,
    ) -> Result<Booking> {
        let now = self.clock.now();
        let booking = self.fetch_booking(id).await?;
        if !booking.status.is_active() {
            return Err(Error::Conflict(format!("Booking {} is already cancelled", id)));
        }

        let paid = booking.pricing.total_due;
        let refund = match initiated_by {
            CancellationInitiator::Operator => {
                full_refund(paid, "Cancelled by the business; full refund")
            }
            CancellationInitiator::Customer => calculate_refund(
                paid,
                hours_until(now, booking.scheduled_at),
                &self.policies.cancellation,
            ),
        };

        let cancellation = Cancellation {
            reason,
            initiated_by,
            refund_amount: refund.refund_amount,
            refund_percentage: refund.refund_percentage,
            cancellation_fee: refund.cancellation_fee,
            explanation: refund.explanation,
            cancelled_at: now,
        };

        let booking = self
            .store
            .cancel_booking(id, booking.scheduled_at, cancellation)
            .await?;
        tracing::info!(refund = %refund.refund_amount, "Booking cancelled");
        self.notifications
            .enqueue(Notification::BookingCancelled(booking.clone()));
        Ok(booking)
    }

    /// Move a booking to `new_start`: hold the new slot, then swap reservations atomically
    #[tracing::instrument(name = "Reschedule a booking", skip(self))]
    pub async fn reschedule(
        &self,
        id: Uuid,
        new_start: DateTime<Utc>,
        reason: Option<String>,
    ) -> Result<Rescheduled> {
        let now = self.clock.now();
        let booking = self.fetch_booking(id).await?;
        if !booking.status.is_active() {
            return Err(Error::Conflict(format!("Booking {} is cancelled", id)));
        }
        if new_start <= now {
            return Err(Error::Validation(
                "New appointment time must be in the future".into(),
            ));
        }
        if new_start == booking.scheduled_at {
            return Err(Error::Validation(
                "New appointment time is the same as the current one".into(),
            ));
        }

        let fee = calculate_reschedule_fee(
            hours_until(now, booking.scheduled_at),
            &self.policies.cancellation,
        );

        let holder_id = format!("booking:{}", id)
            .parse()
            .map_err(Error::Validation)?;
        let hold = self
            .store
            .insert_hold(
                NewHold {
                    service_id: booking.service_id.clone(),
                    start_at: new_start,
                    holder_id,
                    expires_at: now + self.policies.hold_ttl,
                    pricing: booking.pricing.clone(),
                    customer: booking.customer.clone(),
                    location: booking.location.clone(),
                },
                now,
            )
            .await?;

        let request = RescheduleRequest {
            booking_id: id,
            expected_scheduled_at: booking.scheduled_at,
            new_reservation_id: hold.id,
            fee: fee.fee,
            reason: reason.filter(|reason| !reason.trim().is_empty()),
        };
        let booking = match self.store.reschedule_booking(request, now).await {
            Ok(booking) => booking,
            Err(e) => {
                if let Err(release_error) = self.store.release_hold(hold.id, now).await {
                    tracing::warn!(error = %release_error, reservation_id = %hold.id, "Failed to release unused hold");
                }
                return Err(e);
            }
        };

        tracing::info!(new_start = %booking.scheduled_at, fee = %fee.fee, "Booking rescheduled");
        self.notifications.enqueue(Notification::BookingRescheduled {
            booking: booking.clone(),
            fee: fee.fee,
        });
        Ok(Rescheduled { booking, fee })
    }

    /// Flip lapsed holds to expired. Conflict checks never depend on this having run.
    #[tracing::instrument(name = "Sweep expired holds", skip(self))]
    pub async fn sweep_expired(&self) -> Result<u64> {
        let expired = self.store.expire_stale_holds(self.clock.now()).await?;
        if expired > 0 {
            tracing::info!(expired, "Expired stale holds");
        }
        Ok(expired)
    }
}

/// Periodically expire lapsed holds until cancelled
pub async fn run_sweeper(
    manager: Arc<ReservationManager>,
    every: std::time::Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Hold sweeper stopped");
                break;
            }
            _ = interval.tick() => {
                if let Err(e) = manager.sweep_expired().await {
                    tracing::error!(error = %e, "Failed to sweep expired holds");
                }
            }
        }
    }
}
