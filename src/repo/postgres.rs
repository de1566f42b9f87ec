use chrono::{DateTime, Utc};

use rust_decimal::Decimal;

use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use uuid::Uuid;

use super::{ensure_held, ensure_movable, ensure_redeemable, BookingStore};
use crate::domain::{
    Booking, BookingStatus, Cancellation, CustomerContact, DiscountCode, Money, NewHold,
    PromoCode, RescheduleRequest, ReservationStatus, ServiceOffering, SlotReservation,
};
use crate::error::{Error, Result};
use crate::pricing::PricingCalculation;

const SERVICE_COLUMNS: &str = "id, name, base_price, requires_deposit, deposit_amount, \
    duration_minutes, max_signers, max_documents, service_radius_miles, active";

const PROMO_COLUMNS: &str = "code, discount_type, discount_value, valid_from, valid_until, \
    minimum_amount, max_discount_amount, max_uses, used_count, active";

const RESERVATION_COLUMNS: &str = "id, service_id, start_at, holder_id, created_at, expires_at, \
    status, pricing, customer, location";

const BOOKING_COLUMNS: &str = "id, reservation_id, service_id, scheduled_at, status, pricing, \
    customer, location, reschedule_count, reschedule_fees, last_reschedule_reason, cancellation, \
    created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ServiceRecord {
    id: String,
    name: String,
    base_price: Decimal,
    requires_deposit: bool,
    deposit_amount: Decimal,
    duration_minutes: i32,
    max_signers: i32,
    max_documents: i32,
    service_radius_miles: Option<Decimal>,
    active: bool,
}

impl TryFrom<ServiceRecord> for ServiceOffering {
    type Error = Error;

    fn try_from(record: ServiceRecord) -> Result<Self> {
        let service = ServiceOffering {
            id: record.id,
            name: record.name,
            base_price: Money::from_decimal(record.base_price),
            requires_deposit: record.requires_deposit,
            deposit_amount: Money::from_decimal(record.deposit_amount),
            duration_minutes: record.duration_minutes,
            max_signers: record.max_signers,
            max_documents: record.max_documents,
            service_radius_miles: record.service_radius_miles,
            active: record.active,
        };
        service.validate().map_err(Error::CorruptRecord)?;
        Ok(service)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PromoRecord {
    code: String,
    discount_type: String,
    discount_value: Decimal,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    minimum_amount: Option<Decimal>,
    max_discount_amount: Option<Decimal>,
    max_uses: Option<i32>,
    used_count: i32,
    active: bool,
}

impl TryFrom<PromoRecord> for PromoCode {
    type Error = Error;

    fn try_from(record: PromoRecord) -> Result<Self> {
        Ok(PromoCode {
            code: record.code.parse().map_err(Error::CorruptRecord)?,
            kind: record.discount_type.parse().map_err(Error::CorruptRecord)?,
            value: record.discount_value,
            valid_from: record.valid_from,
            valid_until: record.valid_until,
            minimum_amount: record.minimum_amount.map(Money::from_decimal),
            max_discount_amount: record.max_discount_amount.map(Money::from_decimal),
            max_uses: record.max_uses,
            used_count: record.used_count,
            active: record.active,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReservationRecord {
    id: Uuid,
    service_id: String,
    start_at: DateTime<Utc>,
    holder_id: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    status: String,
    pricing: Json<PricingCalculation>,
    customer: Option<Json<CustomerContact>>,
    location: Option<String>,
}

impl TryFrom<ReservationRecord> for SlotReservation {
    type Error = Error;

    fn try_from(record: ReservationRecord) -> Result<Self> {
        Ok(SlotReservation {
            id: record.id,
            service_id: record.service_id,
            start_at: record.start_at,
            holder_id: record.holder_id.parse().map_err(Error::CorruptRecord)?,
            created_at: record.created_at,
            expires_at: record.expires_at,
            status: record.status.parse().map_err(Error::CorruptRecord)?,
            pricing: record.pricing.0,
            customer: record.customer.map(|customer| customer.0),
            location: record.location,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRecord {
    id: Uuid,
    reservation_id: Uuid,
    service_id: String,
    scheduled_at: DateTime<Utc>,
    status: String,
    pricing: Json<PricingCalculation>,
    customer: Option<Json<CustomerContact>>,
    location: Option<String>,
    reschedule_count: i32,
    reschedule_fees: Decimal,
    last_reschedule_reason: Option<String>,
    cancellation: Option<Json<Cancellation>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRecord> for Booking {
    type Error = Error;

    fn try_from(record: BookingRecord) -> Result<Self> {
        Ok(Booking {
            id: record.id,
            reservation_id: record.reservation_id,
            service_id: record.service_id,
            scheduled_at: record.scheduled_at,
            status: record.status.parse().map_err(Error::CorruptRecord)?,
            pricing: record.pricing.0,
            customer: record.customer.map(|customer| customer.0),
            location: record.location,
            reschedule_count: record.reschedule_count,
            reschedule_fees: Money::from_decimal(record.reschedule_fees),
            last_reschedule_reason: record.last_reschedule_reason,
            cancellation: record.cancellation.map(|cancellation| cancellation.0),
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

/// PostgreSQL booking store.
///
/// Slot exclusivity rests on the partial unique index over `(service_id, start_at)` for
/// held and confirmed reservations. Multi-row changes run in one transaction with the
/// affected rows locked `for update`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_reservation(conn: &mut PgConnection, id: Uuid) -> Result<SlotReservation> {
        let record = sqlx::query_as::<_, ReservationRecord>(&format!(
            "select {} from slot_reservations where id = $1 for update",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        record
            .ok_or_else(|| Error::not_found("Reservation", id))?
            .try_into()
    }

    async fn lock_booking(conn: &mut PgConnection, id: Uuid) -> Result<Booking> {
        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "select {} from bookings where id = $1 for update",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(conn)
        .await?;

        record.ok_or_else(|| Error::not_found("Booking", id))?.try_into()
    }

    async fn set_reservation_status(
        conn: &mut PgConnection,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<()> {
        sqlx::query("update slot_reservations set status = $2 where id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(conn)
            .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BookingStore for PgStore {
    #[tracing::instrument(name = "Fetch service offering", skip(self))]
    async fn fetch_service(&self, id: &str) -> Result<Option<ServiceOffering>> {
        let record = sqlx::query_as::<_, ServiceRecord>(&format!(
            "select {} from service_offerings where id = $1",
            SERVICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(ServiceOffering::try_from).transpose()
    }

    #[tracing::instrument(name = "List active service offerings", skip(self))]
    async fn list_services(&self) -> Result<Vec<ServiceOffering>> {
        let records = sqlx::query_as::<_, ServiceRecord>(&format!(
            "select {} from service_offerings where active order by name",
            SERVICE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(ServiceOffering::try_from).collect()
    }

    #[tracing::instrument(name = "Fetch promo code", skip(self))]
    async fn fetch_promo_code(&self, code: &DiscountCode) -> Result<Option<PromoCode>> {
        let record = sqlx::query_as::<_, PromoRecord>(&format!(
            "select {} from promo_codes where code = $1",
            PROMO_COLUMNS
        ))
        .bind(code.as_ref())
        .fetch_optional(&self.pool)
        .await?;

        record.map(PromoCode::try_from).transpose()
    }

    #[tracing::instrument(
        name = "Insert slot hold",
        skip(self, hold),
        fields(service_id = %hold.service_id, start_at = %hold.start_at)
    )]
    async fn insert_hold(&self, hold: NewHold, now: DateTime<Utc>) -> Result<SlotReservation> {
        let mut tx = self.pool.begin().await?;

        // Lapsed holds must not trip the unique index
        sqlx::query(
            "update slot_reservations set status = 'expired' \
             where service_id = $1 and start_at = $2 and status = 'held' and expires_at <= $3",
        )
        .bind(&hold.service_id)
        .bind(hold.start_at)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let record = sqlx::query_as::<_, ReservationRecord>(&format!(
            "insert into slot_reservations({columns}) \
             values ($1, $2, $3, $4, $5, $6, 'held', $7, $8, $9) \
             on conflict (service_id, start_at) where status in ('held', 'confirmed') do nothing \
             returning {columns}",
            columns = RESERVATION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&hold.service_id)
        .bind(hold.start_at)
        .bind(hold.holder_id.as_ref())
        .bind(now)
        .bind(hold.expires_at)
        .bind(Json(&hold.pricing))
        .bind(hold.customer.as_ref().map(Json))
        .bind(hold.location.as_deref())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(record) = record else {
            return Err(Error::SlotConflict(
                "The requested time slot is no longer available".into(),
            ));
        };
        tx.commit().await?;

        record.try_into()
    }

    #[tracing::instrument(name = "Fetch reservation", skip(self))]
    async fn fetch_reservation(&self, id: Uuid) -> Result<Option<SlotReservation>> {
        let record = sqlx::query_as::<_, ReservationRecord>(&format!(
            "select {} from slot_reservations where id = $1",
            RESERVATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(SlotReservation::try_from).transpose()
    }

    #[tracing::instrument(name = "Release hold", skip(self))]
    async fn release_hold(&self, id: Uuid, now: DateTime<Utc>) -> Result<SlotReservation> {
        let mut tx = self.pool.begin().await?;

        let mut reservation = Self::lock_reservation(&mut tx, id).await?;
        ensure_held(&reservation, now)?;
        Self::set_reservation_status(&mut tx, id, ReservationStatus::Released).await?;
        tx.commit().await?;

        reservation.status = ReservationStatus::Released;
        Ok(reservation)
    }

    #[tracing::instrument(name = "Confirm hold", skip(self))]
    async fn confirm_hold(&self, id: Uuid, now: DateTime<Utc>) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;

        let reservation = Self::lock_reservation(&mut tx, id).await?;
        ensure_held(&reservation, now)?;

        if let Some(code) = &reservation.pricing.promo_code {
            let promo = sqlx::query_as::<_, PromoRecord>(&format!(
                "select {} from promo_codes where code = $1 for update",
                PROMO_COLUMNS
            ))
            .bind(code.as_ref())
            .fetch_optional(&mut *tx)
            .await?
            .map(PromoCode::try_from)
            .transpose()?;
            ensure_redeemable(code, promo.as_ref(), now)?;

            sqlx::query("update promo_codes set used_count = used_count + 1 where code = $1")
                .bind(code.as_ref())
                .execute(&mut *tx)
                .await?;
        }

        Self::set_reservation_status(&mut tx, id, ReservationStatus::Confirmed).await?;

        let booking = Booking::from_hold(&reservation, now);
        sqlx::query(&format!(
            "insert into bookings({}) \
             values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.reservation_id)
        .bind(&booking.service_id)
        .bind(booking.scheduled_at)
        .bind(booking.status.as_str())
        .bind(Json(&booking.pricing))
        .bind(booking.customer.as_ref().map(Json))
        .bind(booking.location.as_deref())
        .bind(booking.reschedule_count)
        .bind(booking.reschedule_fees.amount())
        .bind(booking.last_reschedule_reason.as_deref())
        .bind(booking.cancellation.as_ref().map(Json))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }

    #[tracing::instrument(name = "Fetch booking", skip(self))]
    async fn fetch_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "select {} from bookings where id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(Booking::try_from).transpose()
    }

    #[tracing::instrument(name = "Cancel booking", skip(self, cancellation))]
    async fn cancel_booking(
        &self,
        id: Uuid,
        expected_scheduled_at: DateTime<Utc>,
        cancellation: Cancellation,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;

        let booking = Self::lock_booking(&mut tx, id).await?;
        ensure_movable(&booking, expected_scheduled_at)?;

        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "update bookings set status = $2, cancellation = $3, updated_at = $4 \
             where id = $1 returning {}",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(BookingStatus::Cancelled.as_str())
        .bind(Json(&cancellation))
        .bind(cancellation.cancelled_at)
        .fetch_one(&mut *tx)
        .await?;

        Self::set_reservation_status(&mut tx, booking.reservation_id, ReservationStatus::Released).await?;
        tx.commit().await?;

        record.try_into()
    }

    #[tracing::instrument(name = "Reschedule booking", skip(self))]
    async fn reschedule_booking(
        &self,
        request: RescheduleRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let mut tx = self.pool.begin().await?;

        let booking = Self::lock_booking(&mut tx, request.booking_id).await?;
        ensure_movable(&booking, request.expected_scheduled_at)?;

        let new_reservation = Self::lock_reservation(&mut tx, request.new_reservation_id).await?;
        ensure_held(&new_reservation, now)?;

        Self::set_reservation_status(&mut tx, new_reservation.id, ReservationStatus::Confirmed).await?;
        Self::set_reservation_status(&mut tx, booking.reservation_id, ReservationStatus::Released).await?;

        let record = sqlx::query_as::<_, BookingRecord>(&format!(
            "update bookings set scheduled_at = $2, reservation_id = $3, status = $4, \
             reschedule_count = reschedule_count + 1, reschedule_fees = reschedule_fees + $5, \
             last_reschedule_reason = $6, updated_at = $7 where id = $1 returning {}",
            BOOKING_COLUMNS
        ))
        .bind(request.booking_id)
        .bind(new_reservation.start_at)
        .bind(new_reservation.id)
        .bind(BookingStatus::Rescheduled.as_str())
        .bind(request.fee.amount())
        .bind(request.reason.as_deref())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        record.try_into()
    }

    #[tracing::instrument(name = "Expire stale holds", skip(self))]
    async fn expire_stale_holds(&self, now: DateTime<Utc>) -> Result<u64> {
        let expired = sqlx::query(
            "update slot_reservations set status = 'expired' \
             where status = 'held' and expires_at <= $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(expired)
    }
}
