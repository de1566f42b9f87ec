use std::collections::{HashSet, VecDeque};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;

use tokio_util::sync::CancellationToken;

use uuid::Uuid;

use crate::client::{ContactUpdate, CrmClient, Email, EmailClient, EmailError, MessageStream};
use crate::domain::{Booking, EmailAddress, Money};

/// Side effects of the booking flow, delivered after the booking has been stored
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    BookingConfirmed(Booking),
    BookingCancelled(Booking),
    BookingRescheduled { booking: Booking, fee: Money },
    /// A payment did not match the amount due on a hold
    ReconciliationRequired {
        reservation_id: Uuid,
        expected: Money,
        charged: Money,
    },
}

impl Notification {
    /// Stable across redeliveries of the same event
    pub fn idempotency_key(&self) -> String {
        match self {
            Self::BookingConfirmed(booking) => format!("booking-confirmed:{}", booking.id),
            Self::BookingCancelled(booking) => format!("booking-cancelled:{}", booking.id),
            Self::BookingRescheduled { booking, .. } => format!(
                "booking-rescheduled:{}:{}",
                booking.id, booking.reschedule_count
            ),
            Self::ReconciliationRequired {
                reservation_id,
                charged,
                ..
            } => format!("reconciliation:{}:{}", reservation_id, charged.amount()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::BookingConfirmed(_) => "booking_confirmed",
            Self::BookingCancelled(_) => "booking_cancelled",
            Self::BookingRescheduled { .. } => "booking_rescheduled",
            Self::ReconciliationRequired { .. } => "reconciliation_required",
        }
    }

    /// Label shared by the email tag and the CRM contact tag
    fn tag(&self) -> String {
        self.name().replace('_', "-")
    }

    fn booking(&self) -> Option<&Booking> {
        match self {
            Self::BookingConfirmed(booking)
            | Self::BookingCancelled(booking)
            | Self::BookingRescheduled { booking, .. } => Some(booking),
            Self::ReconciliationRequired { .. } => None,
        }
    }

    /// The email for this event, if anyone should get one
    pub fn email(&self, operator: &EmailAddress) -> Option<Email> {
        if let Self::ReconciliationRequired {
            reservation_id,
            expected,
            charged,
        } = self
        {
            let text_body = format!(
                "Reservation {} was charged {} but {} was due. The hold was left unconfirmed.",
                reservation_id, charged, expected
            );
            return Some(Email {
                recipient: operator.clone(),
                subject: "Payment mismatch needs review".into(),
                html_body: format!("<p>{}</p>", text_body),
                text_body,
                tag: self.tag(),
                stream: MessageStream::Operator,
                idempotency_key: self.idempotency_key(),
            });
        }

        let booking = self.booking()?;
        let customer = booking.customer.as_ref()?;
        let when = booking.scheduled_at.format("%A %B %-d, %Y at %H:%M UTC");

        let (subject, text_body) = match self {
            Self::BookingConfirmed(_) => (
                "Your notary appointment is confirmed",
                format!(
                    "Hi {}, your appointment is booked for {}. Amount due: {}.",
                    customer.name, when, booking.pricing.total_due
                ),
            ),
            Self::BookingCancelled(_) => {
                let refund = booking
                    .cancellation
                    .as_ref()
                    .map_or(Money::ZERO, |cancellation| cancellation.refund_amount);
                (
                    "Your notary appointment was cancelled",
                    format!(
                        "Hi {}, your appointment for {} is cancelled. Refund: {}.",
                        customer.name, when, refund
                    ),
                )
            }
            Self::BookingRescheduled { fee, .. } => (
                "Your notary appointment was moved",
                format!(
                    "Hi {}, your appointment is now on {}. Reschedule fee: {}.",
                    customer.name, when, fee
                ),
            ),
            Self::ReconciliationRequired { .. } => return None,
        };

        Some(Email {
            recipient: customer.email.clone(),
            subject: subject.into(),
            html_body: format!("<p>{}</p>", text_body),
            text_body,
            tag: self.tag(),
            stream: MessageStream::Customer,
            idempotency_key: self.idempotency_key(),
        })
    }

    /// The CRM change for this event, if it concerns a known customer
    pub fn contact_update(&self) -> Option<ContactUpdate> {
        let booking = self.booking()?;
        let customer = booking.customer.as_ref()?;

        Some(ContactUpdate {
            email: customer.email.as_ref().to_string(),
            name: Some(customer.name.as_ref().to_string()),
            phone: customer.phone.clone(),
            tags: vec![self.tag(), booking.service_id.clone()],
        })
    }
}

/// Producer half of the notification channel.
///
/// Enqueueing never blocks and never fails the caller; if the worker is gone the
/// notification is logged and dropped.
#[derive(Debug, Clone)]
pub struct NotificationQueue(mpsc::UnboundedSender<Notification>);

impl NotificationQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self(sender), receiver)
    }

    pub fn enqueue(&self, notification: Notification) {
        let name = notification.name();
        if self.0.send(notification).is_err() {
            tracing::warn!(notification = name, "Notification worker has stopped, dropping");
        }
    }
}

/// How hard to try before giving up on a delivery
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt`: base, 2x base, 4x base, ...
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// How many delivery keys the worker remembers for dedupe
const RECENT_KEYS: usize = 10_000;

/// Insertion-ordered set that forgets its oldest keys beyond `capacity`
#[derive(Debug)]
struct RecentKeys {
    capacity: usize,
    order: VecDeque<String>,
    keys: HashSet<String>,
}

impl RecentKeys {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            keys: HashSet::new(),
        }
    }

    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn insert(&mut self, key: String) {
        if !self.keys.insert(key.clone()) {
            return;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Delivery failures that no retry will fix
trait DeliveryError: Display {
    fn is_permanent(&self) -> bool;
}

impl DeliveryError for EmailError {
    fn is_permanent(&self) -> bool {
        EmailError::is_permanent(self)
    }
}

impl DeliveryError for reqwest::Error {
    /// Client errors other than rate limiting mean the request itself is wrong
    fn is_permanent(&self) -> bool {
        self.status().map_or(false, |status| {
            status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS
        })
    }
}

/// Delivers queued notifications at least once, with retries
pub struct NotificationWorker {
    email_client: EmailClient,
    crm_client: CrmClient,
    operator_email: EmailAddress,
    retry: RetryPolicy,
    delivered: RecentKeys,
}

impl NotificationWorker {
    pub fn new(
        email_client: EmailClient,
        crm_client: CrmClient,
        operator_email: EmailAddress,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            email_client,
            crm_client,
            operator_email,
            retry,
            delivered: RecentKeys::new(RECENT_KEYS),
        }
    }

    /// Deliver until cancelled or the queue closes, then drain whatever is left
    pub async fn run(
        mut self,
        mut receiver: mpsc::UnboundedReceiver<Notification>,
        cancel: CancellationToken,
    ) {
        tracing::info!("Notification worker started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(notification) => self.deliver(notification).await,
                    None => break,
                },
            }
        }

        receiver.close();
        while let Ok(notification) = receiver.try_recv() {
            self.deliver(notification).await;
        }
        tracing::info!("Notification worker stopped");
    }

    #[tracing::instrument(
        name = "Deliver notification",
        skip(self, notification),
        fields(key = %notification.idempotency_key())
    )]
    async fn deliver(&mut self, notification: Notification) {
        let key = notification.idempotency_key();

        if let Some(email) = notification.email(&self.operator_email) {
            let email_key = format!("{}:email", key);
            let (client, email) = (&self.email_client, &email);
            if !self.delivered.contains(&email_key)
                && with_retries(self.retry, &email_key, move || client.send(email)).await
            {
                self.delivered.insert(email_key);
            }
        }

        if let Some(update) = notification.contact_update() {
            let crm_key = format!("{}:crm", key);
            let (client, update, idempotency_key) = (&self.crm_client, &update, crm_key.as_str());
            if !self.delivered.contains(&crm_key)
                && with_retries(self.retry, &crm_key, move || {
                    client.upsert_contact(update, idempotency_key)
                })
                .await
            {
                self.delivered.insert(crm_key);
            }
        }
    }
}

/// Run `attempt` until it succeeds, fails permanently or the policy is exhausted; true on success
async fn with_retries<F, Fut, E>(retry: RetryPolicy, key: &str, mut attempt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: DeliveryError,
{
    for n in 1..=retry.max_attempts.max(1) {
        match attempt().await {
            Ok(()) => return true,
            Err(e) if e.is_permanent() => {
                tracing::error!(key, attempt = n, error = %e, "Delivery rejected, not retrying");
                return false;
            }
            Err(e) if n < retry.max_attempts => {
                let delay = retry.delay_after(n);
                tracing::warn!(key, attempt = n, error = %e, ?delay, "Delivery failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(key, attempt = n, error = %e, "Delivery failed, giving up");
            }
        }
    }
    false
}
