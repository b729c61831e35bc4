//! In-process persistence adapter.
//!
//! One [`MemoryStore`] implements every repository port against plain maps
//! behind mutexes. It is the store used by tests, local development, and
//! single-node deployments; the port contracts (compare-and-set versions,
//! atomic postings, gap-free chat sequences) are enforced here exactly as a
//! database adapter would.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::booking::{Booking, GeoPoint};
use crate::domain::chat::{ChatMessage, MessageBody};
use crate::domain::ledger::{EntryKind, LedgerEntry, validate_balanced};
use crate::domain::money::{Currency, Money};
use crate::domain::notifications::NotificationRecord;
use crate::domain::otp::OtpRecord;
use crate::domain::ports::{
    BookingRepository, BookingRepositoryError, CategoryRepository, CategoryRepositoryError,
    ChatRepository, ChatRepositoryError, DeadLetter, LedgerRepository, LedgerRepositoryError,
    NewChatMessage, NotificationRepository, NotificationRepositoryError, OtpRepository,
    OtpRepositoryError, PromoRepository, PromoRepositoryError, TrackingRepository,
    TrackingRepositoryError, UserDirectory,
    UserDirectoryError, WebhookRepository, WebhookRepositoryError,
};
use crate::domain::pricing::CategoryRate;
use crate::domain::tracking::{RouteProgress, TrackingSample};

#[derive(Debug, Default)]
struct Inner {
    bookings: HashMap<Uuid, Booking>,
    ledger: Vec<LedgerEntry>,
    otps: HashMap<Uuid, OtpRecord>,
    chats: HashMap<Uuid, Vec<ChatMessage>>,
    progress: HashMap<Uuid, RouteProgress>,
    samples: HashMap<Uuid, Vec<TrackingSample>>,
    notifications: Vec<NotificationRecord>,
    rates: HashMap<Uuid, CategoryRate>,
    origins: HashMap<Uuid, GeoPoint>,
    promos: HashMap<String, u32>,
    emails: HashMap<Uuid, String>,
    servicers: HashMap<Uuid, Vec<Uuid>>,
    processed_webhooks: HashSet<String>,
    dead_letters: Vec<DeadLetter>,
}

/// Shared in-memory backing store implementing every repository port.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Seed a category tariff.
    pub fn set_rate(&self, category_id: Uuid, rate: CategoryRate) {
        self.lock().rates.insert(category_id, rate);
    }

    /// Seed the dispatch origin of a category's servicer pool.
    pub fn set_dispatch_origin(&self, category_id: Uuid, origin: GeoPoint) {
        self.lock().origins.insert(category_id, origin);
    }

    /// Seed a live promo code.
    pub fn set_promo(&self, code: impl Into<String>, discount_bps: u32) {
        self.lock().promos.insert(code.into(), discount_bps);
    }

    /// Seed a user's email address.
    pub fn set_email(&self, user_id: Uuid, email: impl Into<String>) {
        self.lock().emails.insert(user_id, email.into());
    }

    /// Register a servicer in a category.
    pub fn add_servicer(&self, category_id: Uuid, servicer_id: Uuid) {
        self.lock()
            .servicers
            .entry(category_id)
            .or_default()
            .push(servicer_id);
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn insert(&self, booking: &Booking) -> Result<(), BookingRepositoryError> {
        let mut inner = self.lock();
        if inner.bookings.contains_key(&booking.id) {
            return Err(BookingRepositoryError::query("booking id already exists"));
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update(
        &self,
        booking: &Booking,
        expected_version: u64,
    ) -> Result<(), BookingRepositoryError> {
        let mut inner = self.lock();
        let Some(stored) = inner.bookings.get(&booking.id) else {
            return Err(BookingRepositoryError::query("no such booking"));
        };
        if stored.version != expected_version {
            return Err(BookingRepositoryError::version_conflict(
                "stored booking is newer",
                stored.version,
            ));
        }
        inner.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, BookingRepositoryError> {
        Ok(self.lock().bookings.get(&id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingRepositoryError> {
        let mut found: Vec<Booking> = self
            .lock()
            .bookings
            .values()
            .filter(|booking| booking.is_participant(user_id))
            .cloned()
            .collect();
        found.sort_by_key(|booking| booking.created_at);
        Ok(found)
    }

    async fn list_open_in_category(
        &self,
        category_id: Uuid,
    ) -> Result<Vec<Booking>, BookingRepositoryError> {
        let mut found: Vec<Booking> = self
            .lock()
            .bookings
            .values()
            .filter(|booking| {
                booking.category_id == category_id
                    && booking.servicer_id.is_none()
                    && booking.state == crate::domain::booking::BookingState::Pending
            })
            .cloned()
            .collect();
        found.sort_by_key(|booking| booking.created_at);
        Ok(found)
    }
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn append(&self, entries: &[LedgerEntry]) -> Result<(), LedgerRepositoryError> {
        validate_balanced(entries)
            .map_err(|error| LedgerRepositoryError::unbalanced(error.message()))?;
        // Balance check and write happen under one lock so concurrent
        // payouts cannot both pass the check and overdraw the wallet.
        let mut inner = self.lock();
        for entry in entries
            .iter()
            .filter(|entry| entry.kind == EntryKind::PayoutDebit)
        {
            let stored: Money = inner
                .ledger
                .iter()
                .filter(|e| e.account_id == entry.account_id && e.currency == entry.currency)
                .map(|e| e.amount)
                .sum();
            let posted: Money = entries
                .iter()
                .filter(|e| e.account_id == entry.account_id && e.currency == entry.currency)
                .map(|e| e.amount)
                .sum();
            if stored + posted < Money::ZERO {
                return Err(LedgerRepositoryError::insufficient_balance(format!(
                    "payout would overdraw account {} to {}",
                    entry.account_id,
                    stored + posted
                )));
            }
        }
        inner.ledger.extend_from_slice(entries);
        Ok(())
    }

    async fn entries_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError> {
        Ok(self
            .lock()
            .ledger
            .iter()
            .filter(|entry| entry.booking_id == Some(booking_id))
            .cloned()
            .collect())
    }

    async fn entries_for_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<LedgerEntry>, LedgerRepositoryError> {
        Ok(self
            .lock()
            .ledger
            .iter()
            .filter(|entry| entry.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn balance(
        &self,
        account_id: Uuid,
        currency: &Currency,
    ) -> Result<Money, LedgerRepositoryError> {
        Ok(self
            .lock()
            .ledger
            .iter()
            .filter(|entry| entry.account_id == account_id && &entry.currency == currency)
            .map(|entry| entry.amount)
            .sum())
    }
}

#[async_trait]
impl OtpRepository for MemoryStore {
    async fn upsert(&self, record: &OtpRecord) -> Result<(), OtpRepositoryError> {
        self.lock().otps.insert(record.booking_id, record.clone());
        Ok(())
    }

    async fn find_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<OtpRecord>, OtpRepositoryError> {
        Ok(self.lock().otps.get(&booking_id).cloned())
    }
}

#[async_trait]
impl ChatRepository for MemoryStore {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, ChatRepositoryError> {
        let mut inner = self.lock();
        let log = inner.chats.entry(message.booking_id).or_default();
        let seq = log.last().map_or(1, |last| last.seq + 1);
        let stored = ChatMessage {
            id: Uuid::new_v4(),
            booking_id: message.booking_id,
            sender_id: message.sender_id,
            seq,
            body: message.body,
            sent_at: message.sent_at,
            delivered_at: None,
            read_at: None,
        };
        log.push(stored.clone());
        Ok(stored)
    }

    async fn list_after(
        &self,
        booking_id: Uuid,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatRepositoryError> {
        Ok(self
            .lock()
            .chats
            .get(&booking_id)
            .map(|log| {
                log.iter()
                    .filter(|message| message.seq > after_seq)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn mark_read_up_to(
        &self,
        booking_id: Uuid,
        reader_id: Uuid,
        seq: u64,
        now: DateTime<Utc>,
    ) -> Result<(), ChatRepositoryError> {
        let mut inner = self.lock();
        if let Some(log) = inner.chats.get_mut(&booking_id) {
            for message in log
                .iter_mut()
                .filter(|message| message.seq <= seq && message.sender_id != reader_id)
            {
                message.mark_read(now);
            }
        }
        Ok(())
    }

    async fn tombstone_booking(&self, booking_id: Uuid) -> Result<u64, ChatRepositoryError> {
        let mut swept = 0;
        let mut inner = self.lock();
        if let Some(log) = inner.chats.get_mut(&booking_id) {
            for message in log
                .iter_mut()
                .filter(|message| message.body != MessageBody::Tombstone)
            {
                message.tombstone();
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn tombstone_message(
        &self,
        booking_id: Uuid,
        seq: u64,
    ) -> Result<bool, ChatRepositoryError> {
        let mut inner = self.lock();
        let Some(message) = inner
            .chats
            .get_mut(&booking_id)
            .and_then(|log| log.iter_mut().find(|message| message.seq == seq))
        else {
            return Ok(false);
        };
        message.tombstone();
        Ok(true)
    }
}

#[async_trait]
impl TrackingRepository for MemoryStore {
    async fn load_progress(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<RouteProgress>, TrackingRepositoryError> {
        Ok(self.lock().progress.get(&booking_id).cloned())
    }

    async fn save_progress(
        &self,
        booking_id: Uuid,
        progress: &RouteProgress,
    ) -> Result<(), TrackingRepositoryError> {
        self.lock().progress.insert(booking_id, progress.clone());
        Ok(())
    }

    async fn record_sample(&self, sample: &TrackingSample) -> Result<(), TrackingRepositoryError> {
        self.lock()
            .samples
            .entry(sample.booking_id)
            .or_default()
            .push(sample.clone());
        Ok(())
    }

    async fn latest_sample(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<TrackingSample>, TrackingRepositoryError> {
        Ok(self
            .lock()
            .samples
            .get(&booking_id)
            .and_then(|samples| samples.last().cloned()))
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn append(
        &self,
        records: &[NotificationRecord],
    ) -> Result<(), NotificationRepositoryError> {
        self.lock().notifications.extend_from_slice(records);
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationRecord>, NotificationRepositoryError> {
        let mut found: Vec<NotificationRecord> = self
            .lock()
            .notifications
            .iter()
            .filter(|record| record.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit);
        Ok(found)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<bool, NotificationRepositoryError> {
        let mut inner = self.lock();
        match inner
            .notifications
            .iter_mut()
            .find(|record| record.id == id && record.user_id == user_id)
        {
            Some(record) => {
                record.mark_read(now);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn rate_of(
        &self,
        category_id: Uuid,
    ) -> Result<Option<CategoryRate>, CategoryRepositoryError> {
        Ok(self.lock().rates.get(&category_id).cloned())
    }

    async fn dispatch_origin(
        &self,
        category_id: Uuid,
    ) -> Result<Option<GeoPoint>, CategoryRepositoryError> {
        Ok(self.lock().origins.get(&category_id).copied())
    }
}

#[async_trait]
impl PromoRepository for MemoryStore {
    async fn discount_of(&self, code: &str) -> Result<Option<u32>, PromoRepositoryError> {
        Ok(self.lock().promos.get(code).copied())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn email_of(&self, user_id: Uuid) -> Result<Option<String>, UserDirectoryError> {
        Ok(self.lock().emails.get(&user_id).cloned())
    }

    async fn servicers_in_category(
        &self,
        category_id: Uuid,
    ) -> Result<Vec<Uuid>, UserDirectoryError> {
        Ok(self
            .lock()
            .servicers
            .get(&category_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl WebhookRepository for MemoryStore {
    async fn mark_processed(&self, event_id: &str) -> Result<bool, WebhookRepositoryError> {
        Ok(self.lock().processed_webhooks.insert(event_id.to_owned()))
    }

    async fn push_dead_letter(&self, letter: &DeadLetter) -> Result<(), WebhookRepositoryError> {
        self.lock().dead_letters.push(letter.clone());
        Ok(())
    }

    async fn list_dead_letters(&self) -> Result<Vec<DeadLetter>, WebhookRepositoryError> {
        Ok(self.lock().dead_letters.clone())
    }
}
