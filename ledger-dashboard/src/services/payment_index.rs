//! Per-floor lookup from `(order id, billing mode)` to the payment record.
//!
//! The index is built from one large page of the floor's payments and
//! filtered locally. It is a snapshot: after anything that can change
//! payment state it is rebuilt whole, never patched.

use crate::models::{BillingMode, Floor, OrderId, Payment, PaymentKey};
use crate::services::backend::LedgerBackend;
use crate::services::metrics;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexStatus {
    /// Never built for this floor yet.
    Unloaded,
    Loaded,
    /// The payment fetch failed; the index is loaded but empty.
    Unavailable { reason: String },
}

/// Result of resolving a key against the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    NotLoaded,
    Found(&'a Payment),
    /// No record for the key. `payments_unavailable` is set when the index is
    /// empty because the fetch failed rather than because nothing is due.
    NotFound { payments_unavailable: bool },
}

#[derive(Debug, Clone)]
pub struct PaymentIndex {
    floor: Floor,
    status: IndexStatus,
    entries: HashMap<PaymentKey, Payment>,
    built_at: Option<DateTime<Utc>>,
    truncated: bool,
}

impl PaymentIndex {
    pub fn unloaded(floor: Floor) -> Self {
        Self {
            floor,
            status: IndexStatus::Unloaded,
            entries: HashMap::new(),
            built_at: None,
            truncated: false,
        }
    }

    /// Index a list of payments. On duplicate keys the first record wins.
    pub fn from_payments(floor: Floor, payments: impl IntoIterator<Item = Payment>) -> Self {
        let mut entries = HashMap::new();

        for payment in payments {
            match entries.entry(payment.key()) {
                Entry::Vacant(slot) => {
                    slot.insert(payment);
                }
                Entry::Occupied(existing) => {
                    tracing::warn!(
                        floor = %floor,
                        order_id = payment.order_id,
                        mode = %payment.mode(),
                        kept_payment_id = existing.get().id,
                        dropped_payment_id = payment.id,
                        "Duplicate payment for order and mode, keeping the first"
                    );
                }
            }
        }

        Self {
            floor,
            status: IndexStatus::Loaded,
            entries,
            built_at: Some(Utc::now()),
            truncated: false,
        }
    }

    /// An index that is loaded but empty because payments could not be fetched.
    pub fn unavailable(floor: Floor, reason: impl Into<String>) -> Self {
        Self {
            floor,
            status: IndexStatus::Unavailable {
                reason: reason.into(),
            },
            entries: HashMap::new(),
            built_at: Some(Utc::now()),
            truncated: false,
        }
    }

    /// Fetch the floor's payments and index them. Never fails: a fetch error
    /// yields an [`IndexStatus::Unavailable`] index.
    pub async fn build(backend: &dyn LedgerBackend, floor: Floor, page_size: u32) -> Self {
        match backend.get_payment_list(floor, page_size).await {
            Ok(page) => {
                let truncated = page.is_truncated();
                if truncated {
                    tracing::warn!(
                        floor = %floor,
                        page_size,
                        total_elements = page.total_elements,
                        "Payment registry holds more records than one page; index is partial"
                    );
                }

                let mut index = Self::from_payments(floor, page.content);
                index.truncated = truncated;

                tracing::info!(floor = %floor, entries = index.len(), "Payment index built");
                metrics::record_index_rebuild(floor, "loaded", index.len());
                index
            }
            Err(e) => {
                tracing::error!(floor = %floor, error = %e, "Failed to fetch payments for index");
                metrics::record_index_rebuild(floor, "unavailable", 0);
                Self::unavailable(floor, e.user_message())
            }
        }
    }

    pub fn floor(&self) -> Floor {
        self.floor
    }

    pub fn status(&self) -> &IndexStatus {
        &self.status
    }

    /// True once a build has completed, successfully or not.
    pub fn is_loaded(&self) -> bool {
        !matches!(self.status, IndexStatus::Unloaded)
    }

    pub fn load_error(&self) -> Option<&str> {
        match &self.status {
            IndexStatus::Unavailable { reason } => Some(reason),
            _ => None,
        }
    }

    pub fn get(&self, order_id: OrderId, mode: BillingMode) -> Option<&Payment> {
        self.entries.get(&PaymentKey::new(order_id, mode))
    }

    pub fn lookup(&self, order_id: OrderId, mode: BillingMode) -> Lookup<'_> {
        if !self.is_loaded() {
            return Lookup::NotLoaded;
        }
        match self.get(order_id, mode) {
            Some(payment) => Lookup::Found(payment),
            None => Lookup::NotFound {
                payments_unavailable: self.load_error().is_some(),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether two indexes map the same keys to the same records.
    pub fn same_entries(&self, other: &PaymentIndex) -> bool {
        self.entries == other.entries
    }

    pub fn summary(&self) -> IndexSummary {
        IndexSummary {
            floor: self.floor,
            status: self.status.clone(),
            entries: self.len(),
            truncated: self.truncated,
            built_at: self.built_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub floor: Floor,
    pub status: IndexStatus,
    pub entries: usize,
    pub truncated: bool,
    pub built_at: Option<DateTime<Utc>>,
}

/// Latest published index for a floor and the generation that built it.
struct Published {
    generation: u64,
    index: Arc<PaymentIndex>,
}

struct FloorSlot {
    /// Last generation handed out to a rebuild.
    requested: AtomicU64,
    published: RwLock<Published>,
    first_build: OnceCell<()>,
}

impl FloorSlot {
    fn new(floor: Floor) -> Self {
        Self {
            requested: AtomicU64::new(0),
            published: RwLock::new(Published {
                generation: 0,
                index: Arc::new(PaymentIndex::unloaded(floor)),
            }),
            first_build: OnceCell::new(),
        }
    }
}

/// One payment index per floor.
///
/// Rebuilds construct a fresh index without holding the lock and then swap
/// it in, so a reader sees either the old or the new map in full. Each
/// rebuild takes a generation before it fetches; a result is published only
/// if no later-started rebuild has already been published.
pub struct PaymentIndexes {
    backend: Arc<dyn LedgerBackend>,
    page_size: u32,
    floors: HashMap<Floor, FloorSlot>,
}

impl PaymentIndexes {
    pub fn new(backend: Arc<dyn LedgerBackend>, page_size: u32) -> Self {
        let floors = Floor::ALL
            .into_iter()
            .map(|floor| (floor, FloorSlot::new(floor)))
            .collect();

        Self {
            backend,
            page_size,
            floors,
        }
    }

    fn slot(&self, floor: Floor) -> &FloorSlot {
        // Every floor is seeded in `new`.
        &self.floors[&floor]
    }

    /// Current snapshot for a floor.
    pub async fn snapshot(&self, floor: Floor) -> Arc<PaymentIndex> {
        self.slot(floor).published.read().await.index.clone()
    }

    /// Rebuild a floor's index and publish it.
    ///
    /// Returns the index that is current afterwards. When a rebuild that
    /// started later has already been published, this result is dropped and
    /// the newer index is returned instead.
    pub async fn rebuild(&self, floor: Floor) -> Arc<PaymentIndex> {
        let slot = self.slot(floor);
        let generation = slot.requested.fetch_add(1, Ordering::SeqCst) + 1;

        let fresh = Arc::new(PaymentIndex::build(self.backend.as_ref(), floor, self.page_size).await);

        let mut published = slot.published.write().await;
        if generation < published.generation {
            tracing::debug!(
                floor = %floor,
                generation,
                published = published.generation,
                "Discarding payment index from an older rebuild"
            );
            metrics::record_index_rebuild(floor, "stale", published.index.len());
            return published.index.clone();
        }

        *published = Published {
            generation,
            index: fresh.clone(),
        };
        fresh
    }

    /// Rebuild on a separate task, so the rebuild completes even if the
    /// caller stops waiting for it.
    pub fn spawn_rebuild(self: &Arc<Self>, floor: Floor) -> JoinHandle<Arc<PaymentIndex>> {
        let indexes = Arc::clone(self);
        tokio::spawn(async move { indexes.rebuild(floor).await })
    }

    /// Build the index the first time a floor is used.
    ///
    /// Concurrent first callers share a single build.
    pub async fn ensure_loaded(&self, floor: Floor) -> Arc<PaymentIndex> {
        let current = self.snapshot(floor).await;
        if current.is_loaded() {
            return current;
        }

        self.slot(floor)
            .first_build
            .get_or_init(|| async move {
                self.rebuild(floor).await;
            })
            .await;
        self.snapshot(floor).await
    }
}
