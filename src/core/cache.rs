//! Memoizes expensive clients (database pools, model clients) keyed by
//! the configuration that built them.
//!
//! Each configuration gets its own slot guarded by an async mutex so
//! that concurrent callers asking for the same configuration wait on a
//! single construction instead of racing to build duplicates. Failed
//! constructions are never cached.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use super::error::SessionError;
use super::gate::Configuration;

struct Entry<R> {
    resource: Arc<R>,
    created_at: Instant,
}

type Slot<R> = Arc<tokio::sync::Mutex<Option<Entry<R>>>>;

pub struct ResourceCache<R> {
    ttl: Duration,
    slots: Mutex<HashMap<Configuration, Slot<R>>>,
}

impl<R> ResourceCache<R> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn slot(&self, config: &Configuration) -> Slot<R> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .entry(config.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(None)))
            .clone()
    }

    /// Whether `slot` is still the one registered for `config`. A slot
    /// removed while a caller waited on it must not be filled.
    fn is_current(&self, config: &Configuration, slot: &Slot<R>) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(config).is_some_and(|s| Arc::ptr_eq(s, slot))
    }

    fn remove_slot(&self, config: &Configuration, slot: &Slot<R>) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.get(config).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(config);
        }
    }

    /// Drops expired resources and slots left empty. Slots that are
    /// locked are in use and left alone.
    fn purge(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry
                .as_ref()
                .is_some_and(|e| e.created_at.elapsed() < self.ttl),
            Err(_) => true,
        });
    }

    /// Returns the cached resource for `config` or builds a new one
    /// with `factory` when there is none or it's older than the TTL.
    pub async fn get_or_create<F, Fut>(
        &self,
        config: &Configuration,
        factory: F,
    ) -> Result<Arc<R>, SessionError>
    where
        F: FnOnce(Configuration) -> Fut,
        Fut: Future<Output = anyhow::Result<R>>,
    {
        self.purge();

        let (slot, mut entry) = loop {
            let slot = self.slot(config);
            // Holding the slot lock across the factory call is what
            // guarantees a single construction per configuration
            let entry = slot.clone().lock_owned().await;
            if self.is_current(config, &slot) {
                break (slot, entry);
            }
        };

        if let Some(existing) = entry.as_ref() {
            if existing.created_at.elapsed() < self.ttl {
                tracing::debug!("Resource cache hit for {:?}", config.field_names());
                return Ok(Arc::clone(&existing.resource));
            }
            tracing::debug!("Resource expired for {:?}", config.field_names());
            *entry = None;
        }

        tracing::info!("Building resource for {:?}", config.field_names());
        match factory(config.clone()).await {
            Ok(resource) => {
                let resource = Arc::new(resource);
                *entry = Some(Entry {
                    resource: Arc::clone(&resource),
                    created_at: Instant::now(),
                });
                Ok(resource)
            }
            Err(e) => {
                tracing::warn!("Resource construction failed: {:#}", e);
                // Waiters on this slot see it's gone and start over
                self.remove_slot(config, &slot);
                Err(SessionError::construction(e))
            }
        }
    }

    /// Drops the resource built for `config`, if any. The next
    /// `get_or_create` rebuilds it.
    pub fn invalidate(&self, config: &Configuration) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.remove(config);
    }

    pub fn clear(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.clear();
    }

    /// Number of unexpired resources. Slots that are mid-construction
    /// are skipped.
    pub fn len(&self) -> usize {
        self.purge();
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .map(|entry| entry.is_some())
                    .unwrap_or(false)
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
