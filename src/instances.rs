//! Mirror pool and remembered preferred instance
//!
//! Each feed family shares the configured mirror pool but remembers its own
//! last-known-good base address, persisted under
//! `preferred_instance_{family}` so it survives restarts.

use std::sync::Arc;

use crate::cache::KeyValueStore;

/// Ordered candidate pool plus per-family preferred address
#[derive(Clone)]
pub struct InstanceDirectory {
    pool: Vec<String>,
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for InstanceDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceDirectory")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl InstanceDirectory {
    pub fn new(pool: Vec<String>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { pool, store }
    }

    /// The configured pool, in order
    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    fn key(family: &str) -> String {
        format!("preferred_instance_{}", family)
    }

    /// Last base address that worked for `family`, if one was recorded
    pub async fn preferred(&self, family: &str) -> Option<String> {
        match self.store.get(&Self::key(family)).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                log::debug!("could not read preferred instance for {}: {}", family, e);
                None
            }
        }
    }

    /// Records `base` as the preferred address for `family`
    pub async fn set_preferred(&self, family: &str, base: &str) {
        if let Err(e) = self.store.set(&Self::key(family), base.to_string()).await {
            log::warn!("could not persist preferred instance for {}: {}", family, e);
        }
    }

    /// Candidates in the order they should be attempted
    ///
    /// The preferred address comes first when it is still part of the pool,
    /// followed by the rest of the pool in configured order.
    pub async fn attempt_order(&self, family: &str) -> Vec<String> {
        let preferred = self
            .preferred(family)
            .await
            .filter(|p| self.pool.contains(p));

        let mut order = Vec::with_capacity(self.pool.len());
        if let Some(p) = &preferred {
            order.push(p.clone());
        }
        order.extend(
            self.pool
                .iter()
                .filter(|base| Some(*base) != preferred.as_ref())
                .cloned(),
        );
        order
    }
}
