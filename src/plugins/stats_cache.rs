//! Read-through cache for per-item statistics.
//!
//! One persisted row per (owner class, item) holds a JSON object mapping cache
//! keys to computed values. Each [`StatisticsCache`] keeps its own in-memory
//! mirror keyed by item id, so two items of the same class never share state.

use crate::core::error::SolvestatError;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct CacheMirror {
    contents: Map<String, JsonValue>,
    cached_at: i64,
}

#[derive(Debug)]
pub struct StatisticsCache {
    owner_class: String,
    ttl_secs: i64,
    mirrors: HashMap<i64, CacheMirror>,
}

impl StatisticsCache {
    pub fn new(owner_class: &str, ttl_secs: i64) -> Self {
        Self {
            owner_class: owner_class.to_string(),
            ttl_secs,
            mirrors: HashMap::new(),
        }
    }

    fn is_fresh(&self, cached_at: i64, now: i64) -> bool {
        cached_at > now - self.ttl_secs
    }

    /// Ensure the mirror for `item_id` reflects a fresh persisted row, if any.
    /// Stale rows are deleted.
    fn load(&mut self, conn: &Connection, item_id: i64, now: i64) -> Result<(), SolvestatError> {
        if let Some(m) = self.mirrors.get(&item_id) {
            if self.is_fresh(m.cached_at, now) {
                return Ok(());
            }
            self.mirrors.remove(&item_id);
        }

        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT cache_contents, cache_added FROM item_statistics_cache
                 WHERE cache_class = ?1 AND cache_item_id = ?2",
                params![self.owner_class, item_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((raw, cached_at)) = row else {
            return Ok(());
        };

        if !self.is_fresh(cached_at, now) {
            tracing::debug!(item_id, cached_at, "evicting stale statistics cache row");
            self.delete_row(conn, item_id)?;
            return Ok(());
        }

        match serde_json::from_str::<JsonValue>(&raw) {
            Ok(JsonValue::Object(contents)) => {
                self.mirrors
                    .insert(item_id, CacheMirror { contents, cached_at });
            }
            _ => {
                tracing::warn!(item_id, "discarding unreadable statistics cache row");
                self.delete_row(conn, item_id)?;
            }
        }
        Ok(())
    }

    /// Cached value for `key`, or `None` on a miss. A value that no longer
    /// decodes as `T` counts as a miss.
    pub fn get<T: DeserializeOwned>(
        &mut self,
        conn: &Connection,
        item_id: i64,
        key: &str,
        now: i64,
    ) -> Result<Option<T>, SolvestatError> {
        self.load(conn, item_id, now)?;
        let Some(value) = self.mirrors.get(&item_id).and_then(|m| m.contents.get(key)) else {
            tracing::debug!(item_id, key, "statistics cache miss");
            return Ok(None);
        };
        match serde_json::from_value(value.clone()) {
            Ok(v) => {
                tracing::debug!(item_id, key, "statistics cache hit");
                Ok(Some(v))
            }
            Err(e) => {
                tracing::warn!(item_id, key, error = %e, "cached statistics value has wrong shape");
                Ok(None)
            }
        }
    }

    /// Store `value` under `key` and persist every key known for the item.
    pub fn put<T: Serialize>(
        &mut self,
        conn: &Connection,
        item_id: i64,
        key: &str,
        value: &T,
        now: i64,
    ) -> Result<(), SolvestatError> {
        self.load(conn, item_id, now)?;
        let value = serde_json::to_value(value)?;
        let mirror = self.mirrors.entry(item_id).or_insert_with(|| CacheMirror {
            contents: Map::new(),
            cached_at: now,
        });
        mirror.contents.insert(key.to_string(), value);
        mirror.cached_at = now;

        let blob = serde_json::to_string(&mirror.contents)?;
        conn.execute(
            "INSERT INTO item_statistics_cache(cache_class, cache_item_id, cache_contents, cache_added)
             VALUES(?1, ?2, ?3, ?4)
             ON CONFLICT(cache_class, cache_item_id)
             DO UPDATE SET cache_contents = excluded.cache_contents, cache_added = excluded.cache_added",
            params![self.owner_class, item_id, blob, now],
        )?;
        Ok(())
    }

    /// Drop the persisted row and this instance's mirror for one item.
    pub fn clear(&mut self, conn: &Connection, item_id: i64) -> Result<(), SolvestatError> {
        self.mirrors.remove(&item_id);
        self.delete_row(conn, item_id)
    }

    fn delete_row(&self, conn: &Connection, item_id: i64) -> Result<(), SolvestatError> {
        conn.execute(
            "DELETE FROM item_statistics_cache WHERE cache_class = ?1 AND cache_item_id = ?2",
            params![self.owner_class, item_id],
        )?;
        Ok(())
    }
}
