// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory quota ledger.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::FaultSwitch;
use crate::collaborators::QuotaLedger;
use crate::error::{Error, Result};
use crate::space::ComputeType;

#[derive(Debug, Default)]
struct QuotaRow {
    total: u32,
    used: u32,
    /// bound id -> reserved units, until supplied.
    reservations: HashMap<String, u32>,
    /// space id -> units.
    supplies: HashMap<String, u32>,
}

/// Quota ledger keeping one row per `(user, compute_type)`.
///
/// Rows that were never configured start with the default total for their
/// compute type, zero unless set with [`MemoryQuotaLedger::with_default_total`].
#[derive(Debug, Default)]
pub struct MemoryQuotaLedger {
    rows: Mutex<HashMap<(String, ComputeType), QuotaRow>>,
    default_totals: HashMap<ComputeType, u32>,
    /// Fault switch for `consume`.
    pub consume_fault: FaultSwitch,
    /// Fault switch for `supply`.
    pub supply_fault: FaultSwitch,
    /// Fault switch for `release`.
    pub release_fault: FaultSwitch,
}

impl MemoryQuotaLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Give every user `total` units of `compute_type` unless set otherwise.
    pub fn with_default_total(mut self, compute_type: ComputeType, total: u32) -> Self {
        self.default_totals.insert(compute_type, total);
        self
    }

    /// Set the total quota of a row.
    pub async fn set_quota(&self, user: &str, compute_type: ComputeType, total: u32) {
        let mut rows = self.rows.lock().await;
        rows.entry((user.to_string(), compute_type))
            .or_insert_with(|| self.new_row(compute_type))
            .total = total;
    }

    fn new_row(&self, compute_type: ComputeType) -> QuotaRow {
        QuotaRow {
            total: self.default_totals.get(&compute_type).copied().unwrap_or(0),
            ..Default::default()
        }
    }

    /// Units currently consumed.
    pub async fn used(&self, user: &str, compute_type: ComputeType) -> u32 {
        let rows = self.rows.lock().await;
        rows.get(&(user.to_string(), compute_type))
            .map(|r| r.used)
            .unwrap_or(0)
    }

    /// Units supplied to `space_id`, if bound.
    pub async fn supplied_to(
        &self,
        user: &str,
        compute_type: ComputeType,
        space_id: &str,
    ) -> Option<u32> {
        let rows = self.rows.lock().await;
        rows.get(&(user.to_string(), compute_type))
            .and_then(|r| r.supplies.get(space_id).copied())
    }

    /// Reservations not yet supplied to a Space.
    pub async fn reservation_count(&self, user: &str, compute_type: ComputeType) -> usize {
        let rows = self.rows.lock().await;
        rows.get(&(user.to_string(), compute_type))
            .map(|r| r.reservations.len())
            .unwrap_or(0)
    }

    /// Spaces currently holding units.
    pub async fn supply_count(&self, user: &str, compute_type: ComputeType) -> usize {
        let rows = self.rows.lock().await;
        rows.get(&(user.to_string(), compute_type))
            .map(|r| r.supplies.len())
            .unwrap_or(0)
    }
}

impl QuotaRow {
    /// Drop the binding held under `resource_id`, reservation first.
    fn unbind(&mut self, resource_id: &str) {
        if self.reservations.remove(resource_id).is_none() {
            self.supplies.remove(resource_id);
        }
    }

    /// Drop one binding of exactly `count` units, reservation first.
    fn unbind_any(&mut self, count: u32) {
        let key = |bindings: &HashMap<String, u32>| {
            bindings
                .iter()
                .find(|(_, units)| **units == count)
                .map(|(id, _)| id.clone())
        };
        if let Some(id) = key(&self.reservations) {
            self.reservations.remove(&id);
        } else if let Some(id) = key(&self.supplies) {
            self.supplies.remove(&id);
        }
    }
}

#[async_trait]
impl QuotaLedger for MemoryQuotaLedger {
    async fn consume(
        &self,
        user: &str,
        compute_type: ComputeType,
        count: u32,
        bound_id: &str,
    ) -> Result<()> {
        if self.consume_fault.trip() {
            return Err(Error::Ledger("injected consume failure".to_string()));
        }
        let mut rows = self.rows.lock().await;
        let row = rows
            .entry((user.to_string(), compute_type))
            .or_insert_with(|| self.new_row(compute_type));
        let available = row.total.saturating_sub(row.used);
        if count > available {
            return Err(Error::QuotaExhausted {
                user: user.to_string(),
                compute_type,
                requested: count,
                available,
            });
        }
        row.used += count;
        row.reservations.insert(bound_id.to_string(), count);
        Ok(())
    }

    async fn supply(
        &self,
        user: &str,
        compute_type: ComputeType,
        bound_id: &str,
        count: u32,
        space_id: &str,
    ) -> Result<()> {
        if self.supply_fault.trip() {
            return Err(Error::Ledger("injected supply failure".to_string()));
        }
        let mut rows = self.rows.lock().await;
        let row = rows
            .get_mut(&(user.to_string(), compute_type))
            .ok_or_else(|| Error::Ledger(format!("no quota row for {user}/{compute_type}")))?;
        if row.reservations.remove(bound_id).is_none() {
            return Err(Error::Ledger(format!("no reservation bound to {bound_id}")));
        }
        row.supplies.insert(space_id.to_string(), count);
        Ok(())
    }

    async fn release(&self, user: &str, compute_type: ComputeType, count: u32) -> Result<()> {
        if self.release_fault.trip() {
            return Err(Error::Ledger("injected release failure".to_string()));
        }
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(&(user.to_string(), compute_type)) {
            row.used = row.used.saturating_sub(count);
            row.unbind_any(count);
        }
        Ok(())
    }

    async fn release_bound(
        &self,
        user: &str,
        compute_type: ComputeType,
        count: u32,
        resource_id: &str,
    ) -> Result<()> {
        if self.release_fault.trip() {
            return Err(Error::Ledger("injected release failure".to_string()));
        }
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(&(user.to_string(), compute_type)) {
            row.used = row.used.saturating_sub(count);
            row.unbind(resource_id);
        }
        Ok(())
    }
}
