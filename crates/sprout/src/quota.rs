//! Daily operation quotas and experience exhaustion tracking.
//!
//! The server reports an [`OperationLimit`] per action kind on most land
//! replies. The book keeps the latest record per kind and forgets all of
//! them when the local date changes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::proto::OperationLimit;

/// Action kinds with server-side daily counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Harvest,
    RemovePlant,
    PutWeeds,
    PutInsects,
    WeedOut,
    Insecticide,
    Water,
    Steal,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Self::Harvest,
        Self::RemovePlant,
        Self::PutWeeds,
        Self::PutInsects,
        Self::WeedOut,
        Self::Insecticide,
        Self::Water,
        Self::Steal,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Harvest => "harvest",
            Self::RemovePlant => "remove",
            Self::PutWeeds => "put weeds",
            Self::PutInsects => "put insects",
            Self::WeedOut => "weed",
            Self::Insecticide => "insecticide",
            Self::Water => "water",
            Self::Steal => "steal",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Numeric ids the server uses in limit records.
///
/// Observed values, not a documented part of the protocol, so they are
/// configurable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OperationIds {
    pub harvest: i64,
    pub remove_plant: i64,
    pub put_weeds: i64,
    pub put_insects: i64,
    pub weed_out: i64,
    pub insecticide: i64,
    pub water: i64,
    pub steal: i64,
}

impl Default for OperationIds {
    fn default() -> Self {
        Self {
            harvest: 10001,
            remove_plant: 10002,
            put_weeds: 10003,
            put_insects: 10004,
            weed_out: 10005,
            insecticide: 10006,
            water: 10007,
            steal: 10008,
        }
    }
}

impl OperationIds {
    pub fn id(&self, op: Operation) -> i64 {
        match op {
            Operation::Harvest => self.harvest,
            Operation::RemovePlant => self.remove_plant,
            Operation::PutWeeds => self.put_weeds,
            Operation::PutInsects => self.put_insects,
            Operation::WeedOut => self.weed_out,
            Operation::Insecticide => self.insecticide,
            Operation::Water => self.water,
            Operation::Steal => self.steal,
        }
    }

    pub fn operation(&self, id: i64) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| self.id(*op) == id)
    }
}

#[derive(Debug, Default)]
struct Book {
    date: Option<NaiveDate>,
    limits: HashMap<i64, OperationLimit>,
    exp_before: HashMap<i64, i64>,
    exhausted: HashSet<i64>,
}

/// Shared quota state for the friend and farm orchestrators.
#[derive(Debug)]
pub struct QuotaBook {
    ids: OperationIds,
    book: RwLock<Book>,
}

impl QuotaBook {
    pub fn new(ids: OperationIds) -> Self {
        Self {
            ids,
            book: RwLock::new(Book::default()),
        }
    }

    /// Clears every record if `today` differs from the date last seen.
    ///
    /// Returns `true` when a reset happened. The first call only records
    /// the date.
    pub fn roll_over(&self, today: NaiveDate) -> bool {
        let mut book = self.book.write();
        match book.date {
            Some(date) if date == today => false,
            Some(_) => {
                book.date = Some(today);
                book.limits.clear();
                book.exp_before.clear();
                book.exhausted.clear();
                info!(target: "sprout::friend", %today, "daily limits reset");
                true
            }
            None => {
                book.date = Some(today);
                false
            }
        }
    }

    /// Stores fresh limit records and marks kinds whose experience counter
    /// did not grow past the tracked value as exhausted.
    pub fn record(&self, limits: &[OperationLimit]) {
        let mut book = self.book.write();
        for limit in limits {
            if let Some(before) = book.exp_before.get(&limit.id).copied() {
                if limit.day_exp_times <= before && book.exhausted.insert(limit.id) {
                    let operation = self
                        .ids
                        .operation(limit.id)
                        .map(|op| op.label())
                        .unwrap_or("unknown");
                    info!(target: "sprout::friend", operation, id = limit.id, "no more experience today");
                }
            }
            book.limits.insert(limit.id, limit.clone());
        }
    }

    /// Snapshots the experience counter of `op` before a run of calls.
    pub fn track_before(&self, op: Operation) {
        let id = self.ids.id(op);
        let mut book = self.book.write();
        if let Some(exp) = book.limits.get(&id).map(|limit| limit.day_exp_times) {
            book.exp_before.insert(id, exp);
        }
    }

    pub fn is_limit_reached(&self, op: Operation) -> bool {
        let book = self.book.read();
        match book.limits.get(&self.ids.id(op)) {
            Some(limit) => limit.day_times_lt > 0 && limit.day_times >= limit.day_times_lt,
            None => false,
        }
    }

    /// Calls left today, or `None` when no ceiling is known.
    pub fn remaining(&self, op: Operation) -> Option<i64> {
        let book = self.book.read();
        let limit = book.limits.get(&self.ids.id(op))?;
        if limit.day_times_lt <= 0 {
            return None;
        }
        Some((limit.day_times_lt - limit.day_times).max(0))
    }

    pub fn can_gain_exp(&self, op: Operation) -> bool {
        !self.book.read().exhausted.contains(&self.ids.id(op))
    }

    pub fn limit(&self, op: Operation) -> Option<OperationLimit> {
        self.book.read().limits.get(&self.ids.id(op)).cloned()
    }
}
