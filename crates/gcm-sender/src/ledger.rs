//! Per-recipient bookkeeping across delivery rounds.
//!
//! The ledger has no network dependency: the sender threads one instance
//! through its round loop, and [`ResultLedger::merge`] and
//! [`ResultLedger::aggregate`] can be exercised directly.

use std::collections::{HashMap, HashSet};

use crate::error::{GcmError, Result};
use crate::outcome::{BatchOutcome, DeliveryResult, RecipientOutcome};

/// Outcomes recorded so far, keyed by recipient identifier.
#[derive(Debug, Clone, Default)]
pub struct ResultLedger {
    outcomes: HashMap<String, RecipientOutcome>,
}

impl ResultLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn get(&self, recipient: &str) -> Option<&RecipientOutcome> {
        self.outcomes.get(recipient)
    }

    /// Whether `recipient` holds a final outcome.
    pub fn is_settled(&self, recipient: &str) -> bool {
        self.outcomes
            .get(recipient)
            .is_some_and(|outcome| !outcome.is_retriable())
    }

    /// Record one round's outcomes and return the recipients to resubmit.
    ///
    /// `pending[i]` is paired with `batch.outcomes[i]`; the gateway must
    /// answer for every recipient it was asked about. A settled outcome is
    /// never replaced. The returned recipients are unsettled and distinct,
    /// in first-seen order.
    pub fn merge(&mut self, pending: &[String], batch: BatchOutcome) -> Result<Vec<String>> {
        if batch.outcomes.len() != pending.len() {
            return Err(GcmError::internal(format!(
                "gateway returned {} results for {} recipients (multicast_id={})",
                batch.outcomes.len(),
                pending.len(),
                batch.multicast_id
            )));
        }

        for (recipient, outcome) in pending.iter().zip(batch.outcomes) {
            if self.is_settled(recipient) {
                continue;
            }
            self.outcomes.insert(recipient.clone(), outcome);
        }

        // A later copy of a duplicated recipient may settle it in this round.
        let mut seen = HashSet::new();
        let next_pending = pending
            .iter()
            .filter(|recipient| !self.is_settled(recipient) && seen.insert(recipient.as_str()))
            .cloned()
            .collect();
        Ok(next_pending)
    }

    /// Build the final result in the order of `recipients`.
    ///
    /// Duplicate identifiers share one ledger entry, so each copy reports
    /// the same outcome.
    pub fn aggregate(&self, recipients: &[String], round_ids: &[i64]) -> Result<DeliveryResult> {
        let Some((&multicast_id, retries)) = round_ids.split_first() else {
            return Err(GcmError::internal(
                "cannot aggregate a delivery without any completed round",
            ));
        };

        let outcomes = recipients
            .iter()
            .map(|recipient| {
                self.outcomes.get(recipient).cloned().ok_or_else(|| {
                    GcmError::internal(format!("no outcome recorded for recipient {recipient}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut success = 0;
        let mut failure = 0;
        let mut canonical_ids = 0;
        for outcome in &outcomes {
            if outcome.is_delivered() {
                success += 1;
                if outcome.canonical_registration_id().is_some() {
                    canonical_ids += 1;
                }
            } else {
                failure += 1;
            }
        }

        Ok(DeliveryResult {
            success,
            failure,
            canonical_ids,
            multicast_id,
            retry_multicast_ids: retries.to_vec(),
            outcomes,
        })
    }
}
