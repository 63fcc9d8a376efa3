use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use combat_core::ActorId;

use crate::api::{Result, RuntimeError};
use crate::protocol::{ActivationFollowUp, AggregationKey, ExtensionFollowUp};

#[derive(Debug)]
struct Pending<P> {
    expected: BTreeSet<ActorId>,
    reported: BTreeMap<ActorId, u32>,
    payload: P,
}

/// Finalization data, handed out exactly once per registration.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion<P> {
    pub payload: P,
    /// Targets that lost at least 1 HP.
    pub damaged: Vec<ActorId>,
    pub undamaged: Vec<ActorId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome<P> {
    /// No aggregation under this key, the target was not expected, or it
    /// already reported.
    Ignored,
    Pending { remaining: usize },
    Completed(Completion<P>),
}

/// Aggregation barrier keyed by attacker and item.
#[derive(Debug)]
pub struct AggregationQueue<P> {
    name: &'static str,
    pending: Mutex<HashMap<AggregationKey, Pending<P>>>,
}

impl<P> AggregationQueue<P> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<AggregationKey, Pending<P>>>> {
        self.pending
            .lock()
            .map_err(|_| RuntimeError::LockPoisoned("after-damage queue"))
    }

    /// Registers an aggregation. Returns true if it replaced an in-flight one
    /// under the same key; the older request is dropped.
    pub fn register(
        &self,
        key: AggregationKey,
        expected: impl IntoIterator<Item = ActorId>,
        payload: P,
    ) -> Result<bool> {
        let pending = Pending {
            expected: expected.into_iter().collect(),
            reported: BTreeMap::new(),
            payload,
        };
        let replaced = self.lock()?.insert(key.clone(), pending).is_some();
        if replaced {
            tracing::warn!(
                target: "runtime::queues",
                queue = self.name,
                key = %key,
                "AfterDamage registration replaced an in-flight request"
            );
        }
        Ok(replaced)
    }

    /// Records one target's realized damage.
    ///
    /// The request is removed from the queue before `Completed` is returned,
    /// so a late or replayed report finds nothing.
    pub fn report(
        &self,
        key: &AggregationKey,
        target: &ActorId,
        realized: u32,
    ) -> Result<ReportOutcome<P>> {
        let mut pending = self.lock()?;

        let Some(entry) = pending.get_mut(key) else {
            return Ok(ReportOutcome::Ignored);
        };
        if !entry.expected.contains(target) || entry.reported.contains_key(target) {
            tracing::debug!(
                target: "runtime::queues",
                queue = self.name,
                key = %key,
                reporter = %target,
                "Ignoring unexpected or duplicate damage report"
            );
            return Ok(ReportOutcome::Ignored);
        }

        entry.reported.insert(target.clone(), realized);
        let remaining = entry.expected.len() - entry.reported.len();
        if remaining > 0 {
            return Ok(ReportOutcome::Pending { remaining });
        }

        let Some(done) = pending.remove(key) else {
            return Ok(ReportOutcome::Ignored);
        };
        let (damaged, undamaged): (Vec<ActorId>, Vec<ActorId>) = done
            .expected
            .into_iter()
            .partition(|id| done.reported.get(id).copied().unwrap_or(0) >= 1);

        Ok(ReportOutcome::Completed(Completion {
            payload: done.payload,
            damaged,
            undamaged,
        }))
    }

    pub fn contains(&self, key: &AggregationKey) -> bool {
        self.lock().map(|p| p.contains_key(key)).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

/// The two AfterDamage sub-queues.
#[derive(Debug)]
pub struct AfterDamageQueues {
    /// Macro and attribute activations of the triggering item.
    pub activation: AggregationQueue<ActivationFollowUp>,
    /// Deferred AfterDamage extension buckets.
    pub extension: AggregationQueue<ExtensionFollowUp>,
}

impl AfterDamageQueues {
    pub fn new() -> Self {
        Self {
            activation: AggregationQueue::new("activation"),
            extension: AggregationQueue::new("extension"),
        }
    }

    pub fn clear(&self) -> Result<()> {
        self.activation.clear()?;
        self.extension.clear()
    }
}

impl Default for AfterDamageQueues {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use combat_core::ItemId;

    fn key() -> AggregationKey {
        AggregationKey::new(ActorId::new("pc"), ItemId::new("blade"))
    }

    fn t(id: &str) -> ActorId {
        ActorId::new(id)
    }

    #[test]
    fn completes_once_with_damaged_targets_only() {
        let queue = AggregationQueue::new("test");
        queue.register(key(), [t("t1"), t("t2")], "payload").unwrap();

        assert_eq!(
            queue.report(&key(), &t("t1"), 3).unwrap(),
            ReportOutcome::Pending { remaining: 1 }
        );
        assert_eq!(
            queue.report(&key(), &t("t2"), 0).unwrap(),
            ReportOutcome::Completed(Completion {
                payload: "payload",
                damaged: vec![t("t1")],
                undamaged: vec![t("t2")],
            })
        );

        assert_eq!(queue.report(&key(), &t("t1"), 3).unwrap(), ReportOutcome::Ignored);
        assert!(queue.is_empty());
    }

    #[test]
    fn report_order_does_not_matter() {
        let queue = AggregationQueue::new("test");
        queue.register(key(), [t("t1"), t("t2"), t("t3")], ()).unwrap();

        queue.report(&key(), &t("t3"), 1).unwrap();
        queue.report(&key(), &t("t1"), 0).unwrap();
        let outcome = queue.report(&key(), &t("t2"), 4).unwrap();

        let ReportOutcome::Completed(done) = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(done.damaged, vec![t("t2"), t("t3")]);
    }

    #[test]
    fn duplicate_and_unexpected_reports_do_not_complete() {
        let queue = AggregationQueue::new("test");
        queue.register(key(), [t("t1"), t("t2")], ()).unwrap();

        queue.report(&key(), &t("t1"), 5).unwrap();
        assert_eq!(queue.report(&key(), &t("t1"), 5).unwrap(), ReportOutcome::Ignored);
        assert_eq!(queue.report(&key(), &t("x"), 5).unwrap(), ReportOutcome::Ignored);
        assert!(queue.contains(&key()));
    }

    #[test]
    fn second_registration_replaces_the_first() {
        let queue = AggregationQueue::new("test");
        assert!(!queue.register(key(), [t("t1")], 1).unwrap());
        assert!(queue.register(key(), [t("t2")], 2).unwrap());

        assert_eq!(queue.report(&key(), &t("t1"), 9).unwrap(), ReportOutcome::Ignored);
        let ReportOutcome::Completed(done) = queue.report(&key(), &t("t2"), 9).unwrap() else {
            panic!("expected completion");
        };
        assert_eq!(done.payload, 2);
    }
}
