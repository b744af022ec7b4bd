use super::{project, ProjectionConfig};
use crate::dataset::Dataset;
use crate::dimred::Projection;
use crate::preprocessing::Preprocessor;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

/// Proof that a computation was started; only the newest ticket may publish.
#[derive(Debug, PartialEq, Eq)]
pub struct Ticket {
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Default)]
struct SlotState {
    generation: u64,
    current: Option<Arc<Projection>>,
}

/// Holds the projection on display. Starting a new computation invalidates
/// every earlier one, so a slow run can never overwrite a newer result.
/// At most one computation runs at a time.
#[derive(Default)]
pub struct ProjectionSlot {
    state: Mutex<SlotState>,
    running: Mutex<()>,
}

impl ProjectionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self) -> Ticket {
        let mut state = self.state.lock();
        state.generation += 1;
        Ticket {
            generation: state.generation,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.state.lock().generation == ticket.generation
    }

    /// Stores `projection` if `ticket` is still the newest; returns whether it
    /// was applied.
    pub fn publish(&self, ticket: Ticket, projection: Projection) -> bool {
        let mut state = self.state.lock();
        if state.generation != ticket.generation {
            log::debug!(
                "Discarding stale projection from run {} (latest is {})",
                ticket.generation,
                state.generation
            );
            return false;
        }
        state.current = Some(Arc::new(projection));
        true
    }

    pub fn current(&self) -> Option<Arc<Projection>> {
        self.state.lock().current.clone()
    }

    /// Runs `compute` under the slot's computation lock and publishes its
    /// result. A ticket that is already stale once the lock is held is
    /// skipped without computing; returns whether a projection was applied.
    pub fn compute<F>(&self, ticket: Ticket, compute: F) -> anyhow::Result<bool>
    where
        F: FnOnce() -> anyhow::Result<Projection>,
    {
        let _running = self.running.lock();
        if !self.is_current(&ticket) {
            log::debug!("Skipping projection run {}, superseded before it started", ticket.generation);
            return Ok(false);
        }
        let projection = compute()?;
        Ok(self.publish(ticket, projection))
    }
}

/// Runs a projection on a worker thread and publishes it into `slot` under
/// `ticket`, unless a newer run has started in the meantime. Workers queue on
/// the slot, so only one projection is computed at a time.
pub fn spawn_projection(
    slot: Arc<ProjectionSlot>,
    ticket: Ticket,
    dataset: Arc<Dataset>,
    preprocessor: Preprocessor,
    config: ProjectionConfig,
) -> JoinHandle<anyhow::Result<bool>> {
    std::thread::spawn(move || slot.compute(ticket, || project(&dataset, &preprocessor, &config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::schema::{AGE, BMI};
    use crate::dataset::Record;
    use crate::dimred::ReductionMethod;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn empty_projection(method: &'static str) -> Projection {
        Projection {
            method,
            points: Vec::new(),
            variance_explained: None,
        }
    }

    #[test]
    fn test_stale_results_are_discarded() {
        let slot = ProjectionSlot::new();
        let first = slot.begin();
        let second = slot.begin();
        assert!(!slot.is_current(&first));

        assert!(slot.publish(second, empty_projection("tsne")));
        assert!(!slot.publish(first, empty_projection("pca")));
        assert_eq!(slot.current().unwrap().method, "tsne");
    }

    #[test]
    fn test_spawned_projection_is_published() {
        let records = (0..12)
            .map(|i| Record::from_pairs([(AGE, Some(40.0 + i as f64)), (BMI, Some(20.0 + (i % 5) as f64))]))
            .collect();
        let dataset = Arc::new(Dataset::with_cohort_schema(records).unwrap());
        let slot = Arc::new(ProjectionSlot::new());

        let handle = spawn_projection(
            Arc::clone(&slot),
            slot.begin(),
            Arc::clone(&dataset),
            Preprocessor::new(),
            ProjectionConfig::new([AGE, BMI], ReductionMethod::default()),
        );
        assert!(handle.join().unwrap().unwrap());
        assert_eq!(slot.current().unwrap().len(), 12);

        // A run overtaken before it finishes must not land.
        let ticket = slot.begin();
        let _newer = slot.begin();
        let overtaken = spawn_projection(
            Arc::clone(&slot),
            ticket,
            dataset,
            Preprocessor::new(),
            ProjectionConfig::new([AGE], ReductionMethod::default()),
        );
        assert!(!overtaken.join().unwrap().unwrap());
        assert_eq!(slot.current().unwrap().len(), 12);
    }

    #[test]
    fn test_stale_ticket_skips_the_computation() {
        let dataset = Arc::new(Dataset::with_cohort_schema(vec![Record::new()]).unwrap());
        let slot = Arc::new(ProjectionSlot::new());
        let stale = slot.begin();
        let _fresh = slot.begin();

        // An empty feature list fails as soon as it is computed.
        let handle = spawn_projection(
            Arc::clone(&slot),
            stale,
            dataset,
            Preprocessor::new(),
            ProjectionConfig::new(Vec::<String>::new(), ReductionMethod::default()),
        );
        assert!(!handle.join().unwrap().unwrap());
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_one_computation_at_a_time() {
        let slot = Arc::new(ProjectionSlot::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let run = |slot: Arc<ProjectionSlot>, ticket: Ticket, method: &'static str| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            std::thread::spawn(move || {
                slot.compute(ticket, || {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(50));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(empty_projection(method))
                })
            })
        };

        let first = run(Arc::clone(&slot), slot.begin(), "pca");
        std::thread::sleep(Duration::from_millis(10));
        let second = run(Arc::clone(&slot), slot.begin(), "tsne");

        assert!(!first.join().unwrap().unwrap());
        assert!(second.join().unwrap().unwrap());
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(slot.current().unwrap().method, "tsne");
    }
}
