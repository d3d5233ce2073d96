//! Reverse-order rollback executor.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::entry::{ErrorEntry, Result};

type BoxFut<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type RollbackFn = Box<dyn FnOnce() -> BoxFut<RollbackOutcome> + Send>;

/// Result of one compensating action.
///
/// A rollback may itself have registered further compensating actions before
/// failing; those unwind depth-first before the next sibling runs.
pub struct RollbackOutcome {
    pub result: Result<()>,
    pub nested: RollbackStack,
}

impl RollbackOutcome {
    /// Successful rollback with no nested actions.
    pub fn ok() -> Self {
        Self {
            result: Ok(()),
            nested: RollbackStack::new(),
        }
    }

    /// Failed rollback with no nested actions.
    pub fn failed(err: ErrorEntry) -> Self {
        Self {
            result: Err(err),
            nested: RollbackStack::new(),
        }
    }

    /// Attach nested actions accumulated inside the rollback.
    pub fn with_nested(mut self, nested: RollbackStack) -> Self {
        self.nested = nested;
        self
    }
}

struct RollbackStep {
    label: String,
    action: RollbackFn,
}

/// Request-local stack of compensating actions.
///
/// Actions are registered in execution order and unwound in reverse. A
/// failing rollback is recorded but never halts the remaining unwinding.
#[derive(Default)]
pub struct RollbackStack {
    steps: Vec<RollbackStep>,
}

impl RollbackStack {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Register a compensating action.
    pub fn push<F, Fut>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = RollbackOutcome> + Send + 'static,
    {
        self.steps.push(RollbackStep {
            label: label.into(),
            action: Box::new(move || Box::pin(action())),
        });
    }

    /// Run all registered actions in reverse order, depth-first into each
    /// action's own nested stack, and return the loggable trail.
    pub async fn unwind(self) -> Vec<String> {
        let trail = self.unwind_inner().await;
        for line in &trail {
            warn!(rollback = %line, "rollback executed");
        }
        trail
    }

    fn unwind_inner(mut self) -> BoxFut<Vec<String>> {
        Box::pin(async move {
            let mut trail = Vec::new();
            while let Some(step) = self.steps.pop() {
                let outcome = (step.action)().await;
                match outcome.result {
                    Ok(()) => trail.push(format!("rolled back: {}", step.label)),
                    Err(err) => trail.push(format!(
                        "rollback failed: {}: {}",
                        step.label, err.internal
                    )),
                }
                let nested = outcome.nested.unwind_inner().await;
                trail.extend(nested);
            }
            trail
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Trace = Arc<Mutex<Vec<&'static str>>>;

    fn record(trace: &Trace, tag: &'static str) {
        trace.lock().unwrap().push(tag);
    }

    #[tokio::test]
    async fn unwinds_in_reverse_registration_order() {
        let trace: Trace = Default::default();

        let mut stack = RollbackStack::new();
        for tag in ["first", "second", "third"] {
            let trace = trace.clone();
            stack.push(tag, move || async move {
                record(&trace, tag);
                RollbackOutcome::ok()
            });
        }

        let trail = stack.unwind().await;
        assert_eq!(*trace.lock().unwrap(), vec!["third", "second", "first"]);
        assert_eq!(trail.len(), 3);
        assert!(trail[0].contains("third"));
    }

    #[tokio::test]
    async fn failed_rollback_does_not_halt_unwinding() {
        let trace: Trace = Default::default();

        let mut stack = RollbackStack::new();
        let t = trace.clone();
        stack.push("survivor", move || async move {
            record(&t, "survivor");
            RollbackOutcome::ok()
        });
        stack.push("exploder", move || async move {
            RollbackOutcome::failed(ErrorEntry::engine("cannot undo"))
        });

        let trail = stack.unwind().await;
        assert_eq!(*trace.lock().unwrap(), vec!["survivor"]);
        assert!(trail[0].contains("rollback failed: exploder"));
        assert!(trail[1].contains("rolled back: survivor"));
    }

    #[tokio::test]
    async fn nested_stacks_unwind_depth_first() {
        let trace: Trace = Default::default();

        let mut stack = RollbackStack::new();
        let t1 = trace.clone();
        stack.push("outer-early", move || async move {
            record(&t1, "outer-early");
            RollbackOutcome::ok()
        });
        let t2 = trace.clone();
        let t3 = trace.clone();
        stack.push("outer-late", move || async move {
            record(&t2, "outer-late");
            let mut nested = RollbackStack::new();
            nested.push("inner", move || async move {
                record(&t3, "inner");
                RollbackOutcome::ok()
            });
            RollbackOutcome::ok().with_nested(nested)
        });

        stack.unwind().await;
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["outer-late", "inner", "outer-early"]
        );
    }
}
