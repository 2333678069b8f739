//! Per-topic middleware chains.
//!
//! A middleware receives the event and a `next` continuation. Calling `next`
//! runs the rest of the chain and returns its output; not calling it stops
//! the pipeline there. Returning `Ok(None)` drops the event.

use std::panic::{catch_unwind, AssertUnwindSafe};
use weave_core::panic_message;

/// Continuation handed to a middleware.
pub type Next<'a, E> = &'a mut dyn FnMut(E) -> Option<E>;

/// One stage of a middleware chain.
pub trait Middleware<E> {
    fn handle(&mut self, event: E, next: Next<'_, E>) -> anyhow::Result<Option<E>>;
}

impl<E, F> Middleware<E> for F
where
    F: FnMut(E, Next<'_, E>) -> anyhow::Result<Option<E>>,
{
    fn handle(&mut self, event: E, next: Next<'_, E>) -> anyhow::Result<Option<E>> {
        self(event, next)
    }
}

/// Run `event` through `chain`.
///
/// A failing stage (error or panic) is skipped: if it already invoked
/// `next`, the downstream output stands; otherwise the rest of the chain runs
/// with the event as it was handed to the failing stage.
pub(crate) fn run_chain<E: Clone>(
    chain: &mut [Box<dyn Middleware<E>>],
    topic: &'static str,
    event: E,
) -> Option<E> {
    let Some((first, rest)) = chain.split_first_mut() else {
        return Some(event);
    };

    let original = event.clone();
    let mut downstream: Option<Option<E>> = None;
    let result = {
        let mut next = |e: E| {
            let out = run_chain(rest, topic, e);
            downstream = Some(out.clone());
            out
        };
        catch_unwind(AssertUnwindSafe(|| first.handle(event, &mut next)))
    };

    let failure = match result {
        Ok(Ok(out)) => return out,
        Ok(Err(err)) => err.to_string(),
        Err(panic) => panic_message(&panic),
    };
    tracing::warn!(topic, error = %failure, "middleware failed, continuing with original event");
    match downstream {
        Some(out) => out,
        None => run_chain(rest, topic, original),
    }
}
