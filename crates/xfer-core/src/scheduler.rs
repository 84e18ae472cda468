//! Bounded-concurrency chunk scheduler.
//!
//! Chunks are handed out in plan order from a shared queue to at most
//! `concurrency` scoped worker threads; results come back over a channel to
//! the calling thread. The first fault stops further dispatch, in-flight
//! chunks are allowed to finish, and that first fault is what the caller
//! gets even if later chunks succeed.

use crate::chunk::{plan_chunks, Chunk};
use crate::context::Context;
use crate::fault::{Fault, TransportErrorKind};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Mutex};
use std::thread;

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome<T> {
    /// Number of chunks in the plan (all of which succeeded).
    pub chunks: usize,
    /// Value returned by the chunk with the highest index; `None` for an empty range.
    pub last: Option<T>,
}

/// Runs `worker(ctx, chunk, total_chunks)` for every chunk of
/// `[range_start, range_start + range_length)`.
pub fn run<T, W>(
    ctx: &Context,
    range_start: u64,
    range_length: u64,
    chunk_size: u64,
    concurrency: usize,
    worker: W,
) -> Result<TransferOutcome<T>, Fault>
where
    T: Send,
    W: Fn(&Context, Chunk, usize) -> Result<T, Fault> + Sync,
{
    if concurrency == 0 {
        return Err(Fault::config("concurrency must be at least 1"));
    }
    let plan = plan_chunks(range_start, range_length, chunk_size)?;
    let total = plan.len();
    if total == 0 {
        return Ok(TransferOutcome { chunks: 0, last: None });
    }
    ctx.check()?;

    let queue: Mutex<VecDeque<Chunk>> = Mutex::new(plan.into_iter().collect());
    let stop = AtomicBool::new(false);
    let num_workers = concurrency.min(total);
    tracing::debug!(range_start, range_length, chunk_size, total, num_workers, "starting chunked transfer");

    let (tx, rx) = mpsc::channel::<(Chunk, Result<T, Fault>)>();
    thread::scope(|s| {
        let mut handles = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let tx = tx.clone();
            let queue = &queue;
            let stop = &stop;
            let worker = &worker;
            handles.push(s.spawn(move || loop {
                if stop.load(Ordering::Acquire) || ctx.is_cancelled() {
                    break;
                }
                let next = match queue.lock() {
                    Ok(mut q) => q.pop_front(),
                    Err(_) => None,
                };
                let Some(chunk) = next else { break };
                tracing::debug!(index = chunk.index, offset = chunk.offset, length = chunk.length, "chunk dispatched");
                let res = worker(ctx, chunk, total);
                if res.is_err() {
                    stop.store(true, Ordering::Release);
                }
                if tx.send((chunk, res)).is_err() {
                    break;
                }
            }));
        }
        drop(tx);

        let mut first_error: Option<Fault> = None;
        let mut last: Option<T> = None;
        let mut completed = 0usize;
        for (chunk, res) in rx.iter() {
            match res {
                Ok(value) => {
                    completed += 1;
                    if chunk.index == total - 1 {
                        last = Some(value);
                    }
                }
                Err(e) => {
                    stop.store(true, Ordering::Release);
                    if first_error.is_none() {
                        tracing::warn!(index = chunk.index, offset = chunk.offset, error = %e, "chunk failed, stopping dispatch");
                        first_error = Some(e);
                    } else {
                        tracing::debug!(index = chunk.index, error = %e, "further chunk failure");
                    }
                }
            }
        }
        for h in handles {
            if h.join().is_err() && first_error.is_none() {
                first_error = Some(Fault::transport(TransportErrorKind::Other, "chunk worker panicked"));
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if completed < total {
            ctx.check()?;
            return Err(Fault::transport(
                TransportErrorKind::Other,
                format!("only {} of {} chunks completed", completed, total),
            ));
        }
        Ok(TransferOutcome { chunks: total, last })
    })
}
