//! Owned timer resources. Each handle wraps a spawned task and aborts it when
//! dropped, so a countdown can never outlive whoever holds the handle.

use std::{future::Future, time::Duration};

use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickFlow {
    Continue,
    Stop,
}

/// Recurring tick driver. The first tick fires one `period` after spawning.
pub struct Countdown {
    task: Option<JoinHandle<()>>,
}

impl Countdown {
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = TickFlow> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if on_tick().await == TickFlow::Stop {
                    break;
                }
            }
        });
        Self { task: Some(task) }
    }

    pub fn cancel(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Gives up ownership without aborting. Only the tick callback that is
    /// about to return [`TickFlow::Stop`] may use this, since aborting from
    /// inside the task would cancel the callback mid-flight.
    pub fn release(mut self) {
        self.task.take();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// One-shot delayed work, cancelled on drop unless detached.
pub struct DelayedTask {
    task: Option<JoinHandle<()>>,
}

impl DelayedTask {
    pub fn spawn<Fut>(delay: Duration, work: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            work.await;
        });
        Self { task: Some(task) }
    }

    /// Lets the work run to completion with nobody holding it.
    pub fn detach(mut self) {
        self.task.take();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/timer_tests.rs"]
mod tests;
