use super::*;
use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

fn counting_countdown(stop_after: u32) -> (Countdown, Arc<AtomicU32>) {
    let ticks = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&ticks);
    let countdown = Countdown::spawn(Duration::from_secs(1), move || {
        let counter = Arc::clone(&counter);
        async move {
            let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if seen >= stop_after {
                TickFlow::Stop
            } else {
                TickFlow::Continue
            }
        }
    });
    (countdown, ticks)
}

#[tokio::test(start_paused = true)]
async fn first_tick_waits_one_period() {
    let (_countdown, ticks) = counting_countdown(u32::MAX);

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn stop_flow_ends_the_task() {
    let (countdown, ticks) = counting_countdown(3);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(ticks.load(Ordering::SeqCst), 3);
    assert!(countdown.is_finished());
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_cancels_ticks() {
    let (countdown, ticks) = counting_countdown(u32::MAX);

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    drop(countdown);
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(ticks.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn cancel_is_equivalent_to_drop() {
    let (countdown, ticks) = counting_countdown(u32::MAX);

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    countdown.cancel();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(ticks.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn delayed_task_runs_once_after_delay_unless_dropped() {
    let fired = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&fired);
    let task = DelayedTask::spawn(Duration::from_secs(3), async move {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    tokio::time::sleep(Duration::from_millis(2_900)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(task.is_finished());

    let counter = Arc::clone(&fired);
    let cancelled = DelayedTask::spawn(Duration::from_secs(3), async move {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    tokio::time::sleep(Duration::from_secs(1)).await;
    drop(cancelled);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn detached_task_outlives_its_handle() {
    let fired = Arc::new(AtomicU32::new(0));

    let counter = Arc::clone(&fired);
    let task = DelayedTask::spawn(Duration::from_secs(2), async move {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    task.detach();
    tokio::time::sleep(Duration::from_millis(2_100)).await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
