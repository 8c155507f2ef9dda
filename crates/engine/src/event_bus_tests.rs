// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use sky_core::{JobCounters, JobId, JobStatus, TaskId, TransferProgress};

fn progress(job: &str, files: u64) -> Event {
    Event::Progress(TransferProgress {
        connection_id: "c1".into(),
        task_id: TaskId::from_string("t1"),
        job_id: JobId::from_string(job),
        status: JobStatus::Running,
        started_at_ms: 0,
        counters: JobCounters { files_transferred: files, ..JobCounters::default() },
    })
}

fn transferred(event: &Event) -> u64 {
    match event {
        Event::Progress(p) => p.counters.files_transferred,
        _ => panic!("expected progress event"),
    }
}

#[tokio::test]
async fn delivers_in_publish_order() {
    let bus = EventBus::new();
    let sub = bus.subscribe(EventFilter::any());
    for i in 0..5 {
        bus.publish(&progress("j1", i));
    }
    for i in 0..5 {
        assert_eq!(transferred(&sub.recv().await), i);
    }
}

#[tokio::test]
async fn filter_limits_delivery() {
    let bus = EventBus::new();
    let only_j2 = bus.subscribe(EventFilter::for_job(JobId::from_string("j2")));
    bus.publish(&progress("j1", 1));
    bus.publish(&progress("j2", 2));
    assert_eq!(transferred(&only_j2.recv().await), 2);
    assert!(only_j2.try_recv().is_none());
}

#[test]
fn overflow_drops_oldest_and_counts() {
    let bus = EventBus::with_capacity(3);
    let sub = bus.subscribe(EventFilter::any());
    for i in 0..5 {
        bus.publish(&progress("j1", i));
    }
    assert_eq!(sub.dropped(), 2);
    // The three newest survive.
    let got: Vec<u64> = std::iter::from_fn(|| sub.try_recv()).map(|e| transferred(&e)).collect();
    assert_eq!(got, vec![2, 3, 4]);
}

#[test]
fn each_subscriber_gets_every_matching_event() {
    let bus = EventBus::new();
    let a = bus.subscribe(EventFilter::any());
    let b = bus.subscribe(EventFilter::any());
    bus.publish(&progress("j1", 7));
    assert_eq!(transferred(&a.try_recv().unwrap()), 7);
    assert_eq!(transferred(&b.try_recv().unwrap()), 7);
}

#[test]
fn dropping_a_subscription_unsubscribes() {
    let bus = EventBus::new();
    let sub = bus.subscribe(EventFilter::any());
    assert_eq!(bus.subscriber_count(), 1);
    drop(sub);
    bus.publish(&progress("j1", 1));
    assert_eq!(bus.subscriber_count(), 0);
}

#[test]
fn slow_subscriber_does_not_block_publisher() {
    let bus = EventBus::with_capacity(2);
    let sub = bus.subscribe(EventFilter::any());
    // Publish far past capacity; publish never blocks and newest wins.
    for i in 0..1_000 {
        bus.publish(&progress("j1", i));
    }
    assert_eq!(sub.dropped(), 998);
    let got: Vec<u64> = std::iter::from_fn(|| sub.try_recv()).map(|e| transferred(&e)).collect();
    assert_eq!(got, vec![998, 999]);
}

#[tokio::test]
async fn recv_wakes_on_late_publish() {
    let bus = Arc::new(EventBus::new());
    let sub = bus.subscribe(EventFilter::any());
    let publisher = {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            bus.publish(&progress("j1", 42));
        })
    };
    assert_eq!(transferred(&sub.recv().await), 42);
    publisher.await.unwrap();
}
