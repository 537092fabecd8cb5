//! End-to-end sync scenarios against the simulated sensor.
//!
//! Time is paused so poll intervals and retry delays cost nothing; the
//! engines run with their default settings.

use envsensor_core::mock::{MemorySink, MemoryStore, MockTransport};
use envsensor_core::{
    ForwardOptions, LogStore, MeasurementInterval, PlanReason, RetryConfig, SessionOptions,
    Transport, forward_rows, sync_device,
};
use envsensor_core::uuids::MEASUREMENT_INTERVAL;

fn options() -> SessionOptions {
    SessionOptions::default().connect_retry(RetryConfig::none())
}

/// A device whose checkpoint sits on full page 10.
async fn synced_to_page_10() -> (MockTransport, MemoryStore) {
    let device = MockTransport::builder().pages(11).build();
    let mut store = MemoryStore::new();
    sync_device(&device, &mut store, &options()).await.unwrap();
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!((cp.page, cp.row), (10, 12));
    (device, store)
}

#[tokio::test(start_paused = true)]
async fn test_incremental_sync_reads_only_new_pages() {
    let (device, mut store) = synced_to_page_10().await;
    device.advance(5, 12).await;
    let requests = device.request_count();

    let report = sync_device(&device, &mut store, &options()).await.unwrap();

    assert_eq!(report.plan_reason, Some(PlanReason::Incremental));
    assert_eq!(report.pages_read, 5);
    assert_eq!(device.request_count() - requests, 5);
    assert_eq!(report.rows.inserted, 65);
    assert_eq!(report.rows.duplicate, 0);
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!((cp.page, cp.row), (15, 12));
    assert_eq!(cp.timestamp, device.latest_page().await.start_time);

    // Nothing new: no page requests at all.
    let report = sync_device(&device, &mut store, &options()).await.unwrap();
    assert_eq!(report.pages_read, 0);
    assert_eq!(device.request_count() - requests, 5);
}

#[tokio::test(start_paused = true)]
async fn test_interrupted_sync_keeps_checkpoint() {
    let (device, mut store) = synced_to_page_10().await;
    device.advance(5, 12).await;
    device.disconnect_after_requests(2);

    let err = sync_device(&device, &mut store, &options()).await;
    assert!(err.is_err());
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!((cp.page, cp.row), (10, 12));
    assert_eq!(store.rows().len(), 13 + 26);

    device.heal();
    let report = sync_device(&device, &mut store, &options()).await.unwrap();
    assert_eq!(report.pages_read, 5);
    assert_eq!(report.rows.duplicate, 26);
    assert_eq!(report.rows.inserted, 39);
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!(cp.page, 15);
    assert_eq!(store.rows().len(), 13 + 65);
}

#[tokio::test(start_paused = true)]
async fn test_forwarding_is_idempotent() {
    let (device, mut store) = synced_to_page_10().await;
    let sink = MemorySink::new();

    let first = forward_rows(&mut store, &sink, ForwardOptions::default())
        .await
        .unwrap();
    assert_eq!(first.points, 13);
    let again = forward_rows(&mut store, &sink, ForwardOptions::default())
        .await
        .unwrap();
    assert_eq!(again.points, 0);

    device.advance(2, 12).await;
    sync_device(&device, &mut store, &options()).await.unwrap();
    let more = forward_rows(&mut store, &sink, ForwardOptions::default())
        .await
        .unwrap();
    assert_eq!(more.points, 26);
    assert_eq!(sink.point_count().await, store.rows().len());

    let batches = sink.batches().await;
    let point = &batches[0][0];
    assert_eq!(point.tags["ble_address"], device.address());
    assert_eq!(point.measurement, "env_sensor");
}

#[tokio::test(start_paused = true)]
async fn test_interval_change_restarts_scan_at_zero() {
    let device = MockTransport::builder().pages(30).build();
    let mut store = MemoryStore::new();
    sync_device(&device, &mut store, &options()).await.unwrap();

    let interval = MeasurementInterval::new(60).unwrap();
    sync_device(&device, &mut store, &options().set_interval(interval))
        .await
        .unwrap();
    assert!(store.get_checkpoint(device.address()).unwrap().unwrap().ring_reset);

    device.advance(3, 4).await;
    let report = sync_device(&device, &mut store, &options()).await.unwrap();
    assert_eq!(report.plan_reason, Some(PlanReason::RingReset));
    assert_eq!(report.pages_read, 4);
    assert_eq!(report.rows.inserted, 13 * 3 + 5);
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!((cp.page, cp.row, cp.ring_reset), (3, 4, false));
}

#[tokio::test(start_paused = true)]
async fn test_interval_written_elsewhere_restarts_scan_at_zero() {
    let device = MockTransport::builder().pages(500).build();
    let mut store = MemoryStore::new();
    sync_device(&device, &mut store, &options()).await.unwrap();
    let before = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!(before.page, 499);

    // Another tool rewrites the interval, which restarts the log.
    device.connect().await.unwrap();
    let interval = MeasurementInterval::new(300).unwrap();
    device
        .write(MEASUREMENT_INTERVAL, &interval.to_bytes())
        .await
        .unwrap();
    device.disconnect().await.unwrap();
    assert_ne!(device.recording_start().await, before.recording_start.unwrap());
    device.advance(2, 12).await;

    let report = sync_device(&device, &mut store, &options()).await.unwrap();
    assert_eq!(report.plan_reason, Some(PlanReason::RingReset));
    assert_eq!(report.pages_read, 3);
    assert_eq!(report.rows.inserted, 39);
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!((cp.page, cp.row), (2, 12));
    assert_eq!(cp.recording_start, Some(device.recording_start().await));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_syncs_leave_device_clock_alone() {
    let (device, mut store) = synced_to_page_10().await;
    let recording_start = device.recording_start().await;

    for _ in 0..3 {
        device.advance(1, 12).await;
        let report = sync_device(&device, &mut store, &options()).await.unwrap();
        assert_eq!(report.plan_reason, Some(PlanReason::Incremental));
        assert_eq!(report.pages_read, 1);
        assert_eq!(report.recording_start, Some(recording_start));
    }
    assert!(device.time_writes().await.is_empty());
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!((cp.page, cp.recording_start), (13, Some(recording_start)));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_link_mid_scan_recovers() {
    let (device, mut store) = synced_to_page_10().await;
    device.advance(5, 12).await;
    device.drop_link_after_requests(2);

    let report = sync_device(&device, &mut store, &options()).await.unwrap();
    assert_eq!(report.pages_read, 5);
    assert_eq!(report.rows.inserted, 65);
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!((cp.page, cp.row), (15, 12));
}

#[tokio::test(start_paused = true)]
async fn test_partial_page_is_reread() {
    let device = MockTransport::builder().pages(5).latest_row(4).build();
    let mut store = MemoryStore::new();
    sync_device(&device, &mut store, &options()).await.unwrap();

    device.advance(0, 9).await;
    let report = sync_device(&device, &mut store, &options()).await.unwrap();
    assert_eq!(report.pages_read, 1);
    assert_eq!(report.rows.inserted, 5);
    assert_eq!(report.rows.duplicate, 5);

    device.advance(2, 3).await;
    let report = sync_device(&device, &mut store, &options()).await.unwrap();
    assert_eq!(report.pages_read, 3);
    assert_eq!(report.rows.inserted, 3 + 13 + 4);
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!((cp.page, cp.row), (6, 3));
}

#[tokio::test(start_paused = true)]
async fn test_ring_overrun_reports_data_loss() {
    let device = MockTransport::builder().pages(20).build();
    let mut store = MemoryStore::new();
    sync_device(&device, &mut store, &options()).await.unwrap();

    device.advance(2100, 12).await;
    let report = sync_device(&device, &mut store, &options()).await.unwrap();

    assert_eq!(report.plan_reason, Some(PlanReason::Overrun));
    let loss = report.data_loss.unwrap();
    assert_eq!(loss.unread_pages, 2100);
    assert_eq!(loss.lost_pages, 52);
    assert_eq!(report.pages_read, 2048);
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!(cp.page, (19 + 2100) % 2048);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_range_across_wrap() {
    let device = MockTransport::builder().pages(2050).build();
    let mut store = MemoryStore::new();
    let report = sync_device(&device, &mut store, &options().page_range(2046, 1))
        .await
        .unwrap();

    assert_eq!(report.pages_read, 4);
    assert_eq!(report.plan_reason, Some(PlanReason::Override));
    let pages: Vec<u16> = store.rows().iter().map(|r| r.page).collect();
    assert_eq!(pages.first(), Some(&2046));
    assert_eq!(pages.last(), Some(&1));
    assert!(store.get_checkpoint(device.address()).unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_page_aborts_without_checkpoint() {
    let (device, mut store) = synced_to_page_10().await;
    device.advance(3, 12).await;
    device.reject_page(12, 0x02).await;

    let err = sync_device(&device, &mut store, &options()).await.unwrap_err();
    assert!(matches!(err, envsensor_core::Error::DeviceError { page: 12, .. }));
    let cp = store.get_checkpoint(device.address()).unwrap().unwrap();
    assert_eq!(cp.page, 10);
    assert!(!device.is_connected());
}
