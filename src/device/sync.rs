//! Device state synchronizer
//!
//! Owns the single source of truth for what we currently believe the
//! device state is. A background tokio task refreshes the snapshot at a
//! fixed rate; request handlers read it through non-blocking accessors
//! and forward button presses straight to the transport.
//!
//! Consistency note: each snapshot field has its own guard, so a single
//! field is never observed half-written, but two fields read back to
//! back may originate from different refresh cycles. That is accepted:
//! the dashboard polls and self-corrects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::device::client::{DeviceCommand, DeviceTransport};
use crate::error::ConnectError;
use crate::models::{DeviceReading, DeviceSnapshot};

/// Cached device state plus the refresh loop driving it.
///
/// Lifecycle: `connect()` probes the device and fails fast if it is
/// unreachable; `start()` spawns the refresh loop; `stop()` asks the
/// loop to exit at its next iteration. Stopped is terminal.
pub struct DeviceSync {
    transport: Arc<dyn DeviceTransport>,
    refresh_interval: Duration,
    running: AtomicBool,

    current_temperature: RwLock<Option<f64>>,
    current_humidity: RwLock<Option<f64>>,
    target_temperature: RwLock<Option<f64>>,
    running_time: RwLock<Option<f64>>,
    last_refresh: RwLock<Option<DateTime<Utc>>>,
}

impl DeviceSync {
    /// Probe the device and build a synchronizer around it. The snapshot
    /// starts all-null; callers must not proceed without a reachable
    /// device, so a failed probe fails construction with no retry.
    pub async fn connect(
        transport: Arc<dyn DeviceTransport>,
        refresh_interval: Duration,
    ) -> Result<Arc<Self>, ConnectError> {
        if !transport.probe().await {
            return Err(ConnectError::ProbeFailed);
        }

        Ok(Arc::new(Self {
            transport,
            refresh_interval,
            running: AtomicBool::new(true),
            current_temperature: RwLock::new(None),
            current_humidity: RwLock::new(None),
            target_temperature: RwLock::new(None),
            running_time: RwLock::new(None),
            last_refresh: RwLock::new(None),
        }))
    }

    /// Spawn the background refresh loop.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let sync = Arc::clone(self);
        tokio::spawn(async move { sync.run().await })
    }

    async fn run(&self) {
        tracing::info!(
            "device refresh loop started (interval: {:?})",
            self.refresh_interval
        );

        // Fixed-rate schedule. Skip means a fetch that overruns the
        // interval is followed by one attempt at the next tick boundary,
        // never by a burst of catch-up fetches, and fetches never overlap.
        let mut ticker = interval(self.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.refresh().await;
        }

        tracing::info!("device refresh loop stopped");
    }

    /// One refresh cycle: fetch, then fold the reading into the snapshot.
    /// Failures leave every field at its last-known value.
    async fn refresh(&self) {
        match self.transport.fetch().await {
            Ok(reading) => self.apply(reading).await,
            Err(e) => tracing::warn!("device fetch failed: {}", e),
        }
    }

    /// Fold one successful reading into the snapshot. Each present field
    /// is replaced under its own guard; absent fields keep their prior
    /// value rather than resetting to null.
    async fn apply(&self, reading: DeviceReading) {
        if let Some(v) = reading.current_temperature {
            *self.current_temperature.write().await = Some(v);
        }
        if let Some(v) = reading.current_humidity {
            *self.current_humidity.write().await = Some(v);
        }
        if let Some(v) = reading.target_temperature {
            *self.target_temperature.write().await = Some(v);
        }
        if let Some(v) = reading.running_time {
            *self.running_time.write().await = Some(v);
        }

        *self.last_refresh.write().await = Some(Utc::now());
    }

    /// Ask the refresh loop to exit. Returns once the flag is cleared,
    /// not once the loop has actually exited; an in-flight fetch is
    /// allowed to drain.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("device sync stop requested");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Accessors — read one field under its guard, never touch the network
    // ========================================================================

    pub async fn current_temperature(&self) -> Option<f64> {
        *self.current_temperature.read().await
    }

    pub async fn current_humidity(&self) -> Option<f64> {
        *self.current_humidity.read().await
    }

    pub async fn target_temperature(&self) -> Option<f64> {
        *self.target_temperature.read().await
    }

    pub async fn running_time(&self) -> Option<f64> {
        *self.running_time.read().await
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.read().await
    }

    /// All four fields for `GET /data`. Fields may span refresh cycles.
    pub async fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            current_temperature: self.current_temperature().await,
            current_humidity: self.current_humidity().await,
            target_temperature: self.target_temperature().await,
            running_time: self.running_time().await,
        }
    }

    // ========================================================================
    // Commands — fire-and-forget, the next refresh picks up the result
    // ========================================================================

    pub async fn increase_target_temperature(&self) {
        self.send(DeviceCommand::IncreaseTargetTemperature).await;
    }

    pub async fn decrease_target_temperature(&self) {
        self.send(DeviceCommand::DecreaseTargetTemperature).await;
    }

    pub async fn increase_running_time(&self) {
        self.send(DeviceCommand::IncreaseRunningTime).await;
    }

    pub async fn decrease_running_time(&self) {
        self.send(DeviceCommand::DecreaseRunningTime).await;
    }

    /// Exactly one transport call per invocation, no retry. The snapshot
    /// is deliberately not touched: the device owns the authoritative
    /// value and the next refresh reflects it.
    async fn send(&self, command: DeviceCommand) {
        if let Err(e) = self.transport.send_command(command).await {
            tracing::warn!("device command {} failed: {}", command.as_str(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeviceError;

    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Instant;

    use async_trait::async_trait;

    /// Scriptable transport: queued fetch results, recorded calls,
    /// optional artificial fetch latency.
    struct FakeTransport {
        probe_ok: bool,
        responses: Mutex<VecDeque<Result<DeviceReading, DeviceError>>>,
        fetch_calls: AtomicUsize,
        commands: Mutex<Vec<&'static str>>,
        fetch_delay: Duration,
    }

    impl FakeTransport {
        fn new(probe_ok: bool) -> Self {
            Self {
                probe_ok,
                responses: Mutex::new(VecDeque::new()),
                fetch_calls: AtomicUsize::new(0),
                commands: Mutex::new(Vec::new()),
                fetch_delay: Duration::ZERO,
            }
        }

        fn with_responses(
            mut self,
            responses: Vec<Result<DeviceReading, DeviceError>>,
        ) -> Self {
            self.responses = Mutex::new(responses.into());
            self
        }

        fn with_fetch_delay(mut self, delay: Duration) -> Self {
            self.fetch_delay = delay;
            self
        }

        fn fetch_count(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DeviceTransport for FakeTransport {
        async fn probe(&self) -> bool {
            self.probe_ok
        }

        async fn fetch(&self) -> Result<DeviceReading, DeviceError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if !self.fetch_delay.is_zero() {
                tokio::time::sleep(self.fetch_delay).await;
            }
            // Once the script runs out, keep answering with an empty
            // reading (absent fields change nothing).
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(DeviceReading::default()))
        }

        async fn send_command(&self, command: DeviceCommand) -> Result<(), DeviceError> {
            self.commands.lock().unwrap().push(command.endpoint());
            Ok(())
        }
    }

    fn full_reading() -> DeviceReading {
        DeviceReading {
            current_temperature: Some(21.5),
            current_humidity: Some(43.0),
            target_temperature: Some(23.0),
            running_time: Some(120.0),
        }
    }

    #[tokio::test]
    async fn failed_probe_fails_construction_without_fetching() {
        let transport = Arc::new(FakeTransport::new(false));
        let result =
            DeviceSync::connect(transport.clone(), Duration::from_millis(10)).await;

        assert!(matches!(result, Err(ConnectError::ProbeFailed)));
        assert_eq!(transport.fetch_count(), 0);
    }

    #[tokio::test]
    async fn snapshot_starts_all_null() {
        let transport = Arc::new(FakeTransport::new(true));
        let sync = DeviceSync::connect(transport, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(sync.snapshot().await, DeviceSnapshot::default());
        assert!(sync.last_refresh().await.is_none());
        assert!(sync.is_running());
    }

    #[tokio::test]
    async fn refresh_populates_every_field_from_the_response() {
        let transport =
            Arc::new(FakeTransport::new(true).with_responses(vec![Ok(full_reading())]));
        let sync = DeviceSync::connect(transport, Duration::from_millis(10))
            .await
            .unwrap();

        sync.refresh().await;

        assert_eq!(sync.current_temperature().await, Some(21.5));
        assert_eq!(sync.current_humidity().await, Some(43.0));
        assert_eq!(sync.target_temperature().await, Some(23.0));
        assert_eq!(sync.running_time().await, Some(120.0));
        assert!(sync.last_refresh().await.is_some());
    }

    #[tokio::test]
    async fn absent_fields_keep_their_prior_value() {
        let partial = DeviceReading {
            current_temperature: Some(25.0),
            ..Default::default()
        };
        let transport = Arc::new(
            FakeTransport::new(true).with_responses(vec![Ok(full_reading()), Ok(partial)]),
        );
        let sync = DeviceSync::connect(transport, Duration::from_millis(10))
            .await
            .unwrap();

        sync.refresh().await;
        sync.refresh().await;

        assert_eq!(sync.current_temperature().await, Some(25.0));
        assert_eq!(sync.current_humidity().await, Some(43.0));
        assert_eq!(sync.target_temperature().await, Some(23.0));
        assert_eq!(sync.running_time().await, Some(120.0));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_the_snapshot_untouched() {
        let transport = Arc::new(FakeTransport::new(true).with_responses(vec![
            Ok(full_reading()),
            Err(DeviceError::Parse("not json".into())),
        ]));
        let sync = DeviceSync::connect(transport, Duration::from_millis(10))
            .await
            .unwrap();

        sync.refresh().await;
        let before = sync.snapshot().await;
        let refresh_before = sync.last_refresh().await;

        sync.refresh().await;

        assert_eq!(sync.snapshot().await, before);
        assert_eq!(sync.last_refresh().await, refresh_before);
    }

    #[tokio::test]
    async fn stop_halts_the_refresh_loop() {
        let transport = Arc::new(FakeTransport::new(true));
        let sync = DeviceSync::connect(transport.clone(), Duration::from_millis(10))
            .await
            .unwrap();

        let handle = sync.start();
        tokio::time::sleep(Duration::from_millis(55)).await;
        assert!(transport.fetch_count() >= 2);

        sync.stop();
        assert!(!sync.is_running());
        let drained = transport.fetch_count();

        tokio::time::sleep(Duration::from_millis(60)).await;
        // At most one in-flight fetch is allowed to drain after stop.
        assert!(transport.fetch_count() <= drained + 1);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn accessors_do_not_wait_on_a_slow_fetch() {
        let transport = Arc::new(
            FakeTransport::new(true).with_fetch_delay(Duration::from_millis(500)),
        );
        let sync = DeviceSync::connect(transport.clone(), Duration::from_millis(10))
            .await
            .unwrap();

        let handle = sync.start();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(transport.fetch_count() >= 1);

        let started = Instant::now();
        let _ = sync.current_temperature().await;
        let _ = sync.target_temperature().await;
        assert!(started.elapsed() < Duration::from_millis(100));

        sync.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn each_command_issues_exactly_one_mapped_call() {
        let transport = Arc::new(FakeTransport::new(true));
        let sync = DeviceSync::connect(transport.clone(), Duration::from_millis(10))
            .await
            .unwrap();

        sync.increase_target_temperature().await;
        sync.decrease_target_temperature().await;
        sync.increase_running_time().await;
        sync.decrease_running_time().await;

        let commands = transport.commands.lock().unwrap().clone();
        assert_eq!(
            commands,
            vec![
                "api/increase-target-temperature",
                "api/decrease-target-temperature",
                "api/increase-running-time",
                "api/decrease-running-time",
            ]
        );
    }

    #[tokio::test]
    async fn commands_do_not_touch_the_snapshot() {
        let transport =
            Arc::new(FakeTransport::new(true).with_responses(vec![Ok(full_reading())]));
        let sync = DeviceSync::connect(transport, Duration::from_millis(10))
            .await
            .unwrap();

        sync.refresh().await;
        let before = sync.snapshot().await;

        sync.increase_target_temperature().await;
        sync.decrease_running_time().await;

        assert_eq!(sync.snapshot().await, before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_readers_never_see_a_torn_field() {
        let transport = Arc::new(FakeTransport::new(true));
        let sync = DeviceSync::connect(transport, Duration::from_millis(10))
            .await
            .unwrap();

        let writer = {
            let sync = Arc::clone(&sync);
            tokio::spawn(async move {
                for i in 0..200u32 {
                    let value = if i % 2 == 0 { 1.0 } else { 2.0 };
                    sync.apply(DeviceReading {
                        current_temperature: Some(value),
                        ..Default::default()
                    })
                    .await;
                }
            })
        };

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let sync = Arc::clone(&sync);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let value = sync.current_temperature().await;
                        assert!(value.is_none() || value == Some(1.0) || value == Some(2.0));
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
