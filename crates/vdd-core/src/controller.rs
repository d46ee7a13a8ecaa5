//! Owner of the driver session.
//!
//! A [`Controller`] keeps the driver handle open while the driver is
//! healthy and pings it so the virtual displays do not expire. Two
//! background threads do the work:
//!
//! - the heartbeat loop sends UPDATE every `heartbeat_ms` while the last
//!   observed status is OK and a handle is open;
//! - the status loop polls the driver status every `status_poll_ms`,
//!   opening the handle when the driver becomes healthy and closing it
//!   when it stops being so.
//!
//! Status and handle live together behind one mutex and are only ever
//! replaced as a pair. Opening a handle is serialized by a second lock,
//! so at most one handle is ever open. Readers clone the `Arc` around the channel, so a
//! handle closed by the status loop stays valid until the last in-flight
//! exchange on it finishes; the OS handle is released when the final
//! reference drops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::ControllerConfig;
use crate::error::Operation;
use crate::ioctl::{self, DriverChannel};
use crate::status::{DeviceStatus, DriverVersion};
use crate::topology::DisplaySnapshot;
use crate::{VddError, VddResult};

/// Granularity at which the status loop notices cancellation.
const STATUS_SLICE: Duration = Duration::from_millis(50);

/// Platform access the controller needs.
pub trait DriverBackend: Send + Sync + 'static {
    type Channel: DriverChannel + 'static;

    /// Current driver health and installed version.
    fn query_status(&self) -> (DeviceStatus, DriverVersion);

    /// Opens a fresh communication handle. Dropping it closes the handle.
    fn open_channel(&self) -> VddResult<Self::Channel>;

    /// Resolves the driver-owned displays right now.
    fn displays(&self) -> DisplaySnapshot;
}

/// Time source for the background loops.
pub trait Clock: Send + Sync + 'static {
    fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Last observed status and the handle that goes with it.
struct Session<C> {
    status: DeviceStatus,
    channel: Option<Arc<C>>,
}

struct Shared<B: DriverBackend> {
    backend: B,
    clock: Box<dyn Clock>,
    config: ControllerConfig,
    session: Mutex<Session<B::Channel>>,
    /// Held by whoever is opening or closing the handle.
    opening: Mutex<()>,
    cancel: AtomicBool,
}

impl<B: DriverBackend> Shared<B> {
    fn session(&self) -> MutexGuard<'_, Session<B::Channel>> {
        // A panic while holding the lock cannot leave the pair half
        // written, so a poisoned lock is still usable.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn snapshot(&self) -> (DeviceStatus, Option<Arc<B::Channel>>) {
        let session = self.session();
        (session.status, session.channel.clone())
    }

    fn opening(&self) -> MutexGuard<'_, ()> {
        self.opening.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// One heartbeat tick: ping the driver if the session is healthy.
    fn heartbeat(&self) {
        let (status, channel) = self.snapshot();
        let Some(channel) = channel.filter(|_| status.is_ok()) else {
            return;
        };
        if let Err(e) = ioctl::update(channel.as_ref()) {
            tracing::debug!(error = %e, "heartbeat failed");
        }
    }

    /// One status tick: query the driver again and open or close the handle.
    fn poll_status(&self) {
        let _opening = self.opening();
        let (status, _) = self.backend.query_status();
        let (previous, has_channel) = {
            let session = self.session();
            (session.status, session.channel.is_some())
        };

        if status != previous {
            tracing::info!(from = %previous, to = %status, "driver status changed");
        }

        let opened = if status.is_ok() && !has_channel {
            self.open_validated()
        } else {
            None
        };

        let closed = {
            let mut session = self.session();
            session.status = status;
            if status.is_ok() {
                if let Some(opened) = opened {
                    session.channel = Some(opened);
                }
                None
            } else {
                session.channel.take()
            }
        };

        if closed.is_some() {
            tracing::info!("driver handle closed");
        }
    }

    /// Returns the open handle, opening it first if the status loop has
    /// not got to it yet. Leaves the observed status alone.
    fn ensure_channel(&self) -> VddResult<Arc<B::Channel>> {
        let _opening = self.opening();
        if let Some(channel) = self.session().channel.clone() {
            return Ok(channel);
        }

        let (status, _) = self.backend.query_status();
        if !status.is_ok() {
            return Err(VddError::DriverStatus(status));
        }
        let opened = self.open_validated().ok_or(VddError::HandleAcquisition)?;
        self.session().channel = Some(Arc::clone(&opened));
        Ok(opened)
    }

    /// Opens a handle and sends one UPDATE through it.
    fn open_validated(&self) -> Option<Arc<B::Channel>> {
        match self.backend.open_channel() {
            Ok(channel) => {
                if let Err(e) = ioctl::update(&channel) {
                    tracing::warn!(error = %e, "first update on new handle failed");
                }
                tracing::info!("driver handle opened");
                Some(Arc::new(channel))
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not open driver handle");
                None
            }
        }
    }

    /// Sleeps up to `total`, waking early on cancellation.
    fn sleep_interruptible(&self, total: Duration) {
        let mut left = total;
        while !left.is_zero() && !self.cancelled() {
            let step = left.min(STATUS_SLICE);
            self.clock.sleep(step);
            left = left.saturating_sub(step);
        }
    }

    fn heartbeat_loop(&self) {
        while !self.cancelled() {
            self.heartbeat();
            self.clock.sleep(self.config.heartbeat());
        }
    }

    fn status_loop(&self) {
        while !self.cancelled() {
            self.poll_status();
            self.sleep_interruptible(self.config.status_poll());
        }
    }
}

/// Owns the driver session and exposes the display operations.
pub struct Controller<B: DriverBackend> {
    shared: Arc<Shared<B>>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl<B: DriverBackend> Controller<B> {
    pub fn new(backend: B, config: ControllerConfig) -> Self {
        Self::with_clock(backend, config, SystemClock)
    }

    pub fn with_clock(backend: B, config: ControllerConfig, clock: impl Clock) -> Self {
        Self {
            shared: Arc::new(Shared {
                backend,
                clock: Box::new(clock),
                config,
                session: Mutex::new(Session {
                    status: DeviceStatus::Unknown,
                    channel: None,
                }),
                opening: Mutex::new(()),
                cancel: AtomicBool::new(false),
            }),
            loops: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the heartbeat and status loops. Calling it again while they
    /// run does nothing.
    pub fn start(&self) -> VddResult<()> {
        let mut loops = self.loops.lock().unwrap_or_else(|e| e.into_inner());
        if !loops.is_empty() {
            return Ok(());
        }
        self.shared.cancel.store(false, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        loops.push(
            thread::Builder::new()
                .name("vdd-heartbeat".into())
                .spawn(move || shared.heartbeat_loop())?,
        );

        let shared = Arc::clone(&self.shared);
        loops.push(
            thread::Builder::new()
                .name("vdd-status".into())
                .spawn(move || shared.status_loop())?,
        );

        tracing::info!(
            heartbeat_ms = self.shared.config.heartbeat_ms,
            status_poll_ms = self.shared.config.status_poll_ms,
            "controller started"
        );
        Ok(())
    }

    /// Cancels both loops, waits for them to exit, then closes the handle.
    pub fn stop(&self) {
        self.shared.cancel.store(true, Ordering::Release);

        let loops: Vec<_> = self
            .loops
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .drain(..)
            .collect();
        let was_running = !loops.is_empty();
        for handle in loops {
            let _ = handle.join();
        }

        let closed = {
            let _opening = self.shared.opening();
            self.shared.session().channel.take()
        };
        drop(closed);

        if was_running {
            tracing::info!("controller stopped");
        }
    }

    /// Queries the driver status directly, bypassing the last observation.
    pub fn query_status(&self) -> (DeviceStatus, DriverVersion) {
        self.shared.backend.query_status()
    }

    /// Whether the status loop currently holds an open handle.
    pub fn handle_open(&self) -> bool {
        self.shared.snapshot().1.is_some()
    }

    /// The driver-owned displays right now.
    pub fn displays(&self) -> DisplaySnapshot {
        self.shared.backend.displays()
    }

    /// Blocks until a handle is open or `timeout` has passed.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        let mut waited = Duration::ZERO;
        loop {
            if self.handle_open() {
                return true;
            }
            if waited >= timeout || self.shared.cancelled() {
                return false;
            }
            self.shared.clock.sleep(STATUS_SLICE);
            waited += STATUS_SLICE;
        }
    }

    /// Re-checks the status and returns a usable channel.
    fn ready_channel(&self) -> VddResult<Arc<B::Channel>> {
        let (status, _) = self.shared.backend.query_status();
        if !status.is_ok() {
            return Err(VddError::DriverStatus(status));
        }

        match self.shared.snapshot() {
            (_, Some(channel)) => Ok(channel),
            (_, None) => self.shared.ensure_channel(),
        }
    }

    /// Plugs in a new virtual display. Returns the driver index.
    pub fn add_display(&self) -> VddResult<u32> {
        let channel = self.ready_channel()?;

        let limit = self.shared.config.max_displays;
        let count = self.displays().count();
        if count >= limit as usize {
            return Err(VddError::ExceededDisplayLimit(limit));
        }

        let index = ioctl::add(channel.as_ref()).map_err(|e| {
            tracing::warn!(error = %e, "add display failed");
            VddError::OperationFailed(Operation::AddDisplay)
        })?;
        tracing::info!(index, "display added");
        Ok(index)
    }

    /// Unplugs the display with the given driver index.
    pub fn remove_display(&self, index: u16) -> VddResult<()> {
        let channel = self.ready_channel()?;
        ioctl::remove(channel.as_ref(), index).map_err(|e| {
            tracing::warn!(index, error = %e, "remove display failed");
            VddError::OperationFailed(Operation::RemoveDisplay)
        })?;
        tracing::info!(index, "display removed");
        Ok(())
    }

    /// Unplugs the active driver display with the highest address.
    ///
    /// Returns the removed index, or `None` when there was nothing to remove.
    pub fn remove_last_display(&self) -> VddResult<Option<u16>> {
        let snapshot = self.displays();
        let last = snapshot
            .displays
            .iter()
            .filter(|d| d.active)
            .max_by_key(|d| d.address)
            .and_then(|d| d.driver_index());

        match last {
            Some(index) => self.remove_display(index).map(|()| Some(index)),
            None => {
                // Still surface a driver that is not ready.
                self.ready_channel()?;
                Ok(None)
            }
        }
    }

    /// Unplugs every driver display. Stops at the first failure.
    pub fn remove_all_displays(&self) -> VddResult<usize> {
        let indices: Vec<u16> = self
            .displays()
            .displays
            .iter()
            .filter_map(|d| d.driver_index())
            .collect();

        for &index in &indices {
            self.remove_display(index)?;
        }
        Ok(indices.len())
    }

    /// Asks the driver for its version over the open handle.
    pub fn query_version(&self) -> VddResult<DriverVersion> {
        let channel = self.ready_channel()?;
        ioctl::version(channel.as_ref())
            .map(DriverVersion::from_ioctl)
            .map_err(|e| {
                tracing::debug!(error = %e, "version query failed");
                VddError::OperationFailed(Operation::QueryVersion)
            })
    }
}

impl<B: DriverBackend> Drop for Controller<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
