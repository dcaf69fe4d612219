//! Mock channel binding for testing.
//!
//! Provides a `MockBinding` that simulates a serial driver without requiring
//! actual hardware. Failures are scripted up front; every driver call is
//! recorded so tests can inspect ordering, counts and concurrency afterwards.

use super::error::PortError;
use super::traits::{ChannelBinding, FramingParams, SerialPortAdapter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Driver calls recorded by the mock, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockEvent {
    OpenAttempt,
    Opened,
    ParamsApplied,
    Write,
    Read,
    Closed,
}

/// Inner state of the mock driver, shared by the binding and every handle.
#[derive(Debug, Default)]
struct MockState {
    channels: Vec<String>,
    open_attempts: u32,
    opens: u32,
    closes: u32,
    /// Bumped on every successful open; a handle is live while its generation matches.
    generation: u64,
    live_generation: Option<u64>,
    fail_opens: u32,
    fail_opens_until: Option<Instant>,
    reject_params: bool,
    fail_writes: u32,
    fail_reads: u32,
    fail_close: bool,
    echo: bool,
    read_queue: VecDeque<Vec<u8>>,
    write_log: Vec<Vec<u8>>,
    events: Vec<(MockEvent, Instant)>,
    last_params: Option<FramingParams>,
    write_latency: Duration,
    in_flight: usize,
    max_in_flight: usize,
}

impl MockState {
    fn record(&mut self, event: MockEvent) {
        self.events.push((event, Instant::now()));
    }
}

/// Mock serial driver.
///
/// # Example
/// ```
/// use serial_session::port::{ChannelBinding, MockBinding, SerialPortAdapter};
///
/// let binding = MockBinding::new();
/// binding.enqueue_read(b"OK\r\n");
///
/// let mut handle = binding.open("MOCK0").unwrap();
/// handle.write_bytes(b"AT\r\n").unwrap();
///
/// let mut buffer = [0u8; 16];
/// let n = handle.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"OK\r\n");
/// assert_eq!(binding.write_log(), vec![b"AT\r\n".to_vec()]);
/// ```
#[derive(Clone, Default)]
pub struct MockBinding {
    state: Arc<Mutex<MockState>>,
}

impl MockBinding {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channels reported by `list_channels`.
    pub fn with_channels<I, S>(self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().channels = channels.into_iter().map(Into::into).collect();
        self
    }

    /// Fail the next `count` open attempts.
    pub fn fail_next_opens(&self, count: u32) {
        self.state.lock().fail_opens = count;
    }

    /// Fail every open attempt made before `deadline`.
    pub fn fail_opens_until(&self, deadline: Instant) {
        self.state.lock().fail_opens_until = Some(deadline);
    }

    /// Make `set_params` fail until turned off again.
    pub fn reject_params(&self, reject: bool) {
        self.state.lock().reject_params = reject;
    }

    /// Fail the next `count` writes.
    pub fn fail_next_writes(&self, count: u32) {
        self.state.lock().fail_writes = count;
    }

    /// Fail the next `count` reads with a hard I/O error.
    pub fn fail_next_reads(&self, count: u32) {
        self.state.lock().fail_reads = count;
    }

    /// Make `close` report an error (the handle is still released).
    pub fn fail_close(&self, fail: bool) {
        self.state.lock().fail_close = fail;
    }

    /// Queue every written payload as the next read chunk.
    pub fn set_echo(&self, echo: bool) {
        self.state.lock().echo = echo;
    }

    /// Delay applied inside each write while the call is in flight.
    pub fn set_write_latency(&self, latency: Duration) {
        self.state.lock().write_latency = latency;
    }

    /// Queue one chunk to be returned by a subsequent read.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.push_back(data.to_vec());
    }

    /// Mark the current handle as closed by the driver (device unplugged).
    pub fn simulate_unplug(&self) {
        self.state.lock().live_generation = None;
    }

    pub fn open_attempts(&self) -> u32 {
        self.state.lock().open_attempts
    }

    pub fn open_count(&self) -> u32 {
        self.state.lock().opens
    }

    pub fn close_count(&self) -> u32 {
        self.state.lock().closes
    }

    /// Whether a handle is currently open and live.
    pub fn has_live_handle(&self) -> bool {
        self.state.lock().live_generation.is_some()
    }

    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    pub fn events(&self) -> Vec<(MockEvent, Instant)> {
        self.state.lock().events.clone()
    }

    pub fn last_params(&self) -> Option<FramingParams> {
        self.state.lock().last_params
    }

    /// Highest number of writes that were ever in flight at once.
    pub fn max_concurrent_writes(&self) -> usize {
        self.state.lock().max_in_flight
    }
}

impl ChannelBinding for MockBinding {
    fn open(&self, channel_id: &str) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut state = self.state.lock();
        state.open_attempts += 1;
        state.record(MockEvent::OpenAttempt);

        if state.fail_opens > 0 {
            state.fail_opens -= 1;
            return Err(PortError::not_found(channel_id));
        }
        if state.fail_opens_until.is_some_and(|deadline| Instant::now() < deadline) {
            return Err(PortError::not_found(channel_id));
        }

        state.generation += 1;
        state.live_generation = Some(state.generation);
        state.opens += 1;
        state.record(MockEvent::Opened);

        Ok(Box::new(MockChannel {
            name: channel_id.to_string(),
            generation: state.generation,
            state: Arc::clone(&self.state),
        }))
    }

    fn list_channels(&self) -> Result<Vec<String>, PortError> {
        Ok(self.state.lock().channels.clone())
    }
}

impl std::fmt::Debug for MockBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockBinding")
            .field("opens", &state.opens)
            .field("closes", &state.closes)
            .field("live", &state.live_generation.is_some())
            .finish()
    }
}

/// Handle returned by `MockBinding::open`.
pub struct MockChannel {
    name: String,
    generation: u64,
    state: Arc<Mutex<MockState>>,
}

impl MockChannel {
    fn is_live(&self, state: &MockState) -> bool {
        state.live_generation == Some(self.generation)
    }
}

impl SerialPortAdapter for MockChannel {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let latency = {
            let mut state = self.state.lock();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.write_latency
        };

        if !latency.is_zero() {
            std::thread::sleep(latency);
        }

        let mut state = self.state.lock();
        state.in_flight -= 1;

        if !self.is_live(&state) {
            return Err(PortError::NotOpen);
        }
        if state.fail_writes > 0 {
            state.fail_writes -= 1;
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated write failure",
            )));
        }

        state.write_log.push(data.to_vec());
        state.record(MockEvent::Write);
        if state.echo {
            state.read_queue.push_back(data.to_vec());
        }
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();
        state.record(MockEvent::Read);

        if !self.is_live(&state) {
            return Err(PortError::NotOpen);
        }
        if state.fail_reads > 0 {
            state.fail_reads -= 1;
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated read failure",
            )));
        }

        let Some(mut chunk) = state.read_queue.pop_front() else {
            return Err(PortError::NoData);
        };
        if chunk.len() > buffer.len() {
            let rest = chunk.split_off(buffer.len());
            state.read_queue.push_front(rest);
        }
        buffer[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_params(&mut self, params: &FramingParams) -> Result<(), PortError> {
        let mut state = self.state.lock();
        if state.reject_params {
            return Err(PortError::config(format!(
                "baud rate {} rejected",
                params.baud_rate
            )));
        }
        state.last_params = Some(*params);
        state.record(MockEvent::ParamsApplied);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.is_live(&self.state.lock())
    }

    fn close(self: Box<Self>) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.closes += 1;
        state.record(MockEvent::Closed);
        if self.is_live(&state) {
            state.live_generation = None;
        }
        if state.fail_close {
            return Err(PortError::Io(std::io::Error::other("simulated close failure")));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .finish()
    }
}
