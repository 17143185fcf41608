//! Mock transport for testing
//!
//! A scripted, in-memory stand-in for the gaussmeter link. It provides:
//! - Per-command canned replies, persistent or one-shot
//! - Silent and late replies to exercise timeouts and flushing
//! - Controllable open/write failure injection
//! - Call logging and handle counters for test verification
//!
//! Clones share state, so a test can keep one handle while the adapter owns
//! another.

use super::{strip_terminator, Framing, Transport};
use crate::error::{AppResult, DaqError, ProtocolError};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How the mock answers one command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MockReply {
    /// Reply text as it appears on the wire (terminator optional)
    Line(String),
    /// Never answer
    Silent,
    /// Answer only after the caller's read deadline has passed
    Late(String),
}

#[derive(Default)]
struct MockState {
    open: bool,
    unreachable: bool,
    latency: Duration,
    responses: HashMap<String, String>,
    scripted: HashMap<String, VecDeque<MockReply>>,
    failing_writes: HashSet<String>,
    fail_next_write: bool,
    input: VecDeque<String>,
    late: Option<String>,
    frames: Vec<String>,
    call_log: Vec<String>,
    open_count: usize,
    release_count: usize,
    flush_count: usize,
}

/// Mock transport for testing
///
/// # Example
///
/// ```
/// use hgm_daq::adapters::{MockAdapter, Transport};
///
/// # tokio_test::block_on(async {
/// let mock = MockAdapter::new().on(":MEAS?", "1.23456\n\r");
/// let mut transport = mock.clone();
/// transport.open().await.unwrap();
/// transport.write_line(":MEAS?").await.unwrap();
/// let reply = transport.read_line(std::time::Duration::from_millis(10)).await.unwrap();
/// assert_eq!(reply, "1.23456");
/// assert_eq!(mock.frames(), vec![":MEAS?".to_string()]);
/// # });
/// ```
#[derive(Clone)]
pub struct MockAdapter {
    framing: Framing,
    state: Arc<Mutex<MockState>>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    /// Create a closed mock with HGM framing and no scripted replies
    pub fn new() -> Self {
        Self {
            framing: Framing {
                write_terminator: "\r".to_string(),
                read_terminator: "\n\r".to_string(),
            },
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Use different terminators
    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    /// Delay every write, to widen race windows in concurrency tests
    pub fn with_latency(self, latency: Duration) -> Self {
        self.lock().latency = latency;
        self
    }

    /// Answer `command` with `reply` every time it is written
    pub fn on(self, command: &str, reply: &str) -> Self {
        self.lock()
            .responses
            .insert(command.to_string(), reply.to_string());
        self
    }

    /// Answer the next write of `command` with `reply`; takes priority over [`on`](Self::on)
    pub fn on_once(self, command: &str, reply: MockReply) -> Self {
        self.lock()
            .scripted
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Make every `open()` fail
    pub fn unreachable(self) -> Self {
        self.lock().unreachable = true;
        self
    }

    /// Make every write of `command` fail with an I/O error
    pub fn fail_write_on(&self, command: &str) {
        self.lock().failing_writes.insert(command.to_string());
    }

    /// Make the next write fail with an I/O error
    pub fn fail_next_write(&self) {
        self.lock().fail_next_write = true;
    }

    /// Frames written so far, without terminators
    pub fn frames(&self) -> Vec<String> {
        self.lock().frames.clone()
    }

    /// Every transport call, in order
    pub fn call_log(&self) -> Vec<String> {
        self.lock().call_log.clone()
    }

    /// Clear frames and call log
    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.frames.clear();
        state.call_log.clear();
    }

    /// Successful opens of a closed handle
    pub fn open_count(&self) -> usize {
        self.lock().open_count
    }

    /// Times an open handle was released
    pub fn release_count(&self) -> usize {
        self.lock().release_count
    }

    /// Input flushes that discarded at least one pending reply
    pub fn flush_count(&self) -> usize {
        self.lock().flush_count
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Transport for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn info(&self) -> String {
        format!("MockAdapter(open = {})", self.lock().open)
    }

    async fn open(&mut self) -> AppResult<()> {
        let mut state = self.lock();
        state.call_log.push("open".to_string());
        if state.unreachable {
            return Err(DaqError::Connection(
                "Mock instrument unreachable".to_string(),
            ));
        }
        if !state.open {
            state.open = true;
            state.open_count += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.lock();
        if state.open {
            state.open = false;
            state.release_count += 1;
            state.call_log.push("close".to_string());
        }
    }

    fn is_open(&self) -> bool {
        self.lock().open
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        let latency = {
            let mut state = self.lock();
            if !state.open {
                return Err(ProtocolError::NotConnected);
            }
            state.call_log.push(format!("write {}", line));

            let discarded = state.input.len() + usize::from(state.late.is_some());
            state.input.clear();
            state.late = None;
            if discarded > 0 {
                state.flush_count += 1;
            }

            let fail_next = std::mem::take(&mut state.fail_next_write);
            if fail_next || state.failing_writes.contains(line) {
                return Err(ProtocolError::Io(format!("Injected write failure on {}", line)));
            }
            state.frames.push(line.to_string());

            let reply = match state.scripted.get_mut(line).and_then(VecDeque::pop_front) {
                Some(reply) => reply,
                None => state
                    .responses
                    .get(line)
                    .cloned()
                    .map_or(MockReply::Silent, MockReply::Line),
            };
            match reply {
                MockReply::Line(text) => state.input.push_back(text),
                MockReply::Late(text) => state.late = Some(text),
                MockReply::Silent => {}
            }
            state.latency
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        let mut state = self.lock();
        if !state.open {
            return Err(ProtocolError::NotConnected);
        }
        state.call_log.push("read".to_string());

        if let Some(raw) = state.input.pop_front() {
            return Ok(strip_terminator(&raw, &self.framing.read_terminator).to_string());
        }

        // A late reply lands in the input buffer once the deadline has passed
        if let Some(text) = state.late.take() {
            state.input.push_back(text);
        }
        Err(ProtocolError::Timeout(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(20);

    #[tokio::test]
    async fn test_scripted_reply() {
        let mut mock = MockAdapter::new().on(":RANG?", "2\n\r");
        mock.open().await.unwrap();
        mock.write_line(":RANG?").await.unwrap();
        assert_eq!(mock.read_line(TIMEOUT).await.unwrap(), "2");
        mock.write_line(":RANG?").await.unwrap();
        assert_eq!(mock.read_line(TIMEOUT).await.unwrap(), "2");
    }

    #[tokio::test]
    async fn test_unknown_command_times_out() {
        let mut mock = MockAdapter::new();
        mock.open().await.unwrap();
        mock.write_line(":FOO?").await.unwrap();
        assert_eq!(
            mock.read_line(TIMEOUT).await,
            Err(ProtocolError::Timeout(TIMEOUT))
        );
    }

    #[tokio::test]
    async fn test_once_reply_takes_priority() {
        let mut mock = MockAdapter::new()
            .on(":MEAS?", "1.0\n\r")
            .on_once(":MEAS?", MockReply::Line("2.0\n\r".to_string()));
        mock.open().await.unwrap();
        mock.write_line(":MEAS?").await.unwrap();
        assert_eq!(mock.read_line(TIMEOUT).await.unwrap(), "2.0");
        mock.write_line(":MEAS?").await.unwrap();
        assert_eq!(mock.read_line(TIMEOUT).await.unwrap(), "1.0");
    }

    #[tokio::test]
    async fn test_late_reply_is_flushed_by_next_write() {
        let mut mock = MockAdapter::new()
            .on_once(":MEAS?", MockReply::Late("9.99999\n\r".to_string()))
            .on(":UNIT?", "TESL\n\r");
        mock.open().await.unwrap();

        mock.write_line(":MEAS?").await.unwrap();
        assert!(mock.read_line(TIMEOUT).await.is_err());

        mock.write_line(":UNIT?").await.unwrap();
        assert_eq!(mock.read_line(TIMEOUT).await.unwrap(), "TESL");
        assert_eq!(mock.flush_count(), 1);
    }

    #[tokio::test]
    async fn test_io_requires_open() {
        let mut mock = MockAdapter::new();
        assert_eq!(
            mock.write_line(":MEAS?").await,
            Err(ProtocolError::NotConnected)
        );
        assert_eq!(
            mock.read_line(TIMEOUT).await,
            Err(ProtocolError::NotConnected)
        );
    }

    #[tokio::test]
    async fn test_open_close_counters() {
        let handle = MockAdapter::new();
        let mut mock = handle.clone();
        mock.open().await.unwrap();
        mock.open().await.unwrap();
        mock.close();
        mock.close();
        assert_eq!(handle.open_count(), 1);
        assert_eq!(handle.release_count(), 1);
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_unreachable_and_write_failures() {
        let mut mock = MockAdapter::new().unreachable();
        assert!(matches!(mock.open().await, Err(DaqError::Connection(_))));

        let mut mock = MockAdapter::new();
        mock.open().await.unwrap();
        mock.fail_next_write();
        assert!(matches!(
            mock.write_line(":MEAS?").await,
            Err(ProtocolError::Io(_))
        ));
        mock.write_line(":MEAS?").await.unwrap();
        assert_eq!(mock.frames(), vec![":MEAS?".to_string()]);
    }
}
