//! Mock transport for deterministic testing of protocol engines.
//!
//! [`MockTransport`] implements the [`Transport`] trait with pre-loaded
//! request/response pairs. This lets you test command encoding and reply
//! decoding without an amplifier on the bench.
//!
//! The mock is a cheap handle around shared state: clone it before handing
//! it to the code under test and keep the clone to inspect what was sent.
//!
//! # Example
//!
//! ```
//! use ampctl_test_harness::MockTransport;
//!
//! let mock = MockTransport::new();
//! // When the driver sends this request, return this reply line.
//! mock.expect(b"(1vl?)", b"3=Error 1: No ~ detected\r\n");
//! // A write the device never answers.
//! mock.expect_write(b"(1on)");
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ampctl_core::error::{Error, Result};
use ampctl_core::transport::Transport;

/// Callback used by [`MockTransport::with_responder`] to answer a send.
pub type Responder = Box<dyn Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync>;

/// A pre-loaded request/response pair for the mock transport.
#[derive(Debug, Clone)]
struct Expectation {
    /// The exact bytes we expect to be sent.
    request: Vec<u8>,
    /// The bytes to queue for reading when the matching request is received.
    response: Vec<u8>,
}

/// One entry in the mock's traffic log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// Bytes passed to `send()`.
    Sent(Vec<u8>),
    /// Bytes returned from `receive()`.
    Received(Vec<u8>),
}

enum Mode {
    /// Every send must match the next expectation.
    Strict,
    /// Sends are logged and never answered.
    Recording,
    /// Sends are answered by a callback.
    Responder(Responder),
}

struct MockState {
    mode: Mode,
    expectations: VecDeque<Expectation>,
    /// Bytes waiting to be returned by `receive()`.
    rx: VecDeque<u8>,
    connected: bool,
    fail_sends: bool,
    log: Vec<MockEvent>,
}

/// A mock [`Transport`] for testing protocol engines without hardware.
///
/// In the default strict mode, expectations are consumed in order: each
/// `send()` must match the next expectation, and its response bytes become
/// readable. Unsolicited bytes can be queued with
/// [`push_unsolicited`](MockTransport::push_unsolicited). When nothing is
/// queued, `receive()` returns [`Error::Timeout`] immediately.
#[derive(Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    /// Create a strict mock in the connected state.
    pub fn new() -> Self {
        Self::with_mode(Mode::Strict)
    }

    /// Create a mock that accepts any send and never answers.
    ///
    /// Models an amplifier whose serial adapter is present but whose
    /// firmware is silent (powered off, wedged).
    pub fn recording() -> Self {
        Self::with_mode(Mode::Recording)
    }

    /// Create a mock that answers each send through `responder`.
    ///
    /// Returning `None` leaves the send unanswered.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&[u8]) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        Self::with_mode(Mode::Responder(Box::new(responder)))
    }

    fn with_mode(mode: Mode) -> Self {
        MockTransport {
            state: Arc::new(Mutex::new(MockState {
                mode,
                expectations: VecDeque::new(),
                rx: VecDeque::new(),
                connected: true,
                fail_sends: false,
                log: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not cascade into every other assertion.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add an expected request/response pair.
    pub fn expect(&self, request: &[u8], response: &[u8]) {
        self.lock().expectations.push_back(Expectation {
            request: request.to_vec(),
            response: response.to_vec(),
        });
    }

    /// Add an expected request that the device does not answer.
    pub fn expect_write(&self, request: &[u8]) {
        self.expect(request, b"");
    }

    /// Queue bytes that the device sends without being asked.
    pub fn push_unsolicited(&self, data: &[u8]) {
        self.lock().rx.extend(data.iter().copied());
    }

    /// All data sent through this transport, one element per `send()`.
    pub fn sent_data(&self) -> Vec<Vec<u8>> {
        self.lock()
            .log
            .iter()
            .filter_map(|e| match e {
                MockEvent::Sent(d) => Some(d.clone()),
                MockEvent::Received(_) => None,
            })
            .collect()
    }

    /// Sent data decoded as (lossy) UTF-8 strings.
    pub fn sent_strings(&self) -> Vec<String> {
        self.sent_data()
            .iter()
            .map(|d| String::from_utf8_lossy(d).into_owned())
            .collect()
    }

    /// The full ordered traffic log.
    pub fn events(&self) -> Vec<MockEvent> {
        self.lock().log.clone()
    }

    /// Return the number of expectations that have not yet been consumed.
    pub fn remaining_expectations(&self) -> usize {
        self.lock().expectations.len()
    }

    /// Set the connected state of the mock transport.
    ///
    /// When set to `false`, subsequent `send()` and `receive()` calls will
    /// return [`Error::NotConnected`].
    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    /// Make every subsequent `send()` fail with [`Error::ConnectionLost`].
    pub fn fail_sends(&self, fail: bool) {
        self.lock().fail_sends = fail;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MockTransport")
            .field("expectations", &state.expectations.len())
            .field("rx_pending", &state.rx.len())
            .field("connected", &state.connected)
            .finish()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if !state.connected {
            return Err(Error::NotConnected);
        }
        if state.fail_sends {
            return Err(Error::ConnectionLost);
        }

        state.log.push(MockEvent::Sent(data.to_vec()));

        let response = match &state.mode {
            Mode::Recording => None,
            Mode::Responder(respond) => respond(data),
            Mode::Strict => {
                let expectation = state.expectations.pop_front().ok_or_else(|| {
                    Error::Protocol("no more expectations in mock transport".into())
                })?;
                if data != expectation.request.as_slice() {
                    return Err(Error::Protocol(format!(
                        "unexpected send data: expected {:?}, got {:?}",
                        String::from_utf8_lossy(&expectation.request),
                        String::from_utf8_lossy(data)
                    )));
                }
                Some(expectation.response)
            }
        };

        if let Some(response) = response {
            state.rx.extend(response);
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize> {
        let mut state = self.lock();
        if !state.connected {
            return Err(Error::NotConnected);
        }
        if state.rx.is_empty() {
            return Err(Error::Timeout);
        }

        let n = state.rx.len().min(buf.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        state.log.push(MockEvent::Received(buf[..n].to_vec()));
        Ok(n)
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.lock();
        state.connected = false;
        state.rx.clear();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_transport_basic_send_receive() {
        let mut mock = MockTransport::new();
        mock.expect(b"(vr?)", b"AE6MC v2.1\r\n");

        mock.send(b"(vr?)").await.unwrap();

        let mut buf = [0u8; 64];
        let n = mock
            .receive(&mut buf, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(&buf[..n], b"AE6MC v2.1\r\n");
    }

    #[tokio::test]
    async fn mock_transport_tracks_sent_data() {
        let mut mock = MockTransport::new();
        mock.expect_write(b"(1on)");
        mock.expect_write(b"(2of)");

        let handle = mock.clone();
        mock.send(b"(1on)").await.unwrap();
        mock.send(b"(2of)").await.unwrap();

        assert_eq!(handle.sent_strings(), vec!["(1on)", "(2of)"]);
    }

    #[tokio::test]
    async fn mock_transport_wrong_data_errors() {
        let mut mock = MockTransport::new();
        mock.expect_write(b"(1on)");

        let result = mock.send(b"(1of)").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_no_expectations_errors() {
        let mut mock = MockTransport::new();
        let result = mock.send(b"(rx)").await;
        assert!(matches!(result.unwrap_err(), Error::Protocol(_)));
    }

    #[tokio::test]
    async fn mock_transport_receive_without_data_times_out() {
        let mut mock = MockTransport::new();
        let mut buf = [0u8; 64];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
    }

    #[tokio::test]
    async fn mock_transport_recording_accepts_anything() {
        let mut mock = MockTransport::recording();
        mock.send(b"(1vl?)").await.unwrap();
        mock.send(b"(amu)").await.unwrap();

        let mut buf = [0u8; 8];
        let result = mock.receive(&mut buf, Duration::from_millis(10)).await;
        assert!(matches!(result.unwrap_err(), Error::Timeout));
        assert_eq!(mock.sent_data().len(), 2);
    }

    #[tokio::test]
    async fn mock_transport_responder() {
        let mut mock = MockTransport::with_responder(|cmd| {
            (cmd == b"(vr?)").then(|| b"v1\n".to_vec())
        });
        mock.send(b"(1on)").await.unwrap();
        mock.send(b"(vr?)").await.unwrap();

        let mut buf = [0u8; 8];
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], b"v1\n");
        assert_eq!(
            mock.events(),
            vec![
                MockEvent::Sent(b"(1on)".to_vec()),
                MockEvent::Sent(b"(vr?)".to_vec()),
                MockEvent::Received(b"v1\n".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn mock_transport_unsolicited_and_partial_receive() {
        let mut mock = MockTransport::new();
        mock.push_unsolicited(b"ABCD");

        let mut buf = [0u8; 2];
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], b"AB");
        let n = mock.receive(&mut buf, Duration::from_millis(10)).await.unwrap();
        assert_eq!(&buf[..n], b"CD");
    }

    #[tokio::test]
    async fn mock_transport_disconnect() {
        let mut mock = MockTransport::new();
        assert!(mock.is_connected());

        mock.close().await.unwrap();
        assert!(!mock.is_connected());

        let result = mock.send(b"(rx)").await;
        assert!(matches!(result.unwrap_err(), Error::NotConnected));
    }

    #[tokio::test]
    async fn mock_transport_fail_sends() {
        let mut mock = MockTransport::recording();
        mock.fail_sends(true);
        let result = mock.send(b"(rx)").await;
        assert!(matches!(result.unwrap_err(), Error::ConnectionLost));
    }
}
