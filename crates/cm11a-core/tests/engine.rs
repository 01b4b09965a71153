use cm11a_core::protocol::{Engine, Handler, Link, ProtocolError, Transport};
use cm11a_core::reactor::{Readiness, WaitHandle, WaitObjects};
use pretty_assertions::assert_eq;
use std::collections::VecDeque;
use std::io;

const HANDLE: WaitHandle = WaitHandle::from_raw(42);

/// Scripted in-memory transport for testing
struct MockTransport {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    write_chunk: usize,
    writable_now: bool,
    fail_on_read: bool,
    fail_on_write: bool,
}

impl MockTransport {
    fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            tx: Vec::new(),
            write_chunk: usize::MAX,
            writable_now: true,
            fail_on_read: false,
            fail_on_write: false,
        }
    }

    fn with_input(input: &[u8]) -> Self {
        let mut mock = Self::new();
        mock.rx.extend(input);
        mock
    }
}

impl Transport for MockTransport {
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_on_read {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "serial read failed"));
        }
        match self.rx.pop_front() {
            Some(b) if !buf.is_empty() => {
                buf[0] = b;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    fn write_nonblocking(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.fail_on_write {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "serial write failed"));
        }
        let n = buf.len().min(self.write_chunk);
        self.tx.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn wait_handle(&self) -> WaitHandle {
        HANDLE
    }

    fn poll_writable(&mut self) -> io::Result<bool> {
        Ok(self.writable_now)
    }
}

/// Records every callback into the host state
#[derive(Default)]
struct Recorder;

impl Handler<Vec<&'static str>> for Recorder {
    fn interface_ready(&mut self, link: &mut Link<'_, Vec<&'static str>>) -> Result<(), ProtocolError> {
        link.user_mut().push("interface_ready");
        Ok(())
    }

    fn interface_poll(&mut self, link: &mut Link<'_, Vec<&'static str>>) -> Result<(), ProtocolError> {
        link.user_mut().push("interface_poll");
        Ok(())
    }

    fn time_request(&mut self, link: &mut Link<'_, Vec<&'static str>>) -> Result<(), ProtocolError> {
        link.user_mut().push("time_request");
        Ok(())
    }

    fn checksum_ok(&mut self, link: &mut Link<'_, Vec<&'static str>>) -> Result<(), ProtocolError> {
        link.user_mut().push("checksum_ok");
        Ok(())
    }

    fn checksum_not_ok(&mut self, link: &mut Link<'_, Vec<&'static str>>) -> Result<(), ProtocolError> {
        link.user_mut().push("checksum_not_ok");
        Ok(())
    }

    fn write_drained(&mut self, link: &mut Link<'_, Vec<&'static str>>) -> Result<(), ProtocolError> {
        link.user_mut().push("write_drained");
        Ok(())
    }
}

fn engine(mock: MockTransport) -> Engine<MockTransport, Vec<&'static str>> {
    Engine::with_handler(mock, Vec::new(), Recorder)
}

fn readable() -> Readiness {
    Readiness::none().readable(HANDLE)
}

fn writable() -> Readiness {
    Readiness::none().writable(HANDLE)
}

#[test]
fn test_expected_checksum_is_truncated_sum() {
    let frames: [&[u8]; 4] = [&[0x04, 0x6E], &[0x06, 0x62], &[0xFF, 0xFF, 0xFF], &[0x9B, 1, 2, 3, 4, 5, 0x60]];
    for frame in frames {
        let mut e = engine(MockTransport::new());
        e.submit_with_checksum(frame).unwrap();
        let sum: u32 = frame.iter().map(|b| *b as u32).sum();
        assert!(e.want_checksum());
        assert_eq!(e.expected_checksum(), (sum & 0xFF) as u8);
    }
}

#[test]
fn test_second_write_rejected_and_first_untouched() {
    let mut mock = MockTransport::new();
    mock.write_chunk = 1;
    let mut e = engine(mock);
    e.submit_with_checksum(&[0x04, 0x6E]).unwrap();
    e.check_wait_objects(&writable()).unwrap();
    assert_eq!(e.bytes_sent(), 1);

    assert!(matches!(e.submit(&[0x00]), Err(ProtocolError::AlreadyPending)));
    assert!(matches!(
        e.submit_with_checksum(&[0x06, 0x62]),
        Err(ProtocolError::AlreadyPending)
    ));
    assert_eq!(e.pending_write(), Some(&[0x04, 0x6E][..]));
    assert_eq!(e.bytes_sent(), 1);
    assert_eq!(e.expected_checksum(), 0x72);
}

#[test]
fn test_full_drain_fires_callback_once() {
    let mut e = engine(MockTransport::new());
    e.submit_with_checksum(&[0x04, 0x6E]).unwrap();
    e.check_wait_objects(&writable()).unwrap();

    assert!(!e.is_write_pending());
    assert_eq!(e.pending_write(), None);
    assert_eq!(e.transport().tx, vec![0x04, 0x6E]);
    assert_eq!(e.user(), &vec!["write_drained"]);

    // Nothing left: further writable ticks do not fire again
    e.check_wait_objects(&writable()).unwrap();
    assert_eq!(e.user(), &vec!["write_drained"]);
    assert_eq!(e.get_counters(), (0, 2));
}

#[test]
fn test_partial_writes_across_ticks() {
    let mut mock = MockTransport::new();
    mock.write_chunk = 1;
    let mut e = engine(mock);
    e.submit(&[1, 2, 3]).unwrap();

    e.check_wait_objects(&writable()).unwrap();
    e.check_wait_objects(&writable()).unwrap();
    assert!(e.is_write_pending());
    assert_eq!(e.bytes_sent(), 2);
    assert!(e.user().is_empty());

    e.check_wait_objects(&writable()).unwrap();
    assert!(!e.is_write_pending());
    assert_eq!(e.transport().tx, vec![1, 2, 3]);
    assert_eq!(e.user(), &vec!["write_drained"]);
}

#[test]
fn test_address_frame_checksum_ok() {
    let mut e = engine(MockTransport::with_input(&[0x72]));
    e.submit_with_checksum(&[0x04, 0x6E]).unwrap();
    assert_eq!(e.expected_checksum(), 0x72);
    e.check_wait_objects(&writable()).unwrap();

    e.check_wait_objects(&readable()).unwrap();
    assert_eq!(e.user(), &vec!["write_drained", "checksum_ok"]);
    assert!(!e.want_checksum());
}

#[test]
fn test_function_frame_checksum_not_ok() {
    let mut e = engine(MockTransport::with_input(&[0x00]));
    e.submit_with_checksum(&[0x06, 0x62]).unwrap();
    assert_eq!(e.expected_checksum(), 0x68);
    e.check_wait_objects(&writable()).unwrap();

    e.check_wait_objects(&readable()).unwrap();
    assert_eq!(e.user(), &vec!["write_drained", "checksum_not_ok"]);
    assert!(!e.want_checksum());
}

#[test]
fn test_echo_consumes_exactly_one_byte() {
    // Wrong echo, then an opcode: the opcode must be seen as an opcode
    let mut e = engine(MockTransport::with_input(&[0x13, 0x55]));
    e.submit_with_checksum(&[0x04, 0x6E]).unwrap();
    e.check_wait_objects(&writable()).unwrap();

    e.check_wait_objects(&readable()).unwrap();
    e.check_wait_objects(&readable()).unwrap();
    assert_eq!(
        e.user(),
        &vec!["write_drained", "checksum_not_ok", "interface_ready"]
    );
}

#[test]
fn test_opcodes_route_to_callbacks() {
    let mut e = engine(MockTransport::with_input(&[0x55, 0x5A, 0xA5]));
    for _ in 0..3 {
        e.check_wait_objects(&readable()).unwrap();
    }
    assert_eq!(
        e.user(),
        &vec!["interface_ready", "interface_poll", "time_request"]
    );
    assert_eq!(e.get_counters(), (3, 0));
}

#[test]
fn test_poll_without_pending_write() {
    let mut e = engine(MockTransport::with_input(&[0x5A]));
    e.check_wait_objects(&readable()).unwrap();
    assert_eq!(e.user(), &vec!["interface_poll"]);
    assert!(!e.want_checksum());
    assert!(!e.is_write_pending());
}

#[test]
fn test_unknown_opcode_invokes_nothing() {
    let mut e = engine(MockTransport::with_input(&[0x42]));
    let err = e.check_wait_objects(&readable()).unwrap_err();
    assert!(matches!(err, ProtocolError::UnknownOpcode(0x42)));
    assert!(!err.is_fatal());
    assert!(e.user().is_empty());
}

#[test]
fn test_wait_objects() {
    let mut e = engine(MockTransport::new());

    let mut objs = WaitObjects::new();
    e.get_wait_objects(&mut objs);
    assert_eq!(objs.read, vec![HANDLE]);
    assert!(objs.write.is_empty());
    assert_eq!(objs.timeout, None);

    e.submit(&[0x00]).unwrap();
    let mut first = WaitObjects::new();
    let mut second = WaitObjects::new();
    e.get_wait_objects(&mut first);
    e.get_wait_objects(&mut second);
    assert_eq!(first, second);
    assert_eq!(first.read, vec![HANDLE]);
    assert_eq!(first.write, vec![HANDLE]);
}

#[test]
fn test_readable_but_empty_is_fatal() {
    let mut e = engine(MockTransport::new());
    let err = e.check_wait_objects(&readable()).unwrap_err();
    assert!(matches!(err, ProtocolError::TransportReadFailed(_)));
    assert!(err.is_fatal());
}

#[test]
fn test_read_failure_skips_write_step() {
    let mut mock = MockTransport::new();
    mock.fail_on_read = true;
    let mut e = engine(mock);
    e.submit(&[0x00]).unwrap();

    let ready = Readiness::none().readable(HANDLE).writable(HANDLE);
    assert!(matches!(
        e.check_wait_objects(&ready),
        Err(ProtocolError::TransportReadFailed(_))
    ));
    assert!(e.is_write_pending());
    assert!(e.transport().tx.is_empty());
}

#[test]
fn test_write_failure() {
    let mut mock = MockTransport::new();
    mock.fail_on_write = true;
    let mut e = engine(mock);
    e.submit(&[0x00]).unwrap();
    assert!(matches!(
        e.check_wait_objects(&writable()),
        Err(ProtocolError::TransportWriteFailed(_))
    ));
}

#[test]
fn test_idle_tick_does_nothing() {
    let mut e = engine(MockTransport::with_input(&[0x55]));
    e.submit(&[0x00]).unwrap();
    e.check_wait_objects(&Readiness::none()).unwrap();
    assert!(e.is_write_pending());
    assert!(e.user().is_empty());
    assert_eq!(e.transport().rx.len(), 1);
}

/// Answers every interface-ready with a fixed frame, fails on time requests
struct Responder;

impl Handler<()> for Responder {
    fn interface_ready(&mut self, link: &mut Link<'_, ()>) -> Result<(), ProtocolError> {
        link.submit(&[0xC3])
    }

    fn time_request(&mut self, _link: &mut Link<'_, ()>) -> Result<(), ProtocolError> {
        Err(ProtocolError::Callback("no clock".to_string()))
    }
}

#[test]
fn test_write_from_callback_drains_same_tick() {
    let mut e = Engine::with_handler(MockTransport::with_input(&[0x55]), (), Responder);
    e.check_wait_objects(&readable()).unwrap();
    assert!(!e.is_write_pending());
    assert_eq!(e.transport().tx, vec![0xC3]);
}

#[test]
fn test_write_from_callback_deferred_when_not_writable() {
    let mut mock = MockTransport::with_input(&[0x55]);
    mock.writable_now = false;
    let mut e = Engine::with_handler(mock, (), Responder);
    e.check_wait_objects(&readable()).unwrap();
    assert!(e.is_write_pending());

    let mut objs = WaitObjects::new();
    e.get_wait_objects(&mut objs);
    assert_eq!(objs.write, vec![HANDLE]);
    e.check_wait_objects(&writable()).unwrap();
    assert_eq!(e.transport().tx, vec![0xC3]);
}

#[test]
fn test_callback_error_propagates_and_skips_write() {
    let mut e = Engine::with_handler(MockTransport::with_input(&[0xA5]), (), Responder);
    e.submit(&[0x00]).unwrap();
    let ready = Readiness::none().readable(HANDLE).writable(HANDLE);
    match e.check_wait_objects(&ready) {
        Err(ProtocolError::Callback(msg)) => assert_eq!(msg, "no clock"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(e.is_write_pending());
}

#[test]
fn test_default_handler_and_set_handler() {
    let mut e = Engine::new(MockTransport::with_input(&[0x55, 0x55]), ());
    e.check_wait_objects(&readable()).unwrap();
    assert!(!e.is_write_pending());

    e.set_handler(Responder);
    e.check_wait_objects(&readable()).unwrap();
    assert_eq!(e.transport().tx, vec![0xC3]);
}

#[test]
fn test_close_returns_user_state() {
    let mut e = engine(MockTransport::with_input(&[0x5A]));
    e.check_wait_objects(&readable()).unwrap();
    assert_eq!(e.close(), vec!["interface_poll"]);
}
