// src/connection.rs
//
// Serial connection lifecycle:
//   Disconnected -(open)-> Connected -(read fault)-> Disconnected
//   Connected | Disconnected -(close)-> Closed (terminal)
//
// The handle is released in Drop, so every exit path closes the port.

use std::io::{self, Read};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{info, warn};

use crate::error::{ConnectionError, TickFault};

/// Longest partial line kept while waiting for a newline.
const MAX_PENDING_BYTES: usize = 4096;

/// Source of newline-terminated frames.
///
/// `Ok(None)`: nothing complete arrived within the read timeout.
/// `Err(_)`: the link itself failed.
pub trait FrameSource {
    fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Splits a byte stream into lines, at most one short read per call,
/// and only when input is already queued.
pub struct LineReader<R> {
    inner: R,
    pending: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::new(),
        }
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        Some(line)
    }
}

/// Byte source that can report how much input is already queued.
pub trait InputQueue: Read {
    fn bytes_waiting(&mut self) -> io::Result<usize>;
}

impl InputQueue for Box<dyn SerialPort> {
    fn bytes_waiting(&mut self) -> io::Result<usize> {
        Ok(self.bytes_to_read()? as usize)
    }
}

impl<R: InputQueue> FrameSource for LineReader<R> {
    fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        if let Some(line) = self.take_line() {
            return Ok(Some(line));
        }

        // Never block the tick on a silent device.
        if self.inner.bytes_waiting()? == 0 {
            return Ok(None);
        }

        let mut buf = [0u8; 256];
        match self.inner.read(&mut buf) {
            Ok(n) if n > 0 => {
                self.pending.extend_from_slice(&buf[..n]);
                let line = self.take_line();
                if line.is_none() && self.pending.len() > MAX_PENDING_BYTES {
                    warn!("dropping {} bytes without newline", self.pending.len());
                    self.pending.clear();
                }
                Ok(line)
            }
            Ok(_) => Ok(None),
            Err(ref e)
                if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Closed,
}

pub struct Connection {
    port_name: String,
    baud_rate: u32,
    read_timeout: Duration,
    state: ConnectionState,
    link: Option<Box<dyn FrameSource>>,
}

fn open_serial(
    port_name: &str,
    baud_rate: u32,
    read_timeout: Duration,
) -> Result<Box<dyn FrameSource>, ConnectionError> {
    let port = serialport::new(port_name, baud_rate)
        .timeout(read_timeout)
        .open()
        .map_err(|source| ConnectionError::Open {
            port: port_name.to_string(),
            baud_rate,
            source,
        })?;
    Ok(Box::new(LineReader::new(port)))
}

impl Connection {
    /// Open the serial device. Failure here aborts the session.
    pub fn open(
        port_name: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> Result<Self, ConnectionError> {
        let link = open_serial(port_name, baud_rate, read_timeout)?;
        info!("connected to {} @ {} baud", port_name, baud_rate);
        Ok(Self::with_source(port_name, baud_rate, read_timeout, link))
    }

    /// Wrap an already opened source.
    pub fn with_source(
        port_name: &str,
        baud_rate: u32,
        read_timeout: Duration,
        link: Box<dyn FrameSource>,
    ) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            read_timeout,
            state: ConnectionState::Connected,
            link: Some(link),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Poll one frame. No-op unless Connected; a link error drops the
    /// handle and moves to Disconnected.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TickFault> {
        if !self.is_connected() {
            return Ok(None);
        }
        let link = match self.link.as_mut() {
            Some(l) => l,
            None => return Ok(None),
        };

        match link.read_frame() {
            Ok(frame) => Ok(frame),
            Err(source) => {
                warn!("serial link {} lost: {}", self.port_name, source);
                self.link = None;
                self.state = ConnectionState::Disconnected;
                Err(TickFault::Read {
                    port: self.port_name.clone(),
                    source,
                })
            }
        }
    }

    /// Manual reopen after a read fault.
    pub fn reopen(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Closed => Err(ConnectionError::Closed {
                port: self.port_name.clone(),
            }),
            ConnectionState::Disconnected => {
                let link = open_serial(&self.port_name, self.baud_rate, self.read_timeout)?;
                info!("reconnected to {} @ {} baud", self.port_name, self.baud_rate);
                self.attach(link)
            }
        }
    }

    /// Reattach a source to a Disconnected connection.
    pub fn attach(&mut self, link: Box<dyn FrameSource>) -> Result<(), ConnectionError> {
        if self.state == ConnectionState::Closed {
            return Err(ConnectionError::Closed {
                port: self.port_name.clone(),
            });
        }
        self.link = Some(link);
        self.state = ConnectionState::Connected;
        Ok(())
    }

    /// Idempotent; releases the handle if one is held.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if self.link.take().is_some() {
            info!("serial port {} released", self.port_name);
        }
        self.state = ConnectionState::Closed;
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;

    pub enum Step {
        Line(&'static str),
        Bytes(Vec<u8>),
        Silence,
        Fault,
        Panic,
    }

    /// Replays a fixed script, then stays silent.
    pub struct ScriptedSource {
        steps: VecDeque<Step>,
    }

    impl ScriptedSource {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: steps.into(),
            }
        }

        pub fn lines(lines: &[&'static str]) -> Self {
            Self::new(lines.iter().map(|&l| Step::Line(l)).collect())
        }
    }

    impl FrameSource for ScriptedSource {
        fn read_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
            match self.steps.pop_front() {
                Some(Step::Line(l)) => Ok(Some(l.as_bytes().to_vec())),
                Some(Step::Bytes(b)) => Ok(Some(b)),
                Some(Step::Silence) | None => Ok(None),
                Some(Step::Fault) => Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "device unplugged",
                )),
                Some(Step::Panic) => panic!("driver bug"),
            }
        }
    }

    pub fn connection(steps: Vec<Step>) -> Connection {
        Connection::with_source(
            "/dev/ttyTEST",
            115_200,
            Duration::from_millis(100),
            Box::new(ScriptedSource::new(steps)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{connection, ScriptedSource, Step};
    use super::*;
    use std::collections::VecDeque;

    /// Reader handing out one scripted chunk per read call.
    struct ChunkReader(VecDeque<io::Result<Vec<u8>>>);

    impl Read for ChunkReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.0.pop_front() {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            }
        }
    }

    impl InputQueue for ChunkReader {
        fn bytes_waiting(&mut self) -> io::Result<usize> {
            Ok(match self.0.front() {
                Some(Ok(chunk)) => chunk.len(),
                Some(Err(_)) => 1,
                None => 0,
            })
        }
    }

    /// Silent device: nothing queued, and a read would block.
    struct Idle;

    impl Read for Idle {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            panic!("read() called with an empty input queue");
        }
    }

    impl InputQueue for Idle {
        fn bytes_waiting(&mut self) -> io::Result<usize> {
            Ok(0)
        }
    }

    /// Port whose queue query fails, as after an unplug.
    struct Unplugged;

    impl Read for Unplugged {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
    }

    impl InputQueue for Unplugged {
        fn bytes_waiting(&mut self) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "no such device"))
        }
    }

    fn reader(chunks: Vec<io::Result<Vec<u8>>>) -> LineReader<ChunkReader> {
        LineReader::new(ChunkReader(chunks.into()))
    }

    #[test]
    fn line_reader_returns_one_line_per_call() {
        let mut r = reader(vec![Ok(b"1,2,3,4\r\n5,6,7,8\n".to_vec())]);
        assert_eq!(r.read_frame().unwrap(), Some(b"1,2,3,4\r".to_vec()));
        assert_eq!(r.read_frame().unwrap(), Some(b"5,6,7,8".to_vec()));
        assert_eq!(r.read_frame().unwrap(), None);
    }

    #[test]
    fn line_reader_joins_split_writes() {
        let mut r = reader(vec![Ok(b"10,2".to_vec()), Ok(b"0,30,40\n".to_vec())]);
        assert_eq!(r.read_frame().unwrap(), None);
        assert_eq!(r.read_frame().unwrap(), Some(b"10,20,30,40".to_vec()));
    }

    #[test]
    fn line_reader_skips_read_when_nothing_queued() {
        let mut r = LineReader::new(Idle);
        for _ in 0..5 {
            assert_eq!(r.read_frame().unwrap(), None);
        }
    }

    #[test]
    fn line_reader_returns_queued_line_without_reading() {
        let mut r = LineReader::new(Idle);
        r.pending.extend_from_slice(b"1,2,3,4\n");
        assert_eq!(r.read_frame().unwrap(), Some(b"1,2,3,4".to_vec()));
    }

    #[test]
    fn queue_query_failure_is_a_link_error() {
        let mut r = LineReader::new(Unplugged);
        assert_eq!(
            r.read_frame().unwrap_err().kind(),
            io::ErrorKind::BrokenPipe
        );
    }

    #[test]
    fn line_reader_maps_timeout_to_nothing() {
        let mut r = reader(vec![Err(io::Error::new(io::ErrorKind::TimedOut, "t"))]);
        assert_eq!(r.read_frame().unwrap(), None);
    }

    #[test]
    fn line_reader_surfaces_link_errors() {
        let mut r = reader(vec![Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))]);
        assert!(r.read_frame().is_err());
    }

    #[test]
    fn line_reader_drops_runaway_partial_lines() {
        let mut r = reader((0..20).map(|_| Ok(vec![b'x'; 256])).collect());
        for _ in 0..30 {
            let _ = r.read_frame();
        }
        assert!(r.pending.len() <= MAX_PENDING_BYTES);
    }

    #[test]
    fn read_fault_moves_to_disconnected() {
        let mut conn = connection(vec![Step::Line("1,2,3,4"), Step::Fault, Step::Line("5,6,7,8")]);
        assert_eq!(conn.read_frame().unwrap(), Some(b"1,2,3,4".to_vec()));

        let err = conn.read_frame().unwrap_err();
        assert!(err.is_read_fault());
        assert_eq!(conn.state(), ConnectionState::Disconnected);

        // the remaining scripted line is never read
        assert_eq!(conn.read_frame().unwrap(), None);
        assert_eq!(conn.read_frame().unwrap(), None);
    }

    #[test]
    fn attach_resumes_after_fault() {
        let mut conn = connection(vec![Step::Fault]);
        assert!(conn.read_frame().is_err());

        conn.attach(Box::new(ScriptedSource::lines(&["9,9,9,9"])))
            .unwrap();
        assert!(conn.is_connected());
        assert_eq!(conn.read_frame().unwrap(), Some(b"9,9,9,9".to_vec()));
    }

    #[test]
    fn close_is_idempotent_and_terminal() {
        let mut conn = connection(vec![Step::Line("1,2,3,4")]);
        conn.close();
        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        assert_eq!(conn.read_frame().unwrap(), None);

        assert!(matches!(conn.reopen(), Err(ConnectionError::Closed { .. })));
        assert!(conn
            .attach(Box::new(ScriptedSource::lines(&["1,2,3,4"])))
            .is_err());
    }

    #[test]
    fn reopen_while_connected_is_noop() {
        let mut conn = connection(vec![]);
        assert!(conn.reopen().is_ok());
        assert!(conn.is_connected());
    }

    #[test]
    fn open_missing_device_fails() {
        let err = Connection::open(
            "/dev/this-port-does-not-exist",
            115_200,
            Duration::from_millis(10),
        )
        .err()
        .expect("opening a missing device must fail");
        assert!(matches!(err, ConnectionError::Open { baud_rate: 115_200, .. }));
    }
}
