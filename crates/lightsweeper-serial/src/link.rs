use std::cell::RefCell;
use std::io::ErrorKind;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{ChannelError, Result};
use crate::traits::Channel;

/// Baud rate the tile firmware listens at.
pub const DEFAULT_BAUD_RATE: u32 = 19_200;

/// How long a read waits for a tile to answer.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);

/// Minimum spacing between two writes on the same port.
///
/// The firmware has no flow control; frames sent closer together than this
/// get corrupted on the wire (measured with 24 tiles over two ports).
pub const MIN_WRITE_GAP: Duration = Duration::from_millis(5);

/// Bytes read when flushing stale input.
const DRAIN_CHUNK: usize = 8;

/// Configuration for one serial link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Port speed. Default: 19200.
    pub baud_rate: u32,
    /// Read timeout. Default: 10 ms.
    pub read_timeout: Duration,
    /// Minimum spacing between writes. Default: [`MIN_WRITE_GAP`].
    pub min_write_gap: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
            min_write_gap: MIN_WRITE_GAP,
        }
    }
}

/// Shared handle to one open serial channel.
///
/// Cloning a `SerialLink` is cheap and every clone talks to the same port.
/// All tile proxies addressed on a port hold a clone. The link paces writes
/// by `min_write_gap`, and remembers when a frame only partly made it onto
/// the wire so the layer above can resynchronize the tiles before trusting
/// the bus again.
#[derive(Clone)]
pub struct SerialLink {
    inner: Rc<RefCell<LinkInner>>,
}

struct LinkInner {
    name: String,
    channel: Option<Box<dyn Channel>>,
    config: LinkConfig,
    last_write: Option<Instant>,
    desynced: bool,
}

impl SerialLink {
    /// Wrap an open channel.
    pub fn new(channel: Box<dyn Channel>, config: LinkConfig) -> Self {
        let name = channel.name().to_string();
        Self {
            inner: Rc::new(RefCell::new(LinkInner {
                name,
                channel: Some(channel),
                config,
                last_write: None,
                desynced: false,
            })),
        }
    }

    /// Port identifier.
    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    /// Link configuration.
    pub fn config(&self) -> LinkConfig {
        self.inner.borrow().config
    }

    /// Whether the port is still open.
    pub fn is_open(&self) -> bool {
        self.inner.borrow().channel.is_some()
    }

    /// Tear the link down. Every clone sees the port as closed afterwards.
    pub fn close(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.channel.take().is_some() {
            debug!(port = %inner.name, "closed serial link");
        }
    }

    /// True if both handles refer to the same port.
    pub fn same_link(&self, other: &SerialLink) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Write a whole frame (blocking), honouring the minimum write gap.
    ///
    /// If the port fails after part of the frame went out, the link is
    /// flagged as desynchronized; see [`SerialLink::take_desync`].
    pub fn write(&self, bytes: &[u8]) -> Result<usize> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let channel = match inner.channel.as_mut() {
            Some(channel) => channel,
            None => {
                return Err(ChannelError::Closed {
                    port: inner.name.clone(),
                })
            }
        };

        if let Some(last) = inner.last_write {
            let elapsed = last.elapsed();
            if elapsed < inner.config.min_write_gap {
                std::thread::sleep(inner.config.min_write_gap - elapsed);
            }
        }

        let mut offset = 0usize;
        let outcome = loop {
            if offset >= bytes.len() {
                break channel.flush();
            }
            match channel.write(&bytes[offset..]) {
                Ok(0) => break Err(std::io::Error::from(ErrorKind::WriteZero)),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => break Err(err),
            }
        };
        inner.last_write = Some(Instant::now());

        match outcome {
            Ok(()) => {
                trace!(port = %inner.name, bytes = ?bytes, "wrote frame");
                Ok(offset)
            }
            Err(source) => {
                if offset > 0 && offset < bytes.len() {
                    warn!(
                        port = %inner.name,
                        written = offset,
                        total = bytes.len(),
                        "partial frame on the wire; link needs resync"
                    );
                    inner.desynced = true;
                }
                Err(ChannelError::Io {
                    port: inner.name.clone(),
                    source,
                })
            }
        }
    }

    /// Read up to `max` bytes, waiting at most one read timeout per chunk.
    ///
    /// An empty result means nothing answered; that is not an error.
    pub fn read(&self, max: usize) -> Result<Vec<u8>> {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        let channel = match inner.channel.as_mut() {
            Some(channel) => channel,
            None => {
                return Err(ChannelError::Closed {
                    port: inner.name.clone(),
                })
            }
        };

        let mut buf = vec![0u8; max];
        let mut filled = 0usize;
        while filled < max {
            match channel.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::TimedOut => break,
                Err(source) => {
                    return Err(ChannelError::Io {
                        port: inner.name.clone(),
                        source,
                    })
                }
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    /// Discard whatever the tiles sent that nobody asked for.
    ///
    /// Returns the discarded bytes so callers can log them.
    pub fn drain(&self) -> Result<Vec<u8>> {
        let available = {
            let mut inner = self.inner.borrow_mut();
            let inner = &mut *inner;
            let channel = inner.channel.as_mut().ok_or_else(|| ChannelError::Closed {
                port: inner.name.clone(),
            })?;
            channel.available().map_err(|source| ChannelError::Io {
                port: inner.name.clone(),
                source,
            })?
        };
        // Without a pending count, fall back to one timed read.
        let stale = match available {
            Some(0) => return Ok(Vec::new()),
            Some(pending) => self.read(pending)?,
            None => self.read(DRAIN_CHUNK)?,
        };
        if !stale.is_empty() {
            warn!(port = %self.name(), bytes = ?stale, "discarded stale input");
        }
        Ok(stale)
    }

    /// Whether a partial write left the tiles mid-frame.
    pub fn is_desynced(&self) -> bool {
        self.inner.borrow().desynced
    }

    /// Clear and return the desync flag.
    pub fn take_desync(&self) -> bool {
        std::mem::replace(&mut self.inner.borrow_mut().desynced, false)
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("SerialLink")
            .field("name", &inner.name)
            .field("open", &inner.channel.is_some())
            .field("desynced", &inner.desynced)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use super::*;

    #[derive(Default)]
    struct Shared {
        written: Vec<u8>,
        incoming: VecDeque<u8>,
        write_limit: Option<usize>,
        fail_after_limit: bool,
    }

    struct FakeChannel {
        shared: Rc<RefCell<Shared>>,
    }

    impl Channel for FakeChannel {
        fn name(&self) -> &str {
            "fake0"
        }

        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            let mut shared = self.shared.borrow_mut();
            let take = match shared.write_limit {
                Some(0) if shared.fail_after_limit => {
                    return Err(io::Error::new(ErrorKind::BrokenPipe, "unplugged"))
                }
                Some(limit) => bytes.len().min(limit),
                None => bytes.len(),
            };
            if let Some(limit) = shared.write_limit.as_mut() {
                *limit -= take;
            }
            shared.written.extend_from_slice(&bytes[..take]);
            Ok(take)
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut shared = self.shared.borrow_mut();
            let mut n = 0;
            while n < buf.len() {
                match shared.incoming.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    fn fake_link(config: LinkConfig) -> (SerialLink, Rc<RefCell<Shared>>) {
        let shared = Rc::new(RefCell::new(Shared::default()));
        let link = SerialLink::new(
            Box::new(FakeChannel {
                shared: Rc::clone(&shared),
            }),
            config,
        );
        (link, shared)
    }

    #[test]
    fn write_delivers_whole_frame() {
        let (link, shared) = fake_link(LinkConfig::default());
        let n = link.write(&[0x08, 0x20, 0x07]).unwrap();
        assert_eq!(n, 3);
        assert_eq!(shared.borrow().written, vec![0x08, 0x20, 0x07]);
    }

    #[test]
    fn clones_share_the_port() {
        let (link, shared) = fake_link(LinkConfig::default());
        let other = link.clone();
        link.write(&[1]).unwrap();
        other.write(&[2]).unwrap();
        assert!(link.same_link(&other));
        assert_eq!(shared.borrow().written, vec![1, 2]);
    }

    #[test]
    fn writes_are_paced_by_min_gap() {
        let config = LinkConfig {
            min_write_gap: Duration::from_millis(20),
            ..LinkConfig::default()
        };
        let (link, _shared) = fake_link(config);
        let start = Instant::now();
        link.write(&[0]).unwrap();
        link.write(&[0]).unwrap();
        link.write(&[0]).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn closed_link_rejects_io() {
        let (link, _shared) = fake_link(LinkConfig::default());
        let other = link.clone();
        link.close();
        assert!(!other.is_open());
        assert!(matches!(other.write(&[0]), Err(ChannelError::Closed { .. })));
        assert!(matches!(other.read(1), Err(ChannelError::Closed { .. })));
    }

    #[test]
    fn read_returns_empty_on_silence() {
        let (link, _shared) = fake_link(LinkConfig::default());
        assert!(link.read(8).unwrap().is_empty());
    }

    #[test]
    fn read_stops_at_max() {
        let (link, shared) = fake_link(LinkConfig::default());
        shared.borrow_mut().incoming.extend([1, 2, 3, 4]);
        assert_eq!(link.read(2).unwrap(), vec![1, 2]);
        assert_eq!(link.drain().unwrap(), vec![3, 4]);
    }

    #[test]
    fn partial_write_marks_desync() {
        let (link, shared) = fake_link(LinkConfig::default());
        {
            let mut s = shared.borrow_mut();
            s.write_limit = Some(2);
            s.fail_after_limit = true;
        }
        let err = link.write(&[0x10, 0x61, 0x53, 0x00]).unwrap_err();
        assert!(matches!(err, ChannelError::Io { .. }));
        assert!(link.is_desynced());
        assert!(link.take_desync());
        assert!(!link.is_desynced());
    }

    #[test]
    fn failed_write_before_any_byte_keeps_sync() {
        let (link, shared) = fake_link(LinkConfig::default());
        {
            let mut s = shared.borrow_mut();
            s.write_limit = Some(0);
            s.fail_after_limit = true;
        }
        assert!(link.write(&[0x08, 0x00]).is_err());
        assert!(!link.is_desynced());
    }
}
