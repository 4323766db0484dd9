use std::io;

/// A byte transport that one or more tiles listen on.
///
/// Implemented by [`SerialPortChannel`](crate::SerialPortChannel) for real
/// hardware and by simulators in the test tooling. Reads are bounded by the
/// transport's own timeout: a read that times out returns `Ok(0)` rather
/// than an error, since silence is a normal answer from a tile bus.
pub trait Channel {
    /// Identifier of the underlying port (e.g. `/dev/ttyUSB0`, `COM3`).
    fn name(&self) -> &str;

    /// Write some bytes, returning how many were accepted.
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize>;

    /// Read up to `buf.len()` bytes. `Ok(0)` means nothing arrived in time.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Flush buffered output to the wire.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Bytes already received and waiting to be read, if the transport can
    /// tell without blocking.
    fn available(&mut self) -> io::Result<Option<usize>> {
        Ok(None)
    }
}

impl<C: Channel + ?Sized> Channel for Box<C> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        (**self).write(bytes)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn available(&mut self) -> io::Result<Option<usize>> {
        (**self).available()
    }
}
