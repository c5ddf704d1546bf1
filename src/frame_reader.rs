use std::fmt::{Debug, Formatter};

use anyhow::bail;
use bytes::{Buf, Bytes};

/// Sequential typed reads over a single received frame. Numbers are read in network byte order
///  unless the method name says otherwise.
///
/// A [FrameReader] owns (a shared reference to) its buffer, so cloning it is cheap and yields an
///  independent read cursor over the same bytes. This is what allows several handlers to each
///  read the same packet from the start of its payload.
///
/// Reading past the end of the buffer is a decode error rather than a panic: frames come from
///  the network and are untrusted.
#[derive(Clone)]
pub struct FrameReader {
    len: usize,
    buf: Bytes,
}

impl Debug for FrameReader {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameReader{{pos:{}, len:{}, remaining:{:?}}}", self.position(), self.len, self.buf.as_ref())
    }
}

impl From<Bytes> for FrameReader {
    fn from(buf: Bytes) -> Self {
        FrameReader::new(buf)
    }
}

impl From<&'static [u8]> for FrameReader {
    fn from(buf: &'static [u8]) -> Self {
        FrameReader::new(Bytes::from_static(buf))
    }
}

impl FrameReader {
    pub fn new(buf: Bytes) -> FrameReader {
        FrameReader {
            len: buf.len(),
            buf,
        }
    }

    /// the total length of the frame, regardless of how much of it was read already
    pub fn length(&self) -> usize {
        self.len
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn position(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn ensure_remaining(&self, n: usize) -> anyhow::Result<()> {
        if self.buf.remaining() < n {
            bail!("frame too short: reading {} bytes at offset {} of a {} byte frame", n, self.position(), self.len);
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> anyhow::Result<u8> {
        self.ensure_remaining(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> anyhow::Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            n => bail!("invalid boolean value {}", n),
        }
    }

    pub fn read_u16(&mut self) -> anyhow::Result<u16> {
        self.ensure_remaining(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn read_u16_le(&mut self) -> anyhow::Result<u16> {
        self.ensure_remaining(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn read_u32(&mut self) -> anyhow::Result<u32> {
        self.ensure_remaining(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_u32_le(&mut self) -> anyhow::Result<u32> {
        self.ensure_remaining(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn read_u64(&mut self) -> anyhow::Result<u64> {
        self.ensure_remaining(8)?;
        Ok(self.buf.get_u64())
    }

    pub fn read_bytes(&mut self, n: usize) -> anyhow::Result<Bytes> {
        self.ensure_remaining(n)?;
        Ok(self.buf.split_to(n))
    }

    /// consumes everything that was not read yet
    pub fn read_remaining(&mut self) -> Bytes {
        self.buf.split_to(self.buf.remaining())
    }
}
