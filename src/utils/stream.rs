use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

pub const BUFFER_SIZE: usize = 64 * 1024;

/// Cooperative cancellation flag shared between a caller and one operation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Copies `src` into `dst` until EOF, returning the bytes copied.
///
/// Bytes written before a failure stay written.
pub fn copy_all<R, W>(src: &mut R, dst: &mut W, cancel: &CancelToken) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    copy_inner(src, dst, None, cancel)
}

/// Copies at most `max` bytes from `src` into `dst`.
pub fn copy_bounded<R, W>(src: &mut R, dst: &mut W, max: u64, cancel: &CancelToken) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    copy_inner(src, dst, Some(max), cancel)
}

fn copy_inner<R, W>(src: &mut R, dst: &mut W, max: Option<u64>, cancel: &CancelToken) -> Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut copied: u64 = 0;

    loop {
        cancel.check()?;

        let want = match max {
            Some(max) if copied >= max => break,
            Some(max) => (max - copied).min(BUFFER_SIZE as u64) as usize,
            None => BUFFER_SIZE,
        };

        let n = match src.read(&mut buffer[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::NotReadable(e.to_string())),
        };

        dst.write_all(&buffer[..n])
            .map_err(|e| Error::WriteFailed(e.to_string()))?;
        copied += n as u64;
    }

    Ok(copied)
}

/// Writes every buffer to both sinks.
pub struct FanOut<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> FanOut<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn into_inner(self) -> (A, B) {
        (self.first, self.second)
    }
}

impl<A: Write, B: Write> Write for FanOut<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.first.write(buf)?;
        self.second.write_all(&buf[..n])?;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}
