//! # Fixed-Capacity Output Buffers
//!
//! Documents, signatures, and MACs are written into buffers whose size is
//! computed up front from worst-case field lengths. [`BoundedBuffer`]
//! reserves that capacity once and refuses to grow past it, so an
//! undersized estimate surfaces as an error instead of a silent
//! reallocation.

use std::io;

use crate::error::ProtectError;

/// A write target that never grows beyond its initial capacity.
#[derive(Debug)]
pub struct BoundedBuffer {
    buf: Vec<u8>,
    capacity: usize,
}

impl BoundedBuffer {
    /// Reserve exactly `capacity` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtectError::Allocation`] if the reservation fails.
    pub fn with_capacity(capacity: usize) -> Result<Self, ProtectError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(capacity).map_err(|e| {
            ProtectError::Allocation(format!("cannot reserve {capacity} bytes: {e}"))
        })?;
        Ok(Self { buf, capacity })
    }

    /// The fixed capacity this buffer was created with.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Bytes still available.
    pub fn remaining(&self) -> usize {
        self.capacity - self.buf.len()
    }

    /// View the written bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Take the written bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl io::Write for BoundedBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if data.len() > self.remaining() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!(
                    "output exceeds reserved capacity of {} bytes",
                    self.capacity
                ),
            ));
        }
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
