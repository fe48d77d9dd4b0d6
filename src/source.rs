use std::io::{self, Read};

/// A pull-based supplier of code units, filling a caller-owned buffer.
///
/// Every [`std::io::Read`] is a `Source<u8>`. For UTF-16 input, see
/// [`Utf16LeSource`] and [`Utf16Units`].
pub trait Source<T> {
    /// Pull units into `buf`, returning how many were written. Returning `0`
    /// for a non-empty `buf` signals the end of the stream.
    fn read_units(&mut self, buf: &mut [T]) -> io::Result<usize>;
}

impl<R: Read> Source<u8> for R {
    #[inline(always)]
    fn read_units(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

impl Source<u16> for &[u16] {
    fn read_units(&mut self, buf: &mut [u16]) -> io::Result<usize> {
        let amt = buf.len().min(self.len());
        let (head, tail) = self.split_at(amt);

        buf[..amt].copy_from_slice(head);
        *self = tail;

        Ok(amt)
    }
}

/// Adapts any iterator of UTF-16 units, e.g. [`str::encode_utf16`].
pub struct Utf16Units<I> {
    inner: I,
}

impl<I: Iterator<Item = u16>> Utf16Units<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I: Iterator<Item = u16>> Source<u16> for Utf16Units<I> {
    fn read_units(&mut self, buf: &mut [u16]) -> io::Result<usize> {
        let mut written: usize = 0;

        for (slot, unit) in buf.iter_mut().zip(&mut self.inner) {
            *slot = unit;
            written += 1;
        }

        Ok(written)
    }
}

/// Decodes a little-endian UTF-16 byte stream into units.
///
/// Byte pairs may be split across reads of the wrapped reader. A stream with
/// an odd number of bytes ends with an [`io::ErrorKind::UnexpectedEof`] error.
pub struct Utf16LeSource<R> {
    inner: R,
    scratch: Vec<u8>,
    pending: Option<u8>,
}

impl<R: Read> Utf16LeSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            scratch: Vec::new(),
            pending: None,
        }
    }

    /// Return the underlying reader.
    ///
    /// **BEWARE**: a pending odd byte will be lost!
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Source<u16> for Utf16LeSource<R> {
    fn read_units(&mut self, buf: &mut [u16]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let wanted = buf.len() * 2 - self.pending.is_some() as usize;

            if self.scratch.len() < wanted {
                self.scratch.resize(wanted, 0);
            }

            let n = self.inner.read(&mut self.scratch[..wanted])?;

            if n == 0 {
                if self.pending.is_some() {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "UTF-16 stream ended on an odd byte",
                    ));
                }

                return Ok(0);
            }

            let mut bytes = &self.scratch[..n];
            let mut written: usize = 0;

            if let Some(low) = self.pending.take() {
                buf[0] = u16::from_le_bytes([low, bytes[0]]);
                bytes = &bytes[1..];
                written = 1;
            }

            let mut pairs = bytes.chunks_exact(2);

            for (slot, pair) in buf[written..].iter_mut().zip(&mut pairs) {
                *slot = u16::from_le_bytes([pair[0], pair[1]]);
                written += 1;
            }

            if let [odd] = pairs.remainder() {
                self.pending = Some(*odd);
            }

            if written > 0 {
                return Ok(written);
            }
        }
    }
}
