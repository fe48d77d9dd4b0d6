use std::io;

use tracing::{debug, trace};

use crate::error::{Error, ErrorKind, Result};
use crate::scanner::{FieldTable, Scan, TableFull};
use crate::source::Source;
use crate::unit::CodeUnit;

/// How trailing carriage returns are handled. Decided by the first record of
/// the stream, then never reconsidered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrPolicy {
    Undecided,
    Strip,
    Keep,
}

/// Fixed-capacity window over the source, yielding one record at a time.
///
/// Data only moves when the unterminated tail of the buffer is slid to the
/// front, which always happens before a new scan, so descriptors of the
/// current record stay valid until the next call to
/// [`LineBuffer::next_record`].
pub struct LineBuffer<T, S> {
    source: S,
    buffer: Box<[T]>,
    valid: usize,
    cursor: usize,
    record_start: usize,
    record_end: usize,
    exhausted: bool,
    bom_checked: bool,
    cr_policy: CrPolicy,
    records: u64,
}

impl<T: CodeUnit, S: Source<T>> LineBuffer<T, S> {
    pub fn with_capacity(capacity: usize, source: S) -> Self {
        Self {
            source,
            buffer: vec![T::default(); capacity].into_boxed_slice(),
            valid: 0,
            cursor: 0,
            record_start: 0,
            record_end: 0,
            exhausted: false,
            bom_checked: false,
            cr_policy: CrPolicy::Undecided,
            records: 0,
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of records yielded so far.
    #[inline(always)]
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Valid range of the buffer. Field descriptors index into it.
    #[inline(always)]
    pub fn units(&self) -> &[T] {
        &self.buffer[..self.valid]
    }

    /// Current record, without its line terminator.
    #[inline]
    pub fn record(&self) -> &[T] {
        &self.buffer[self.record_start..self.record_end]
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn too_many_fields(&self, fields: &FieldTable) -> Error {
        Error::new(ErrorKind::TooManyFields {
            max: fields.capacity(),
            record: self.records + 1,
        })
    }

    /// Scans the next record into `fields`. Returns `false` when the source is
    /// exhausted.
    pub fn next_record<Sc: Scan<T>>(&mut self, scanner: &Sc, fields: &mut FieldTable) -> Result<bool> {
        loop {
            if self.exhausted && self.cursor == self.valid {
                return Ok(false);
            }

            let found = scanner
                .scan(&self.buffer[..self.valid], self.cursor, fields)
                .map_err(|TableFull| self.too_many_fields(fields))?;

            match found {
                Some(lf) => {
                    self.emit(self.cursor, lf, fields)?;
                    self.cursor = lf + 1;

                    return Ok(true);
                }
                None if self.exhausted => {
                    if fields.in_quotes() {
                        debug!(
                            record = self.records + 1,
                            "stream ended inside a quoted field"
                        );
                    }

                    self.emit(self.cursor, self.valid, fields)?;
                    self.cursor = self.valid;

                    return Ok(true);
                }
                None => {
                    if self.cursor == 0 && self.valid == self.capacity() {
                        return Err(Error::new(ErrorKind::BufferTooSmall {
                            capacity: self.capacity(),
                            record: self.records + 1,
                        }));
                    }

                    self.slide();
                    self.refill()?;
                }
            }
        }
    }

    fn emit(&mut self, start: usize, mut end: usize, fields: &mut FieldTable) -> Result<()> {
        let ends_with_cr = end > start && self.buffer[end - 1] == T::CR;

        if self.cr_policy == CrPolicy::Undecided {
            self.cr_policy = if ends_with_cr {
                CrPolicy::Strip
            } else {
                CrPolicy::Keep
            };

            debug!(policy = ?self.cr_policy, "line ending policy frozen");
        }

        if self.cr_policy == CrPolicy::Strip && ends_with_cr {
            end -= 1;
        }

        fields
            .finish(end)
            .map_err(|TableFull| self.too_many_fields(fields))?;

        self.record_start = start;
        self.record_end = end;
        self.records += 1;

        Ok(())
    }

    fn slide(&mut self) {
        if self.cursor == 0 {
            return;
        }

        let tail = self.valid - self.cursor;

        if tail > 0 {
            debug!(units = tail, "sliding unterminated record to buffer start");
            self.buffer.copy_within(self.cursor..self.valid, 0);
        }

        self.valid = tail;
        self.cursor = 0;
    }

    fn refill(&mut self) -> Result<()> {
        let mut pulled: usize = 0;

        while self.valid < self.capacity() {
            match self.source.read_units(&mut self.buffer[self.valid..]) {
                Ok(0) => {
                    self.exhausted = true;
                    break;
                }
                Ok(n) => {
                    self.valid += n;
                    pulled += n;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(Error::from(err)),
            }
        }

        trace!(units = pulled, exhausted = self.exhausted, "refilled line buffer");

        if !self.bom_checked {
            self.bom_checked = true;

            if self.units().starts_with(T::BOM) {
                debug!("skipping byte-order mark");
                self.cursor = T::BOM.len();
            }
        }

        Ok(())
    }
}
