use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

use tracing::debug;

use crate::error::{Error, ErrorKind, Result};
use crate::line_buffer::LineBuffer;
use crate::scanner::{EscapeMeta, FieldDescriptor, FieldTable, Scanner};
use crate::searcher::kernel_simd_instructions;
use crate::source::{Source, Utf16LeSource};
use crate::unescape::{unescaped, Strategy};
use crate::unit::CodeUnit;

/// A [`Reader`] of UTF-8 data, pulled from any [`std::io::Read`].
pub type Utf8Reader<R> = Reader<u8, R>;

/// A [`Reader`] of UTF-16 data, pulled from any [`Source<u16>`].
pub type Utf16Reader<S> = Reader<u16, S>;

/// Builds a [`Reader`] with given configuration.
#[derive(Debug, Clone)]
pub struct ReaderBuilder {
    has_headers: bool,
    buffer_capacity: usize,
    max_field_count: usize,
    delimiter: u8,
    simd: bool,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self {
            has_headers: false,
            buffer_capacity: 32 * (1 << 10),
            max_field_count: 256,
            delimiter: b',',
            simd: true,
        }
    }
}

impl ReaderBuilder {
    /// Create a new [`ReaderBuilder`] with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new [`ReaderBuilder`] with provided `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut reader = Self::default();
        reader.buffer_capacity(capacity);
        reader
    }

    /// Indicate whether first record must be understood as a header.
    ///
    /// Will default to `false`.
    pub fn has_headers(&mut self, yes: bool) -> &mut Self {
        self.has_headers = yes;
        self
    }

    /// Set the capacity of the created [`Reader`]'s line buffer, in code
    /// units.
    ///
    /// The buffer never grows: it must be larger than the longest record of
    /// the stream, line terminator included.
    ///
    /// Will default to `32768`.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set the maximum number of fields a record may have.
    ///
    /// Will default to `256`.
    pub fn max_field_count(&mut self, max: usize) -> &mut Self {
        self.max_field_count = max;
        self
    }

    /// Set the delimiter to be used by the created [`Reader`].
    ///
    /// This delimiter must be a single ASCII byte, and can be neither a
    /// double quote nor a line terminator.
    ///
    /// Will default to a comma.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    /// Indicate whether records should be scanned using SIMD instructions.
    /// Disabling it falls back to a scalar scan yielding the exact same
    /// results.
    ///
    /// Will default to `true`.
    pub fn simd(&mut self, yes: bool) -> &mut Self {
        self.simd = yes;
        self
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason| Err(Error::new(ErrorKind::InvalidConfig(reason)));

        if !self.delimiter.is_ascii() {
            return invalid("delimiter must be an ASCII byte");
        }

        if matches!(self.delimiter, b'"' | b'\r' | b'\n') {
            return invalid("delimiter cannot be a double quote or a line terminator");
        }

        if self.buffer_capacity == 0 {
            return invalid("buffer capacity must be greater than zero");
        }

        if self.max_field_count == 0 {
            return invalid("max field count must be greater than zero");
        }

        Ok(())
    }

    fn build<T: CodeUnit, S: Source<T>>(&self, source: S) -> Result<Reader<T, S>> {
        self.validate()?;

        debug!(
            capacity = self.buffer_capacity,
            max_field_count = self.max_field_count,
            simd = self.simd,
            kernel = kernel_simd_instructions(),
            "building csv reader"
        );

        let mut reader = Reader {
            buffer: LineBuffer::with_capacity(self.buffer_capacity, source),
            fields: FieldTable::with_capacity(self.max_field_count),
            scanner: Scanner::new(self.delimiter, self.simd),
            headers: None,
            poisoned: false,
            scratch: String::new(),
        };

        if self.has_headers {
            reader.read_headers()?;
        }

        Ok(reader)
    }

    /// Create a new [`Utf8Reader`] using the provided reader implementing
    /// [`std::io::Read`].
    ///
    /// If the builder was told the stream has headers, they are read
    /// immediately, hence the [`Result`].
    pub fn from_reader<R: Read>(&self, reader: R) -> Result<Utf8Reader<R>> {
        self.build(reader)
    }

    /// Create a new [`Utf16Reader`] using the provided source of UTF-16 code
    /// units.
    pub fn from_utf16_source<S: Source<u16>>(&self, source: S) -> Result<Utf16Reader<S>> {
        self.build(source)
    }

    /// Create a new [`Utf16Reader`] decoding a UTF-16LE byte stream.
    pub fn from_utf16_le_reader<R: Read>(
        &self,
        reader: R,
    ) -> Result<Utf16Reader<Utf16LeSource<R>>> {
        self.build(Utf16LeSource::new(reader))
    }
}

/// An already configured streaming CSV reader, giving zero-copy access to the
/// fields of one record at a time.
///
/// Fields are only valid until the next call to [`Reader::read_next`], which
/// is enforced by the borrow checker.
///
/// # Configuration
///
/// To configure a [`Reader`], if you need a custom delimiter for instance or
/// if you want to tweak the size of the inner buffer, check out the
/// [`ReaderBuilder`].
pub struct Reader<T, S> {
    buffer: LineBuffer<T, S>,
    fields: FieldTable,
    scanner: Scanner<T>,
    headers: Option<HashMap<String, usize>>,
    poisoned: bool,
    scratch: String,
}

impl<R: Read> Reader<u8, R> {
    /// Create a new [`Utf8Reader`] with default configuration.
    pub fn from_reader(reader: R) -> Result<Self> {
        ReaderBuilder::new().from_reader(reader)
    }
}

impl<S: Source<u16>> Reader<u16, S> {
    /// Create a new [`Utf16Reader`] with default configuration.
    pub fn from_utf16_source(source: S) -> Result<Self> {
        ReaderBuilder::new().from_utf16_source(source)
    }
}

impl<T: CodeUnit, S: Source<T>> Reader<T, S> {
    fn read_headers(&mut self) -> Result<()> {
        let mut headers = HashMap::new();

        if self.read_next()? {
            for index in 0..self.field_count() {
                headers.entry(self.get_string(index)?).or_insert(index);
            }
        }

        self.headers = Some(headers);

        Ok(())
    }

    /// Advance to the next record. Returns `false` when the stream is
    /// exhausted.
    ///
    /// Fails if the record cannot fit in the line buffer or has too many
    /// fields, after which the reader is considered done and will always
    /// return `false`.
    pub fn read_next(&mut self) -> Result<bool> {
        if self.poisoned {
            return Ok(false);
        }

        match self.buffer.next_record(&self.scanner, &mut self.fields) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.fields.clear();
                Ok(false)
            }
            Err(err) => {
                self.fields.clear();

                if err.is_config_error() {
                    self.poisoned = true;
                }

                Err(err)
            }
        }
    }

    /// Number of fields of the current record.
    #[inline(always)]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Mapping from header names to field indices, if the reader was built
    /// with [`ReaderBuilder::has_headers`].
    #[inline]
    pub fn headers(&self) -> Option<&HashMap<String, usize>> {
        self.headers.as_ref()
    }

    /// Index of the field with given header name. When a name is repeated,
    /// its first occurrence wins.
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.as_ref()?.get(name).copied()
    }

    /// Number of records read so far, headers included.
    #[inline(always)]
    pub fn record_index(&self) -> u64 {
        self.buffer.records()
    }

    /// Raw units of the current record, without its line terminator.
    #[inline]
    pub fn record_raw(&self) -> &[T] {
        if self.fields.len() == 0 {
            return &[];
        }

        self.buffer.record()
    }

    #[inline]
    fn descriptor(&self, index: usize) -> Result<FieldDescriptor> {
        self.fields.get(index).copied().ok_or_else(|| {
            Error::new(ErrorKind::FieldOutOfRange {
                index,
                count: self.fields.len(),
            })
        })
    }

    #[inline]
    fn raw_field(&self, index: usize) -> Result<(&[T], EscapeMeta)> {
        let descriptor = self.descriptor(index)?;

        Ok((
            &self.buffer.units()[descriptor.offset..descriptor.end()],
            descriptor.meta,
        ))
    }

    /// Raw units of a field, quotes included.
    #[inline]
    pub fn get_span_raw(&self, index: usize) -> Result<&[T]> {
        self.raw_field(index).map(|(raw, _)| raw)
    }

    /// Unescaped units of a field, in the stream's encoding. Only allocates
    /// when doubled quotes must be collapsed.
    #[inline]
    pub fn get_span(&self, index: usize) -> Result<Cow<'_, [T]>> {
        let (raw, meta) = self.raw_field(index)?;

        Ok(unescaped(raw, meta))
    }

    /// Unescaped field as UTF-16 text. Malformed UTF-8 sequences are replaced
    /// by `U+FFFD`.
    pub fn get_utf16(&self, index: usize) -> Result<Cow<'_, [u16]>> {
        let (raw, meta) = self.raw_field(index)?;
        let strategy = Strategy::choose(raw, meta);

        if let Strategy::Raw(span) | Strategy::Unquote(span) = strategy {
            if let Some(units) = T::as_utf16(span) {
                return Ok(Cow::Borrowed(units));
            }
        }

        // Output never has more units than the raw field
        let mut output = vec![0u16; raw.len()];

        let written = strategy.write_utf16(&mut output).ok_or_else(|| {
            Error::new(ErrorKind::DestinationTooSmall {
                needed: raw.len(),
                available: raw.len(),
            })
        })?;

        output.truncate(written);

        Ok(Cow::Owned(output))
    }

    /// Writes the unescaped field as UTF-16 text into `dest`, returning the
    /// number of units written.
    ///
    /// A `dest` at least as long as the bound returned by
    /// [`Reader::needs_escape`] is always large enough.
    pub fn write_to_span(&self, index: usize, dest: &mut [u16]) -> Result<usize> {
        let (raw, meta) = self.raw_field(index)?;

        Strategy::choose(raw, meta).write_utf16(dest).ok_or_else(|| {
            Error::new(ErrorKind::DestinationTooSmall {
                needed: raw.len(),
                available: dest.len(),
            })
        })
    }

    /// Returns whether turning the field into UTF-16 text requires more than
    /// a copy, along with an upper bound of the number of units it will take.
    pub fn needs_escape(&self, index: usize) -> Result<(bool, usize)> {
        let (raw, meta) = self.raw_field(index)?;

        Ok((Strategy::choose(raw, meta).is_general(), raw.len()))
    }

    /// Whether the raw field contains any double quote.
    #[inline]
    pub fn is_quoted(&self, index: usize) -> Result<bool> {
        self.descriptor(index).map(|descriptor| descriptor.meta.is_quoted())
    }

    /// Unescaped field as a string. Zero-copy for UTF-8 input, unless doubled
    /// quotes must be collapsed.
    ///
    /// Fails on malformed text.
    pub fn get_str(&self, index: usize) -> Result<Cow<'_, str>> {
        let invalid = || Error::new(T::invalid_text(index));

        match self.get_span(index)? {
            Cow::Borrowed(units) => {
                if let Some(text) = T::as_str(units) {
                    return Ok(Cow::Borrowed(text));
                }

                let mut output = String::with_capacity(units.len());

                if T::decode_to(units, &mut output) {
                    Ok(Cow::Owned(output))
                } else {
                    Err(invalid())
                }
            }
            Cow::Owned(units) => T::into_string(units).map(Cow::Owned).ok_or_else(invalid),
        }
    }

    /// Unescaped field as an owned string.
    #[inline]
    pub fn get_string(&self, index: usize) -> Result<String> {
        self.get_str(index).map(Cow::into_owned)
    }

    /// Parses the unescaped field using [`FromStr`]. UTF-16 fields are decoded
    /// into an internal buffer reused across calls.
    pub fn parse<F>(&mut self, index: usize) -> Result<F>
    where
        F: FromStr,
        F::Err: fmt::Display,
    {
        let descriptor = self.descriptor(index)?;
        let raw = &self.buffer.units()[descriptor.offset..descriptor.end()];
        let field = unescaped(raw, descriptor.meta);

        let parsed = match T::as_str(&field) {
            Some(text) => text.parse::<F>(),
            None => {
                self.scratch.clear();

                if !T::decode_to(&field, &mut self.scratch) {
                    return Err(Error::new(T::invalid_text(index)));
                }

                self.scratch.parse::<F>()
            }
        };

        parsed.map_err(|err| {
            Error::new(ErrorKind::Parse {
                field: index,
                message: err.to_string(),
            })
        })
    }

    /// Return the underlying source.
    ///
    /// **BEWARE**: buffered data will be lost!
    pub fn into_inner(self) -> S {
        self.buffer.into_inner()
    }
}
