use crate::searcher::{Kernel, LANES};
use crate::unit::CodeUnit;

/// Escaping metadata of a field, gathered while scanning.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EscapeMeta {
    /// Number of quote characters found in the field.
    pub quotes: u32,
    /// Whether a non-ASCII byte was found in the field (UTF-8 input only).
    pub non_ascii: bool,
}

impl EscapeMeta {
    #[inline(always)]
    pub fn is_quoted(&self) -> bool {
        self.quotes > 0
    }
}

/// Location of a raw field in the line buffer, quotes included.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub offset: usize,
    pub len: usize,
    pub meta: EscapeMeta,
}

impl FieldDescriptor {
    #[inline(always)]
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Raised when a record has more fields than the table can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableFull;

/// Fixed-capacity table of field descriptors, reused across records.
///
/// Also holds the escape state of the field currently being scanned.
#[derive(Debug)]
pub struct FieldTable {
    fields: Box<[FieldDescriptor]>,
    len: usize,
    start: usize,
    meta: EscapeMeta,
    in_quotes: bool,
}

impl FieldTable {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: vec![FieldDescriptor::default(); capacity].into_boxed_slice(),
            len: 0,
            start: 0,
            meta: EscapeMeta::default(),
            in_quotes: false,
        }
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.fields.len()
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&FieldDescriptor> {
        self.as_slice().get(index)
    }

    #[inline]
    pub fn as_slice(&self) -> &[FieldDescriptor] {
        &self.fields[..self.len]
    }

    /// Start offset of the field still open at the end of a scan.
    #[cfg(test)]
    pub fn open_field_start(&self) -> usize {
        self.start
    }

    /// Whether the last scan ended inside quotes.
    #[inline(always)]
    pub fn in_quotes(&self) -> bool {
        self.in_quotes
    }

    #[inline]
    pub fn clear(&mut self) {
        self.reset(0);
    }

    #[inline]
    pub fn reset(&mut self, start: usize) {
        self.len = 0;
        self.start = start;
        self.meta = EscapeMeta::default();
        self.in_quotes = false;
    }

    #[inline(always)]
    fn end_field(&mut self, end: usize) -> Result<(), TableFull> {
        let slot = self.fields.get_mut(self.len).ok_or(TableFull)?;

        *slot = FieldDescriptor {
            offset: self.start,
            len: end - self.start,
            meta: self.meta,
        };

        self.len += 1;
        self.start = end + 1;
        self.meta = EscapeMeta::default();

        Ok(())
    }

    /// Closes the last field of the record at `end`.
    #[inline]
    pub fn finish(&mut self, end: usize) -> Result<(), TableFull> {
        debug_assert!(end >= self.start);

        self.end_field(end)
    }

    /// Feeds one code unit at `pos` to the escape state machine. Returns
    /// whether `unit` is a significant line feed, i.e. the end of the record.
    #[inline(always)]
    fn step<T: CodeUnit>(&mut self, pos: usize, unit: T, delimiter: T) -> Result<bool, TableFull> {
        if unit == T::QUOTE {
            self.in_quotes = !self.in_quotes;
            self.meta.quotes = self.meta.quotes.saturating_add(1);
        } else if unit.is_non_ascii() {
            self.meta.non_ascii = true;
        } else if !self.in_quotes {
            if unit == delimiter {
                self.end_field(pos)?;
            } else if unit == T::LF {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

/// Finds the fields of a single record.
pub trait Scan<T: CodeUnit> {
    /// Scans `input` from `start`, resetting `fields` then filling it with
    /// every field closed by a significant delimiter. Returns the offset of the
    /// record's line feed, if one was found in `input`.
    ///
    /// The last field of the record is left open, see [`FieldTable::finish`].
    fn scan(&self, input: &[T], start: usize, fields: &mut FieldTable)
        -> Result<Option<usize>, TableFull>;
}

/// One code unit at a time.
#[derive(Debug, Clone, Copy)]
pub struct ScalarScanner<T> {
    delimiter: T,
}

impl<T: CodeUnit> ScalarScanner<T> {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter: T::from_ascii(delimiter),
        }
    }
}

impl<T: CodeUnit> Scan<T> for ScalarScanner<T> {
    fn scan(
        &self,
        input: &[T],
        start: usize,
        fields: &mut FieldTable,
    ) -> Result<Option<usize>, TableFull> {
        fields.reset(start);

        for (pos, unit) in input.iter().copied().enumerate().skip(start) {
            if fields.step(pos, unit, self.delimiter)? {
                return Ok(Some(pos));
            }
        }

        Ok(None)
    }
}

/// [`LANES`] code units at a time, visiting structural units in ascending
/// order so that quotes always take effect before later delimiters of the
/// same chunk.
#[derive(Debug, Clone, Copy)]
pub struct VectorScanner<T> {
    delimiter: T,
    kernel: Kernel,
}

impl<T: CodeUnit> VectorScanner<T> {
    pub fn new(delimiter: u8) -> Self {
        Self {
            delimiter: T::from_ascii(delimiter),
            kernel: Kernel::new(delimiter),
        }
    }
}

impl<T: CodeUnit> Scan<T> for VectorScanner<T> {
    fn scan(
        &self,
        input: &[T],
        start: usize,
        fields: &mut FieldTable,
    ) -> Result<Option<usize>, TableFull> {
        fields.reset(start);

        let len = input.len();
        let mut pos = start;

        while pos + LANES <= len {
            let chunk = &input[pos..pos + LANES];
            let mut mask = T::special_mask(&self.kernel, chunk);

            while mask != 0 {
                let offset = mask.trailing_zeros() as usize;

                if fields.step(pos + offset, chunk[offset], self.delimiter)? {
                    return Ok(Some(pos + offset));
                }

                mask &= mask - 1;
            }

            pos += LANES;
        }

        // Processing remaining units linearly
        for (offset, unit) in input[pos..].iter().copied().enumerate() {
            if fields.step(pos + offset, unit, self.delimiter)? {
                return Ok(Some(pos + offset));
            }
        }

        Ok(None)
    }
}

/// Either scan path, chosen once at construction.
#[derive(Debug, Clone, Copy)]
pub enum Scanner<T> {
    Scalar(ScalarScanner<T>),
    Vector(VectorScanner<T>),
}

impl<T: CodeUnit> Scanner<T> {
    pub fn new(delimiter: u8, simd: bool) -> Self {
        if simd {
            Self::Vector(VectorScanner::new(delimiter))
        } else {
            Self::Scalar(ScalarScanner::new(delimiter))
        }
    }
}

impl<T: CodeUnit> Scan<T> for Scanner<T> {
    #[inline]
    fn scan(
        &self,
        input: &[T],
        start: usize,
        fields: &mut FieldTable,
    ) -> Result<Option<usize>, TableFull> {
        match self {
            Self::Scalar(scanner) => scanner.scan(input, start, fields),
            Self::Vector(scanner) => scanner.scan(input, start, fields),
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    type Scanned = (Option<usize>, Vec<FieldDescriptor>);

    fn scan_with<T: CodeUnit, S: Scan<T>>(scanner: &S, input: &[T], capacity: usize) -> Result<Scanned, TableFull> {
        let mut fields = FieldTable::with_capacity(capacity);
        let end = scanner.scan(input, 0, &mut fields)?;
        fields.finish(end.unwrap_or(input.len()))?;

        Ok((end, fields.as_slice().to_vec()))
    }

    fn both<T: CodeUnit>(input: &[T], delimiter: u8) -> Scanned {
        let scalar = scan_with(&ScalarScanner::<T>::new(delimiter), input, 1024).unwrap();
        let vector = scan_with(&VectorScanner::<T>::new(delimiter), input, 1024).unwrap();

        assert_eq!(scalar, vector);

        scalar
    }

    fn spans<'a>(input: &'a [u8], scanned: &Scanned) -> Vec<&'a [u8]> {
        scanned
            .1
            .iter()
            .map(|field| &input[field.offset..field.end()])
            .collect()
    }

    #[test]
    fn test_scan_simple() {
        let input = b"a,b,c\n1,2,3\n";
        let scanned = both(input.as_slice(), b',');

        assert_eq!(scanned.0, Some(5));
        assert_eq!(spans(input, &scanned), vec![b"a", b"b", b"c"]);
    }

    #[test]
    fn test_scan_quotes() {
        let input = b"\"x\"\"y\",z\n";
        let scanned = both(input.as_slice(), b',');

        assert_eq!(scanned.0, Some(8));
        assert_eq!(spans(input, &scanned), vec![b"\"x\"\"y\"".as_slice(), b"z"]);
        assert_eq!(scanned.1[0].meta, EscapeMeta { quotes: 4, non_ascii: false });
        assert_eq!(scanned.1[1].meta, EscapeMeta::default());
    }

    #[test]
    fn test_scan_structural_inside_quotes() {
        let input = b"\"a,b\nc\",d\ne";
        let scanned = both(input.as_slice(), b',');

        assert_eq!(scanned.0, Some(9));
        assert_eq!(spans(input, &scanned), vec![b"\"a,b\nc\"".as_slice(), b"d"]);
    }

    #[test]
    fn test_scan_empty_fields() {
        let input = b",,\n";
        let scanned = both(input.as_slice(), b',');

        assert_eq!(scanned.0, Some(2));
        assert_eq!(spans(input, &scanned), vec![b"", b"", b""]);
    }

    #[test]
    fn test_scan_unterminated() {
        let input = b"a,\"b";
        let scanned = both(input.as_slice(), b',');

        assert_eq!(scanned.0, None);
        assert_eq!(spans(input, &scanned), vec![b"a".as_slice(), b"\"b"]);
    }

    #[test]
    fn test_scan_non_ascii() {
        let input = "plain,béatrice,\"日本\"\n".as_bytes();
        let scanned = both(input, b',');

        let flags: Vec<bool> = scanned.1.iter().map(|f| f.meta.non_ascii).collect();
        assert_eq!(flags, vec![false, true, true]);
    }

    #[test]
    fn test_scan_long_record() {
        // Crosses several chunks, with a quote and a delimiter in the same one
        let mut input = "x".repeat(40);
        input.push_str(",\"q,q\",");
        input.push_str(&"y".repeat(70));
        input.push_str(",\"\"\n");

        let scanned = both(input.as_bytes(), b',');
        assert_eq!(scanned.0, Some(input.len() - 1));
        assert_eq!(scanned.1.len(), 4);
        assert_eq!(scanned.1[1].len, 5);

        let units: Vec<u16> = input.encode_utf16().collect();
        let scanned_units = both(&units, b',');
        assert_eq!(scanned_units.1, scanned.1);
    }

    #[test]
    fn test_scan_start_offset() {
        let input = b"a,b\nc,d\n";
        let mut fields = FieldTable::with_capacity(8);

        let scanner = VectorScanner::<u8>::new(b',');
        assert_eq!(scanner.scan(input, 4, &mut fields), Ok(Some(7)));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.open_field_start(), 6);
    }

    #[test]
    fn test_scan_utf16_saturation() {
        // U+012C and U+0A0A have a structural low byte
        let input: Vec<u16> = vec![0x012c, 0x0a0a, b',' as u16, 0x2222, b'\n' as u16];
        let scanned = both(&input, b',');

        assert_eq!(scanned.0, Some(4));
        assert_eq!(scanned.1.len(), 2);
        assert_eq!(scanned.1[0].len, 2);
    }

    #[test]
    fn test_table_full() {
        let input = b"a,b,c\n".as_slice();

        assert_eq!(
            scan_with(&ScalarScanner::<u8>::new(b','), input, 2),
            Err(TableFull)
        );
        assert_eq!(
            scan_with(&VectorScanner::<u8>::new(b','), input, 2),
            Err(TableFull)
        );
        assert!(scan_with(&VectorScanner::<u8>::new(b','), input, 3).is_ok());
    }

    fn csvish_bytes() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(
            prop_oneof![
                4 => Just(b'a'),
                2 => Just(b','),
                2 => Just(b'"'),
                1 => Just(b'\n'),
                1 => Just(b'\r'),
                1 => Just(b'\t'),
                1 => Just(0xc3u8),
                1 => Just(0xa9u8),
                1 => any::<u8>(),
            ],
            0..200,
        )
    }

    fn csvish_units() -> impl Strategy<Value = Vec<u16>> {
        prop::collection::vec(
            prop_oneof![
                4 => Just(b'a' as u16),
                2 => Just(b',' as u16),
                2 => Just(b'"' as u16),
                1 => Just(b'\n' as u16),
                1 => Just(0x012c),
                1 => Just(0x0a0a),
                1 => Just(0xff22),
                1 => Just(0xd83d),
                1 => any::<u16>(),
            ],
            0..200,
        )
    }

    proptest! {
        #[test]
        fn scalar_and_vector_agree_on_bytes(input in csvish_bytes(), start in 0usize..8) {
            let start = start.min(input.len());

            for delimiter in [b',', b'\t'] {
                let mut scalar_fields = FieldTable::with_capacity(256);
                let mut vector_fields = FieldTable::with_capacity(256);

                let scalar = ScalarScanner::<u8>::new(delimiter).scan(&input, start, &mut scalar_fields);
                let vector = VectorScanner::<u8>::new(delimiter).scan(&input, start, &mut vector_fields);

                prop_assert_eq!(scalar, vector);
                prop_assert_eq!(scalar_fields.as_slice(), vector_fields.as_slice());
                prop_assert_eq!(scalar_fields.open_field_start(), vector_fields.open_field_start());
                prop_assert_eq!(scalar_fields.in_quotes(), vector_fields.in_quotes());
            }
        }

        #[test]
        fn scalar_and_vector_agree_on_units(input in csvish_units(), start in 0usize..8) {
            let start = start.min(input.len());

            let mut scalar_fields = FieldTable::with_capacity(256);
            let mut vector_fields = FieldTable::with_capacity(256);

            let scalar = ScalarScanner::<u16>::new(b',').scan(&input, start, &mut scalar_fields);
            let vector = VectorScanner::<u16>::new(b',').scan(&input, start, &mut vector_fields);

            prop_assert_eq!(scalar, vector);
            prop_assert_eq!(scalar_fields.as_slice(), vector_fields.as_slice());
        }

        #[test]
        fn table_overflow_is_path_independent(input in csvish_bytes(), capacity in 1usize..6) {
            let mut scalar_fields = FieldTable::with_capacity(capacity);
            let mut vector_fields = FieldTable::with_capacity(capacity);

            let scalar = ScalarScanner::<u8>::new(b',').scan(&input, 0, &mut scalar_fields);
            let vector = VectorScanner::<u8>::new(b',').scan(&input, 0, &mut vector_fields);

            prop_assert_eq!(scalar, vector);
        }
    }
}
