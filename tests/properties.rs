use std::io::{self, Cursor, Read};

use proptest::prelude::*;
use span_csv::{CodeUnit, Reader, ReaderBuilder, Source};

/// Yields at most `step` bytes per read.
struct Trickle<R> {
    inner: R,
    step: usize,
}

impl<R: Read> Read for Trickle<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let amt = buf.len().min(self.step);
        self.inner.read(&mut buf[..amt])
    }
}

fn field() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => "[a-z é😀]{0,12}",
        1 => "[a-z,\"\r\n é]{0,12}",
    ]
}

fn records() -> impl Strategy<Value = Vec<Vec<String>>> {
    prop::collection::vec(prop::collection::vec(field(), 1..6), 0..12)
}

fn write_field(output: &mut String, field: &str, alone: bool) {
    let needs_quotes = field.contains([',', '"', '\r', '\n']) || (alone && field.is_empty());

    if needs_quotes {
        output.push('"');
        output.push_str(&field.replace('"', "\"\""));
        output.push('"');
    } else {
        output.push_str(field);
    }
}

/// Serializes records, returning the data and the length of its longest line
/// in bytes, terminator included.
fn serialize(records: &[Vec<String>], crlf: bool, trailing: bool) -> (String, usize) {
    let terminator = if crlf { "\r\n" } else { "\n" };

    let mut data = String::new();
    let mut longest: usize = 0;

    for (i, record) in records.iter().enumerate() {
        let start = data.len();

        for (j, field) in record.iter().enumerate() {
            if j > 0 {
                data.push(',');
            }

            write_field(&mut data, field, record.len() == 1);
        }

        if trailing || i + 1 < records.len() {
            data.push_str(terminator);
        }

        longest = longest.max(data.len() - start);
    }

    (data, longest)
}

fn read_strings<T: CodeUnit, S: Source<T>>(mut reader: Reader<T, S>) -> Vec<Vec<String>> {
    let mut records = Vec::new();

    while reader.read_next().unwrap() {
        records.push(
            (0..reader.field_count())
                .map(|index| reader.get_string(index).unwrap())
                .collect(),
        );
    }

    records
}

fn read_utf16<T: CodeUnit, S: Source<T>>(mut reader: Reader<T, S>) -> Vec<Vec<Vec<u16>>> {
    let mut records = Vec::new();

    while reader.read_next().unwrap() {
        records.push(
            (0..reader.field_count())
                .map(|index| reader.get_utf16(index).unwrap().into_owned())
                .collect(),
        );
    }

    records
}

fn read_raw_spans(data: &[u8], capacity: usize, simd: bool) -> Vec<Vec<Vec<u8>>> {
    let mut reader = ReaderBuilder::with_capacity(capacity)
        .simd(simd)
        .from_reader(data)
        .unwrap();

    let mut records = Vec::new();

    while reader.read_next().unwrap() {
        records.push(
            (0..reader.field_count())
                .map(|index| reader.get_span_raw(index).unwrap().to_vec())
                .collect(),
        );
    }

    records
}

fn reference(data: &str) -> Vec<Vec<String>> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(data.as_bytes())
        .records()
        .map(|record| record.unwrap().iter().map(String::from).collect())
        .collect()
}

proptest! {
    #[test]
    fn agrees_with_csv_crate(
        records in records(),
        crlf in any::<bool>(),
        trailing in any::<bool>(),
        slack in 1usize..64,
        simd in any::<bool>(),
    ) {
        let (data, longest) = serialize(&records, crlf, trailing);
        let capacity = longest + slack;

        let expected = reference(&data);
        prop_assert_eq!(&expected, &records);

        let utf8 = ReaderBuilder::with_capacity(capacity)
            .simd(simd)
            .from_reader(Cursor::new(&data))
            .unwrap();

        prop_assert_eq!(&read_strings(utf8), &expected);

        let units: Vec<u16> = data.encode_utf16().collect();
        let utf16 = ReaderBuilder::with_capacity(capacity)
            .simd(simd)
            .from_utf16_source(units.as_slice())
            .unwrap();

        prop_assert_eq!(&read_strings(utf16), &expected);
    }

    #[test]
    fn utf16_materialization_agrees_across_encodings(
        records in records(),
        crlf in any::<bool>(),
    ) {
        let (data, longest) = serialize(&records, crlf, true);
        let capacity = longest + 1;

        let expected: Vec<Vec<Vec<u16>>> = records
            .iter()
            .map(|record| record.iter().map(|field| field.encode_utf16().collect()).collect())
            .collect();

        let utf8 = ReaderBuilder::with_capacity(capacity)
            .from_reader(Cursor::new(&data))
            .unwrap();

        prop_assert_eq!(&read_utf16(utf8), &expected);

        let units: Vec<u16> = data.encode_utf16().collect();
        let utf16 = ReaderBuilder::with_capacity(capacity)
            .from_utf16_source(units.as_slice())
            .unwrap();

        prop_assert_eq!(&read_utf16(utf16), &expected);
    }

    #[test]
    fn chunked_source_is_invisible(
        records in records(),
        step in 1usize..16,
        slack in 1usize..16,
    ) {
        let (data, longest) = serialize(&records, false, true);
        let capacity = longest + slack;

        let whole = ReaderBuilder::with_capacity(capacity)
            .from_reader(Cursor::new(&data))
            .unwrap();

        let trickled = ReaderBuilder::with_capacity(capacity)
            .from_reader(Trickle { inner: Cursor::new(&data), step })
            .unwrap();

        prop_assert_eq!(read_strings(whole), read_strings(trickled));

        let bytes: Vec<u8> = data.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect();

        let decoded = ReaderBuilder::with_capacity(capacity)
            .from_utf16_le_reader(Trickle { inner: Cursor::new(bytes), step })
            .unwrap();

        prop_assert_eq!(read_strings(decoded), records);
    }

    #[test]
    fn plain_fields_are_returned_verbatim(
        records in prop::collection::vec(prop::collection::vec("[a-z é😀]{0,12}", 1..6), 0..12),
        simd in any::<bool>(),
    ) {
        let data: String = records
            .iter()
            .map(|record| record.join(",") + "\n")
            .collect();

        let mut reader = ReaderBuilder::new()
            .simd(simd)
            .from_reader(Cursor::new(&data))
            .unwrap();

        for record in records.iter() {
            prop_assert!(reader.read_next().unwrap());
            prop_assert_eq!(reader.field_count(), record.len());

            for (index, field) in record.iter().enumerate() {
                prop_assert_eq!(reader.get_span_raw(index).unwrap(), field.as_bytes());
                prop_assert_eq!(&*reader.get_span(index).unwrap(), field.as_bytes());
            }
        }

        prop_assert!(!reader.read_next().unwrap());

        let units: Vec<u16> = data.encode_utf16().collect();
        let mut reader = ReaderBuilder::new()
            .simd(simd)
            .from_utf16_source(units.as_slice())
            .unwrap();

        for record in records.iter() {
            prop_assert!(reader.read_next().unwrap());

            for (index, field) in record.iter().enumerate() {
                let expected: Vec<u16> = field.encode_utf16().collect();

                prop_assert_eq!(reader.get_span_raw(index).unwrap(), expected.as_slice());
                prop_assert_eq!(&*reader.get_span(index).unwrap(), expected.as_slice());
            }
        }
    }

    #[test]
    fn scan_paths_agree(data in "[a,\"\r\n é]{0,200}", slack in 1usize..64) {
        let capacity = data.len() + slack;

        prop_assert_eq!(
            read_raw_spans(data.as_bytes(), capacity, true),
            read_raw_spans(data.as_bytes(), capacity, false)
        );
    }

    #[test]
    fn quoting_then_reading_is_identity(text in "\\PC{0,40}") {
        let mut data = String::new();
        write_field(&mut data, &text, false);
        data.push('\n');

        if !data.starts_with('"') {
            data.insert(0, '"');
            data.insert(data.len() - 1, '"');
        }

        let mut reader = Reader::from_reader(Cursor::new(&data)).unwrap();
        prop_assert!(reader.read_next().unwrap());
        prop_assert_eq!(reader.field_count(), 1);
        prop_assert_eq!(reader.get_string(0).unwrap(), text.clone());

        let expected: Vec<u16> = text.encode_utf16().collect();
        prop_assert_eq!(reader.get_utf16(0).unwrap().into_owned(), expected.clone());

        let (_, bound) = reader.needs_escape(0).unwrap();
        let mut dest = vec![0u16; bound];
        let written = reader.write_to_span(0, &mut dest).unwrap();
        prop_assert_eq!(&dest[..written], expected.as_slice());
    }
}
