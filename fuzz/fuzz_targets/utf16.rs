#![no_main]

use libfuzzer_sys::fuzz_target;

use span_csv::ReaderBuilder;

fuzz_target!(|data: &[u8]| {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    let spans = |simd: bool| {
        let mut reader = ReaderBuilder::with_capacity(units.len() + 1)
            .simd(simd)
            .max_field_count(units.len() + 1)
            .from_utf16_source(units.as_slice())
            .unwrap();

        let mut records = Vec::new();

        while reader.read_next().unwrap() {
            for index in 0..reader.field_count() {
                records.push(reader.get_utf16(index).unwrap().into_owned());
            }
        }

        records
    };

    assert_eq!(spans(true), spans(false));
});
