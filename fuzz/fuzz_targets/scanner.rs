#![no_main]

use libfuzzer_sys::fuzz_target;

use span_csv::ReaderBuilder;

fn spans(data: &[u8], simd: bool) -> Vec<Vec<Vec<u8>>> {
    let mut reader = ReaderBuilder::with_capacity(data.len() + 1)
        .simd(simd)
        .max_field_count(data.len() + 1)
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

fuzz_target!(|data: &[u8]| {
    assert_eq!(spans(data, true), spans(data, false));
});
