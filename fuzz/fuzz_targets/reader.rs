#![no_main]

use libfuzzer_sys::fuzz_target;

use span_csv::ReaderBuilder;

fuzz_target!(|data: &[u8]| {
    let mut reader = ReaderBuilder::with_capacity(data.len() + 1)
        .max_field_count(data.len() + 1)
        .from_reader(data)
        .unwrap();

    let mut dest = Vec::new();

    while reader.read_next().unwrap() {
        for index in 0..reader.field_count() {
            let (_, bound) = reader.needs_escape(index).unwrap();
            dest.resize(bound, 0u16);

            let written = reader.write_to_span(index, &mut dest).unwrap();
            assert_eq!(&dest[..written], reader.get_utf16(index).unwrap().as_ref());
        }
    }
});
