/*!
The `span-csv` crate provides a streaming CSV reader giving zero-copy access
to the fields of one record at a time, able to leverage
[SIMD](https://en.wikipedia.org/wiki/Single_instruction,_multiple_data) instructions
to find field boundaries.

It reads either UTF-8 data, from any [`std::io::Read`], or UTF-16 data, from
any [`Source<u16>`], and is able to hand fields over as UTF-16 text in both
cases, decoding UTF-8 lazily and only when a field actually requires it.

Is is less flexible and user-friendly than the [`csv`](https://docs.rs/csv/) crate,
so one should make sure the performance gain is worth it before going further.

# Examples

*Reading a CSV file field by field*

```
use std::fs::File;
use span_csv::Reader;

let mut reader = Reader::from_reader(File::open("data.csv")?)?;

while reader.read_next()? {
    for i in 0..reader.field_count() {
        dbg!(reader.get_span(i)?);
    }
}
```

*Using a builder to configure your reader*

```
use std::fs::File;
use span_csv::ReaderBuilder;

let mut reader = ReaderBuilder::new()
    .delimiter(b'\t')
    .has_headers(true)
    .buffer_capacity(64 * (1 << 10))
    .from_reader(File::open("data.tsv")?)?;

let age = reader.index_of("age").unwrap();

while reader.read_next()? {
    let age: u8 = reader.parse(age)?;
}
```

*Handing fields over as UTF-16 text, without allocating*

```
use std::fs::File;
use span_csv::Reader;

let mut reader = Reader::from_reader(File::open("data.csv")?)?;
let mut scratch = vec![0u16; 1024];

while reader.read_next()? {
    let (_, bound) = reader.needs_escape(0)?;

    if bound > scratch.len() {
        scratch.resize(bound, 0);
    }

    let written = reader.write_to_span(0, &mut scratch)?;
    dbg!(&scratch[..written]);
}
```

*Reading UTF-16LE data*

```
use std::fs::File;
use span_csv::ReaderBuilder;

let mut reader = ReaderBuilder::new().from_utf16_le_reader(File::open("data.csv")?)?;

while reader.read_next()? {
    dbg!(reader.get_utf16(0)?);
}
```

# Design notes

## Fixed line buffer

The reader owns a single buffer whose capacity is given once and for all by
[`ReaderBuilder::buffer_capacity`]. Records are always scanned inside this
buffer, and fields are handed over as slices of it.

When a record is not terminated within the valid part of the buffer, its
units are moved to the front of the buffer and the buffer is filled again from
the source. This is the only time data is ever moved around, and it happens
before scanning, so the fields of the current record always stay valid until
the next call to [`Reader::read_next`].

This also means the buffer never grows. A record that does not fit into it
will make the reader fail with [`ErrorKind::BufferTooSmall`].

## Scanning

Records are scanned by a traditional state machine toggling a single "inside
quotes" flag, but code units are classified 32 at a time using SIMD
instructions (or [SWAR](https://en.wikipedia.org/wiki/SWAR)-like portable
code) so that the state machine only runs on delimiters, quotes and line feeds
(and non-ASCII bytes, in UTF-8 mode, so we can tell which fields will need
decoding later on).

In UTF-16 mode, code units are narrowed to bytes before being classified.
Units outside of the Latin-1 range saturate to `0xFF` so they can never be
mistaken for structural characters.

The scalar path used when [`ReaderBuilder::simd`] is disabled produces the
exact same results.

## Materialization

Scanning records how many quotes were found in each field. This lets the
reader pick the cheapest way to hand a field over:

1. fields without quotes are returned as-is,
2. fields wrapped in a single pair of quotes are returned without them,
3. everything else, i.e. fields with doubled quotes, or non-ASCII fields
   requested as UTF-16 from UTF-8 data, is walked once to unescape and/or
   decode it.

# Caveats

## Quotes are never validated

Any quote character toggles the state machine, wherever it appears. A quote
opened in the middle of a field will therefore swallow following delimiters
and line feeds, possibly until the end of the stream. Fields with quotes
not wrapping them are returned verbatim.

## Regarding line terminators

Records are terminated by LF. Whether a trailing CR must be stripped from
records is decided once and for all by looking at the first record of the
stream, so a file mixing CRLF and LF line terminators will not be parsed
consistently: if the first record ends with LF, every subsequent CR will be
kept as part of the last field of its record.

## Empty lines

Empty lines are not skipped: they are read as records with a single empty
field.
*/
mod error;
mod line_buffer;
mod reader;
mod scanner;
mod searcher;
mod source;
mod unescape;
mod unit;

pub use error::{Error, ErrorKind, Result};
pub use reader::{Reader, ReaderBuilder, Utf16Reader, Utf8Reader};
pub use searcher::kernel_simd_instructions;
pub use source::{Source, Utf16LeSource, Utf16Units};
pub use unit::CodeUnit;
