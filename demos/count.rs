use std::fs::File;

use clap::Parser;
use memmap2::Mmap;
use span_csv::{kernel_simd_instructions, ReaderBuilder};

#[derive(Parser, Debug)]
struct Args {
    /// Path to target CSV file
    path: String,

    /// Whether to count using the `csv` crate instead, for comparison
    #[arg(long)]
    csv: bool,

    /// Whether to disable SIMD acceleration
    #[arg(long)]
    scalar: bool,

    /// Whether the file is encoded in UTF-16LE
    #[arg(long)]
    utf16le: bool,

    /// Whether to memory map the file instead of streaming it
    #[arg(long)]
    mmap: bool,

    /// Whether to decode every field as UTF-16, to benchmark materialization
    #[arg(long)]
    decode: bool,

    /// Line buffer capacity, in code units
    #[arg(long, default_value_t = 1 << 20)]
    capacity: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let delimiter = if args.path.ends_with(".tsv") {
        b'\t'
    } else {
        b','
    };

    if args.csv {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_path(&args.path)?;

        let mut records: u64 = 0;
        let mut fields: u64 = 0;
        let mut record = csv::ByteRecord::new();

        while reader.read_byte_record(&mut record)? {
            records += 1;
            fields += record.len() as u64;
        }

        println!("{}\t{}", records, fields);

        return Ok(());
    }

    eprintln!("kernel: {}", kernel_simd_instructions());

    let mut builder = ReaderBuilder::with_capacity(args.capacity);
    builder.delimiter(delimiter).simd(!args.scalar);

    let file = File::open(&args.path)?;

    let (records, fields) = if args.utf16le {
        let mut reader = builder.from_utf16_le_reader(file)?;
        count(&mut reader, args.decode)?
    } else if args.mmap {
        let map = unsafe { Mmap::map(&file)? };
        let mut reader = builder.from_reader(&map[..])?;
        count(&mut reader, args.decode)?
    } else {
        let mut reader = builder.from_reader(file)?;
        count(&mut reader, args.decode)?
    };

    println!("{}\t{}", records, fields);

    Ok(())
}

fn count<T, S>(reader: &mut span_csv::Reader<T, S>, decode: bool) -> span_csv::Result<(u64, u64)>
where
    T: span_csv::CodeUnit,
    S: span_csv::Source<T>,
{
    let mut fields: u64 = 0;
    let mut scratch = Vec::new();

    while reader.read_next()? {
        let field_count = reader.field_count();
        fields += field_count as u64;

        if decode {
            for index in 0..field_count {
                let (_, bound) = reader.needs_escape(index)?;
                scratch.resize(bound, 0u16);
                reader.write_to_span(index, &mut scratch)?;
            }
        }
    }

    Ok((reader.record_index(), fields))
}
