#![cfg_attr(docsrs, feature(doc_cfg))]

/*!
 # Lazy CSV for Rust

 An incremental CSV tokenizer. It consumes an open input stream chunk by
 chunk and produces rows without materializing the whole file in memory.

 It tolerates common real-world corruption: extra whitespace around
 separators, quoted fields containing embedded separators, and
 backslash-escaped quote characters inside quoted fields. Optionally the
 first row is mapped to field names and the following rows are returned as
 records keyed by those names.

 ## Core Concepts

- **LazyCsvReader:** wraps any `Read` source and hands out one `Row` at a time.
- **Row:** either positional fields or a header-keyed record.
- **ItemReader:** pull-style access, one row per call.
- **ItemHandler:** push-style access, one call per row.

 ## Getting Started

```rust
use lazy_csv::{
    core::item::ItemReader,
    error::CsvError,
    item::csv::csv_reader::LazyCsvReaderBuilder,
};

fn main() -> Result<(), CsvError> {
    let csv = "year,make,model
1948,Porsche,356
1995,Peugeot,\"205, GTI\"
";

    let reader = LazyCsvReaderBuilder::new()
        .col_sep(",")
        .headers(true)
        .from_reader(csv.as_bytes())?;

    while let Some(car) = reader.read()? {
        println!("{:?} {:?}", car.get_field("make"), car.get_field("model"));
    }

    assert_eq!(reader.row_count(), 2);

    Ok(())
}
```

 ## Logging

 The crate logs through the `log` facade. Set the `debug` option to trace
 every match and buffer refill at `debug` level.

 ## License
 Licensed under either of

 -   Apache License, Version 2.0
     ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
 -   MIT license
     ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)

 at your option.
 */

/// Core reader and handler abstractions
pub mod core;

/// Error types for lazy CSV reading
pub mod error;

#[doc(inline)]
pub use error::*;

/// Item readers (for now: the lazy CSV reader)
pub mod item;
