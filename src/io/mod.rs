// Flat-file input and workbook-style output
pub mod reader;
pub mod writer;

pub use reader::{reader_for, DelimitedReader, SourceReader, SpreadsheetReader};
pub use writer::WorkbookWriter;
