//! Types used in the interface.

mod part_file_writer;
pub use part_file_writer::PartFileWriter;
