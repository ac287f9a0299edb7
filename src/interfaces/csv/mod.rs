pub mod event_reader;
pub mod result_writer;
