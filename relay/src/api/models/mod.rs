pub mod transcriptions;
