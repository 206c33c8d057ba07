//! Storage for order records written by payment verification.

mod order_records;

pub use order_records::{
    InMemoryOrderRecordRepository, InsertOutcome, OrderRecordRepository,
    SeaOrmOrderRecordRepository,
};
