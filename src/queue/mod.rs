pub mod broadcast;

pub use broadcast::{BroadcastQueue, QueueStats, TxOutcome, TxReceiptData};
