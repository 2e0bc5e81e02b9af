pub mod classifier;

pub use classifier::{is_spam, partition_spam};
