pub mod answer_key;
pub mod browser;
pub mod storage;
