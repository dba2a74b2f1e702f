pub mod storage;
pub mod webhook;
