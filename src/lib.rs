pub mod buffer;
pub mod catalog;
pub mod datum;
pub mod heap;
pub mod storage;
pub mod tuple;
pub mod tx;
