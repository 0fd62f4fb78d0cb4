pub mod api;
pub mod app;
pub mod model;
pub mod storage;
pub mod writer;

pub use app::{App, RunSummary, Sink};
pub use model::{Batch, Record};
