pub mod batch;
pub mod cdo;
pub mod daily;
pub mod dedup;
pub mod fetcher;
pub mod scheduler;
