pub mod counter;
pub mod decoder;
pub mod detector;
pub mod job_store;
pub mod pipeline;
pub mod queue;
pub mod runner;
pub mod sampler;
pub mod storage;
