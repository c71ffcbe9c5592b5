pub mod queue;
pub mod runner;
pub mod worker;

pub use queue::{ChannelJobQueue, Job, JobEnvelope, JobQueue};
pub use runner::{process_job, JobError, JobReport, JobRunner, LocalRunner, RemoteRunner};
pub use worker::Worker;
