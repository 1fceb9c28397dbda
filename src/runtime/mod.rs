pub mod consumer;
pub mod engine;
pub mod poll_worker;
pub mod retrigger;

pub use consumer::{run_alert_consumer, ConsumerReport};
pub use engine::{AlertEngine, EngineHandle, EngineSettings, EngineSummary};
pub use poll_worker::{PollWorker, TickOutcome, WorkerReport};
pub use retrigger::{Admission, NotificationLatch, RetriggerPolicy};
