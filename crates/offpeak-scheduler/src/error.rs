use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Timer error: {0}")]
    Timer(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("Unknown time zone: {0}")]
    UnknownTimeZone(String),

    #[error("Policy rejected: {0} validation error(s)")]
    PolicyRejected(usize),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
