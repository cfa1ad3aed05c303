use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpindleError {
    /// The cancel target is unknown to the hub. Surfaced to the caller.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// A job was routed to a spoke whose bound does not contain its trigger
    /// time. Indicates a routing bug in the hub.
    #[error("job {job_id} is outside spoke bound {bound}")]
    WrongBound { job_id: String, bound: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, SpindleError>;
