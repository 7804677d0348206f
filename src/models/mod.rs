mod contact;
mod email_job;

pub use contact::Contact;
pub use email_job::{
    EmailJob, EmailJobStatus, EmailJobType, JobTransition, MAX_ERROR_LENGTH, truncate_error,
};
