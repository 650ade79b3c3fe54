//! Background tasks for the HTTP presentation layer

mod session_sweeper;
mod session_worker;

pub use session_sweeper::spawn_session_sweeper;
pub use session_worker::{WORKER_FAILED_MESSAGE, supervise};
