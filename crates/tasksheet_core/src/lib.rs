pub mod config;
pub mod error;
pub mod model;
pub mod repository;
pub mod storage;

pub use error::{AppError, ErrorKind};
pub use repository::{SaveMode, TaskRemoval, TaskRepository};
