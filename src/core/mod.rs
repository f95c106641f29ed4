pub mod error;
pub mod events;
pub mod model;
pub mod progress;
pub mod saver;
pub mod workflow;
