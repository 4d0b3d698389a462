pub mod events;
pub mod extraction;
pub mod processor;
pub mod structuring;
pub mod summary;
