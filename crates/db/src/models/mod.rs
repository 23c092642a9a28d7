pub mod calculation;
pub mod event;
pub mod report;
pub mod rule;
