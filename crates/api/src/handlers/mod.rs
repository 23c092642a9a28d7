pub mod calculations;
pub mod metrics;
pub mod rules;
pub mod validation;
