pub mod backup;
pub mod cycle;
pub mod insights;
pub mod profile;
