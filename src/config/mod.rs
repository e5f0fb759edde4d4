/// Database connection and schema creation
pub mod database;

/// Settings file loading with environment overrides
pub mod settings;
