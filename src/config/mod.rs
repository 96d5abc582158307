/// Per-guild database stores and schema creation
pub mod database;

/// Application configuration loading from config.toml
pub mod settings;
