//! Configuration module

mod settings;

pub use settings::AutoSaveConfig;
pub use settings::DatabaseConfig;
pub use settings::DraftsmithConfig;
pub use settings::LocalStoreConfig;
pub use settings::ReadingConfig;
pub use settings::VersionsConfig;
