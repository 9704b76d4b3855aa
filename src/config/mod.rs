mod loader;

pub use loader::{
    name_match, Config, ConfigError, DuplicateConfig, EntryConfig, PlanConfig, RunConfig,
    ScanConfig, BUILD_OUTPUT_EXCLUDES,
};
