pub mod toml_config;

pub use toml_config::{
    CompressionConfig, MonitoringConfig, ReportConfig, StoreConfig, ToolkitConfig,
    DEFAULT_CONFIG_FILE,
};
