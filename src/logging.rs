use log::{info, LevelFilter};

use crate::privacy::config::PrivacyConfig;

/// Inits logging for host. Safe to call more than once; only the first
/// call installs the logger. RUST_LOG, if set, refines the given level.
pub fn init_logging(level: LevelFilter) {
    env_logger::Builder::new().filter(None, level).parse_default_env().try_init().ok();
    log::set_max_level(level)
}

/// Parses the privacy flags and brings up logging at the level they select
pub fn load_config(flags: Vec<String>) -> PrivacyConfig {
    let config = PrivacyConfig::parse(flags);
    init_logging(config.log_level);
    info!("privacy config: {:?}", config.dump());
    config
}
