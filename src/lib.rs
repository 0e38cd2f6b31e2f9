rust_i18n::i18n!("locales", fallback = "en");

pub mod config;
pub mod error;
pub mod features;
mod i18n;
mod router;
pub mod state;
mod ui;

pub use config::SigningConfig;
pub use error::{Result, SignError};
pub use features::workspace::Workspace;
pub use router::dispatch_json;

use std::sync::Once;

/// Installs the `env_logger` backend once; `RUST_LOG` overrides the `info` default.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
    });
}
