//! Unified configuration system.
//!
//! Consolidates configuration from tiers with field-by-field YAML merging:
//! 1. **Defaults** - Embedded at build time
//! 2. **Project** - `$CWD/onboarding/config.yaml`
//! 3. **User** - `~/.onboarding/config.yaml`
//! 4. **Environment** - variables listed below
//!
//! ## Environment Variables
//! - `ONBOARDING_CONFIG_PATH` - Explicit config file (overrides all tiers)
//! - `ONBOARDING_DB_PATH` - Database path
//! - `ONBOARDING_UI_PORT` - Dashboard port
//! - `ONBOARDING_USER_DIR` - User config dir (default: `~/.onboarding`)
//! - `ONBOARDING_PROJECT_DIR` - Project config dir (default: `./onboarding`)

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::deep_merge;
pub use types::*;
