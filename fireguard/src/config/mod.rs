//! Default options and how they are loaded and swapped.

mod options;
mod store;

pub use options::{
    GuardOptions, GuardSettings, ENV_DEFAULT_BACKOFF, ENV_DEFAULT_RETRY, ENV_DEFAULT_TIMEOUT_MS,
    ENV_RETRY_BASE_DELAY_MS, ENV_STRUCTURED_LOGS, ENV_SUCCESS_LOG_LEVEL,
};
pub use store::{OptionsOverride, OptionsStore};
