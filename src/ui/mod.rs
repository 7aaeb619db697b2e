//! Terminal output helpers
//!
//! Results go to stdout; spinners and progress lines go to stderr so
//! `--format json` output stays machine-readable.

mod context;
mod output;
mod progress;
mod prompts;

pub use context::UiContext;
pub use output::{
    header, key_value, key_value_status, remark, section, step_error, step_error_detail,
    step_info, step_ok, step_ok_detail, step_warn, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
