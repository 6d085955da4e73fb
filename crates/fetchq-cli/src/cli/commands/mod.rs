//! CLI command handlers, one file per command.

mod add;
mod files;
mod flags;
mod remove;
mod run;
mod status;

pub use add::run_add;
pub use files::run_files;
pub use flags::run_flags;
pub use remove::run_remove;
pub use run::run_workers;
pub use status::run_status;
