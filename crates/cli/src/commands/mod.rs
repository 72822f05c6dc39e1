pub mod analyzers;
pub mod rules;
pub mod start;
pub mod validate_config;

pub use analyzers::analyzers_list_command;
pub use rules::{rules_list_command, rules_reload_command};
pub use start::start_command;
pub use validate_config::validate_config_command;
