//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> &'static str {
    r##"# Duet Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[control]
# bind = "0.0.0.0"
# port = 3000

[video]
# bind = "0.0.0.0"
# base_port = 8000         # player N listens on base_port + N - 1; 0 = ephemeral
# keepalive_secs = 1       # 1-60
# accept_timeout_secs = 0  # per accept attempt; 0 = no deadline
# buffer_size = 65536      # 1024-1048576

[pool]
# capacity = 2             # 2-64

[logging]
# level = "INFO"           # TRACE, DEBUG, INFO, WARNING, ERROR
"##
}
