//! Common constants used across Sidekick

/// In-band marker the backend emits when it enters its reasoning phase.
pub const THINKING_START: &str = "__THINKING_START__";

/// In-band marker the backend emits when content resumes.
pub const THINKING_END: &str = "__THINKING_END__";

/// Display name used when no name has been stored for the session
pub const DEFAULT_USER_NAME: &str = "User";

/// Default backend base URL
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Backend endpoint paths
pub mod endpoints {
    pub const CHAT: &str = "/chat/";
    pub const CHAT_HISTORY: &str = "/chat/history";
    pub const REGISTER: &str = "/auth/register";
    pub const LOGIN: &str = "/auth/login";
}

/// Keys of the persisted session store
pub mod session_keys {
    pub const TOKEN: &str = "token";
    pub const USER_NAME: &str = "userName";
    pub const USER_EMAIL: &str = "userEmail";
    pub const USER_ID: &str = "userId";
    pub const SESSION_ID: &str = "session_id";
    pub const LOGGED_IN_AT: &str = "loggedInAt";
}

/// Environment variables read by the configuration loader
pub mod env_vars {
    pub const API_URL: &str = "SIDEKICK_API_URL";
    pub const API_KEY: &str = "SIDEKICK_API_KEY";
    pub const DATA_DIR: &str = "SIDEKICK_DATA_DIR";
    pub const BACKEND_URL: &str = "SIDEKICK_BACKEND_URL";
}

/// Default timeout values in seconds
pub mod timeouts {
    pub const DEFAULT_HTTP_TIMEOUT: u64 = 30;
    pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;
}

/// Capacity of the channel between the stream task and its consumer
pub const REPLY_CHANNEL_CAPACITY: usize = 256;

/// File name of the persisted session inside the data directory
pub const SESSION_FILE: &str = "session.json";

/// File name of the optional configuration inside the data directory
pub const CONFIG_FILE: &str = "config.toml";
