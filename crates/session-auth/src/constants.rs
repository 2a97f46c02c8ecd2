//! Endpoint defaults and persisted-store key names

/// Login endpoint. Never carries a bearer credential; a 401 here is fatal.
pub const DEFAULT_LOGIN_PATH: &str = "/auth/login/";

/// Renewal endpoint. Body is `{"refresh": <refresh token>}`.
pub const DEFAULT_REFRESH_PATH: &str = "/auth/token/refresh/";

/// Where the session terminator sends the user.
pub const DEFAULT_ENTRY_POINT: &str = "/login";

/// Flat persisted key for the access token.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Flat persisted key for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Structured session snapshot written by the application's auth state.
/// Shape: `{"state": {"accessToken": "...", "refreshToken": "..."}}`, stored
/// either as an object or as its JSON text.
pub const SESSION_BLOB_KEY: &str = "auth-storage";
