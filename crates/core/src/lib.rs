pub mod chunking;
pub mod config;
pub mod errors;
pub mod locale;
pub mod remote_config;
pub mod session;
pub mod timezone;

pub use chunking::{chunk_message, truncate_with_ellipsis, DEFAULT_MAX_LEN};
pub use errors::{
    ApplicationError, AuthError, ConnectivityError, EngineError, FormatError, InterfaceError,
};
pub use locale::{Language, Translations};
pub use remote_config::{RemoteConfigCache, RemoteConfigError, RemoteConfigSource};
pub use session::Session;
pub use timezone::{GuildTimezones, TimeZoneSetting};
