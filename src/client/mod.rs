mod client;
mod config;
mod events;
mod session;
mod state;
mod transaction;
mod url;

pub use client::{ClientHandle, ControlCommand, RtmpClient, SessionSnapshot};
pub use config::{ClientConfig, ClientConfigBuilder, MediaConfig, DEFAULT_CONNECT_TYPE, DEFAULT_FLASH_VER};
pub use events::*;
pub use session::{PeerSettings, Session};
pub use state::{SessionState, StepStatus};
pub use transaction::TransactionTable;
pub use self::url::RtmpUrl;
