pub mod api;
pub mod connector;
pub mod error;
pub mod notifications;
pub mod presence;
pub mod session;

pub use api::NotificationApi;
pub use connector::{ConnectionState, ConnectorConfig, RealtimeConnector, RealtimeEvents};
pub use error::{ClientError, ClientResult};
pub use notifications::NotificationFeed;
pub use presence::{PresenceTracker, UserSummary};
pub use session::ClientSession;
