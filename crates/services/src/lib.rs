pub mod alerts;
pub mod auth;
pub mod dao;
pub mod directory;
pub mod dispatch;
pub mod lifecycle;
pub mod projector;
pub mod push;
pub mod session;
pub mod store;

pub use alerts::{AlertError, AlertService};
pub use auth::AuthService;
pub use dao::*;
pub use directory::RecipientDirectory;
pub use dispatch::{CreationTrigger, Dispatcher, NotifyOutcome};
pub use lifecycle::{LifecycleService, TransitionError};
pub use projector::LiveViewProjector;
pub use push::{ExpoGateway, PushGateway, RecordingGateway};
pub use session::SessionContext;
pub use store::{AlertStore, MemoryStore};
