pub mod alert_store;
pub mod feed;
pub mod live;
pub mod memory;
pub mod repository;

pub use alert_store::{AlertStore, NewNotification, NewPanicAlert, NewResponse};
pub use feed::{ChangeFeed, StoreEvent};
pub use live::{LiveQuery, LiveRecord};
pub use memory::MemoryStore;
pub use repository::{AlertFilter, AlertRepository, PanicStatusUpdate, UserRepository};
