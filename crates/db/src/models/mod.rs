pub mod category;
pub mod notification;
pub mod panic_alert;
pub mod role;
pub mod user;

pub use category::*;
pub use notification::*;
pub use panic_alert::*;
pub use role::*;
pub use user::*;
