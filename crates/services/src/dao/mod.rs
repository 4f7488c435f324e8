pub mod alert;
pub mod base;
pub mod user;

pub use alert::AlertDao;
pub use base::{BaseDao, DaoError, DaoResult};
pub use user::UserDao;
