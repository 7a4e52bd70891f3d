pub mod assignment;
pub mod attendance;
pub mod captcha;
pub mod common;
pub mod notification;
pub mod parent;
pub mod profile;
pub mod result;
pub mod student;
pub mod subject;
pub mod teacher;
pub mod user;

pub use assignment::*;
pub use attendance::*;
pub use captcha::*;
pub use common::*;
pub use notification::*;
pub use parent::*;
pub use profile::*;
pub use result::*;
pub use student::*;
pub use subject::*;
pub use teacher::*;
pub use user::*;
