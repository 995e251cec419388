//! LDAP support.

mod checker;
mod connection;

pub use checker::*;
pub use connection::*;
