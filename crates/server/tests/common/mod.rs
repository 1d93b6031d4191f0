//! Common test utilities.

pub mod server;

#[allow(unused_imports)]
pub use server::*;

use std::net::TcpListener;

#[allow(dead_code)]
pub fn can_bind_localhost() -> bool {
    TcpListener::bind("127.0.0.1:0").is_ok()
}
