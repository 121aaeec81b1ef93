#![allow(dead_code)]

pub mod fixtures;
pub mod handlers;

#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use handlers::*;
