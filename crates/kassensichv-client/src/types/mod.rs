/*
[INPUT]:  Auth endpoint and signing module wire formats
[OUTPUT]: Typed Rust structs/enums with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When wire formats change or new types added
*/

pub mod auth;
pub mod rpc;

pub use auth::*;
pub use rpc::*;
