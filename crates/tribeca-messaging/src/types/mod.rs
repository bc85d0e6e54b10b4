/*
[INPUT]:  Server payload schemas and serde requirements
[OUTPUT]: Typed Rust structs/enums with serialization support
[POS]:    Data layer - type definitions for topic payloads
[UPDATE]: When payload schemas change or new types added
*/

pub mod enums;
pub mod models;
pub mod requests;

pub use enums::*;
pub use models::*;
pub use requests::*;
