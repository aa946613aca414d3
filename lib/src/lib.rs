//! Shared domain types, contract constants and crypto helpers of the sower
//! gateway: the provide-task records that cross the store and the bus, and the
//! secp256k1 request-signature primitives workers and gateways agree on.

pub mod consts;
pub mod signature;
pub mod task;
pub mod utils;

mod macros;
