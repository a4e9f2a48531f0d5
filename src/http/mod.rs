//! HTTP request layer (§4.F): a transport seam plus the two request
//! shapes the facade issues (`update`, `select`).

pub mod client;
pub mod options;
pub mod response;
