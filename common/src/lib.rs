//! Types shared between the import backend and its clients.

pub mod jobs;
pub mod model;
pub mod requests;
pub mod responses;
