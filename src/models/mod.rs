//! Data models shared by the mover and the upload front-end.
//!
//! Everything here is request-scoped: parsed from an incoming event or
//! request, used once, then dropped.

pub mod acl;
pub mod event;
pub mod resource_path;
pub mod upload;
