#![allow(dead_code)]

pub mod backend;
pub mod scripted;

pub use backend::{RecordedRequest, TestBackend};
pub use scripted::ScriptedApi;
