//! xclipring - Clipboard history ring for X11
//!
//! A daemon watches one selection, keeps every distinct value in a bounded
//! file-backed ring, and re-owns the selection with an older value when a
//! second invocation asks it to rotate.

pub mod clipboard;
pub mod logging;
pub mod models;
pub mod storage;
