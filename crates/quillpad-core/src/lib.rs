pub mod config;
pub mod document;
pub mod markdown;
pub mod notes;
pub mod session;
pub mod storage;
pub mod sync;
pub mod tabs;
pub mod transfer;
pub mod tree;
