pub mod comment;
pub mod configure;
pub mod delete;
pub mod diff;
pub mod export;
pub mod import;
pub mod info;
pub mod init;
pub mod list;
pub mod repeat;
pub mod run;
pub mod sync;
pub mod tag;
pub mod version;
