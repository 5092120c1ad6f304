//! Code identity capture over git, mercurial, subversion and bazaar working copies.
//!
//! Every backend is driven through its command-line client via a
//! [`CommandRunner`], and exposed through the [`WorkingCopy`] trait.

pub mod adapter;
pub mod bazaar;
pub mod detect;
pub mod git;
pub mod mercurial;
pub mod null;
pub mod runner;
pub mod subversion;
pub mod untracked;

pub use adapter::{get_identity, AdapterOptions, VcsAdapter, WorkingCopy};
pub use detect::{detect, detect_with_preference, Detected};
pub use runner::{CommandOutput, CommandRunner, SystemRunner};
pub use untracked::new_file_patch;
