pub mod cli;
pub mod config;
pub mod fetch;
pub mod getter;
pub mod input;
pub mod jump;
pub mod look;
pub mod model;
pub mod vcs;
pub mod walk;

mod api;

pub use api::{GetOptions, Repoget, RepogetBuilder};
