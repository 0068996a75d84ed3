use std::path::{Path, PathBuf};

use crate::{
    cli::command_handlers::{do_get, do_list, do_look},
    getter::FetchConfig,
    model::UrlResolver,
};

mod builder;

pub use builder::RepogetBuilder;

pub struct Repoget {
    roots: Vec<PathBuf>,
    resolver: UrlResolver,
    force_ssh: bool,
}

/// Options of one `get` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub fetch: FetchConfig,
    /// Fetch up to six targets at once, logging failures instead of stopping.
    pub parallel: bool,
    /// Open a shell in the fetched repository afterwards.
    pub look: bool,
}

impl Repoget {
    pub fn builder() -> RepogetBuilder {
        RepogetBuilder::default()
    }

    pub(crate) fn new(roots: Vec<PathBuf>, resolver: UrlResolver, force_ssh: bool) -> Self {
        Repoget {
            roots,
            resolver,
            force_ssh,
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Where new clones go.
    pub fn primary_root(&self) -> &Path {
        &self.roots[0]
    }

    /// Fetches `targets`, or the lines of standard input when there are none
    pub fn get(&self, targets: Vec<String>, mut options: GetOptions) -> anyhow::Result<()> {
        options.fetch.ssh |= self.force_ssh;
        do_get(&self.roots, &self.resolver, targets, options)
    }

    /// Opens a shell in the one local repository `name` designates
    pub fn look(&self, name: &str, bare: bool) -> anyhow::Result<()> {
        do_look(&self.roots, &self.resolver, name, bare)
    }

    /// Relative (or full) paths of local repositories matching `query`, sorted
    pub fn list(&self, query: Option<&str>, full_path: bool) -> anyhow::Result<Vec<String>> {
        do_list(&self.roots, query, full_path)
    }
}
