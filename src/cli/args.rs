use std::path::PathBuf;

use clap::{Args, Parser};

use crate::{getter::FetchConfig, vcs::VcsKind, GetOptions};

/// Fetch remote repositories into a tree keyed by their URL and jump into them.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Root directory of the repository tree, may be given several times.
    /// The first root receives new clones
    #[clap(long, global = true)]
    pub root: Vec<PathBuf>,
}

#[derive(Debug, Parser)]
pub enum Command {
    ///Clones or updates remote repositories, reading targets from stdin when none are given
    Get(GetArgs),
    ///Opens a shell in a local repository
    Look {
        name: String,
        /// Look for a bare clone
        #[clap(long)]
        bare: bool,
    },
    ///Lists local repositories
    List {
        /// Print full paths
        #[clap(short = 'p', long)]
        full_path: bool,
        query: Option<String>,
    },
    ///Prints the repository root
    Root {
        /// Print every root
        #[clap(long)]
        all: bool,
    },
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Update existing local repositories
    #[clap(short, long)]
    pub update: bool,
    /// Only fetch the latest commit
    #[clap(long)]
    pub shallow: bool,
    /// Clone over ssh
    #[clap(short = 'p')]
    pub ssh: bool,
    /// Force a VCS instead of inferring it from the URL (git, hg, svn)
    #[clap(long)]
    pub vcs: Option<VcsKind>,
    /// Do not print fetch progress
    #[clap(short, long)]
    pub silent: bool,
    /// Branch to check out
    #[clap(short, long)]
    pub branch: Option<String>,
    /// Do not fetch submodules
    #[clap(long)]
    pub no_recursive: bool,
    /// Make a bare clone
    #[clap(long)]
    pub bare: bool,
    /// Open a shell in the repository once fetched
    #[clap(short, long)]
    pub look: bool,
    /// Fetch up to six repositories at once
    #[clap(short = 'P', long)]
    pub parallel: bool,
    pub targets: Vec<String>,
}

impl GetArgs {
    /// Splits the flags into fetch settings and run options.
    pub fn into_options(self) -> (Vec<String>, GetOptions) {
        let options = GetOptions {
            fetch: FetchConfig {
                update: self.update,
                shallow: self.shallow,
                ssh: self.ssh,
                vcs: self.vcs,
                branch: self.branch,
                recursive: !self.no_recursive,
                bare: self.bare,
                silent: self.silent,
            },
            parallel: self.parallel,
            look: self.look,
        };
        (self.targets, options)
    }
}
