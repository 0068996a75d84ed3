use std::{
    path::PathBuf,
    sync::{Arc, Mutex, PoisonError},
};

use log::{debug, info};

use crate::{
    fetch::{self, FetchMode, LookTarget},
    getter::Getter,
    input,
    jump,
    look::Locator,
    model::{LocalRepository, UrlResolver},
    vcs::SystemVcs,
    walk::{RepositoryWalker, RootWalker},
    GetOptions,
};

/// Handler to get command
/// Fetches every target into the first root, then optionally jumps into the result
pub fn do_get(
    roots: &[PathBuf],
    resolver: &UrlResolver,
    targets: Vec<String>,
    options: GetOptions,
) -> anyhow::Result<()> {
    let mode = if options.parallel {
        FetchMode::Parallel
    } else {
        FetchMode::Sequential
    };
    let config = options.fetch.for_mode(mode);
    let bare = config.bare;
    let root = roots
        .first()
        .ok_or_else(|| anyhow::anyhow!("No repository root configured"))?;

    let mut stream = input::open_targets(targets)?;
    let getter = Arc::new(Getter::new(
        config,
        resolver.clone(),
        root.clone(),
        SystemVcs::default(),
    ));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let summary = fetch::fetch_all(stream.as_mut(), getter, mode, runtime.handle())?;
    debug!("Consumed {} target(s)", summary.count);

    if !options.look {
        return Ok(());
    }
    match summary.look_target() {
        Some(LookTarget::Repository(repository)) => jump::jump(&repository)?,
        Some(LookTarget::Name(name)) => do_look(roots, resolver, &name, bare)?,
        None => info!("Nothing was fetched, not opening a shell"),
    }
    Ok(())
}

/// Handler to look command
pub fn do_look(
    roots: &[PathBuf],
    resolver: &UrlResolver,
    name: &str,
    bare: bool,
) -> anyhow::Result<()> {
    let walker = RootWalker::new(roots.to_vec());
    let repository = Locator::new(&walker, resolver, roots).locate(name, bare)?;
    jump::jump(&repository)?;
    Ok(())
}

/// Handler to list command
/// Repositories under every root, optionally filtered by `query`, sorted
pub fn do_list(
    roots: &[PathBuf],
    query: Option<&str>,
    full_path: bool,
) -> anyhow::Result<Vec<String>> {
    let walker = RootWalker::new(roots.to_vec());
    let mut listed = collect(&walker, query, full_path)?;
    listed.sort();
    Ok(listed)
}

fn collect(
    walker: &impl RepositoryWalker,
    query: Option<&str>,
    full_path: bool,
) -> anyhow::Result<Vec<String>> {
    let found = Mutex::new(Vec::new());
    walker.walk_all(&|repository: LocalRepository| {
        if query.is_some_and(|query| !repository.matches(query)) {
            return;
        }
        let line = if full_path {
            repository.full_path().display().to_string()
        } else {
            repository.slash_path()
        };
        found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
    })?;
    Ok(found.into_inner().unwrap_or_else(PoisonError::into_inner))
}
