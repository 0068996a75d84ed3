use std::sync::Arc;

use log::{debug, error};
use thiserror::Error;
use tokio::{
    runtime::Handle,
    sync::Semaphore,
    task::JoinSet,
};

use crate::{
    getter::{GetError, Getter},
    input::TargetStream,
    model::LocalRepository,
    vcs::VcsClient,
};

/// Maximum number of fetches in flight in parallel mode.
pub const PARALLELISM: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMode {
    /// Stream order, stop at the first failure.
    Sequential,
    /// Up to [`PARALLELISM`] fetches at once, failures are logged and skipped.
    Parallel,
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Get(#[from] GetError),
    #[error("error occurred while reading input: {0}")]
    Input(std::io::Error),
}

/// What a run leaves behind for a following look.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct FetchSummary {
    pub count: usize,
    pub first_target: Option<String>,
    /// Only kept when the run consumed exactly one target.
    pub repository: Option<LocalRepository>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LookTarget {
    Repository(LocalRepository),
    Name(String),
}

impl FetchSummary {
    /// A single fetched repository is used as is; with several targets only
    /// the first target's name is kept, to be looked up again.
    pub fn look_target(self) -> Option<LookTarget> {
        match self.count {
            0 => None,
            1 => self.repository.map(LookTarget::Repository),
            _ => self.first_target.map(LookTarget::Name),
        }
    }

    fn record(&mut self, target: &str) {
        if self.first_target.is_none() {
            self.first_target = Some(target.to_owned());
        }
        self.count += 1;
    }
}

/// Runs every target of `stream` through `getter`.
///
/// Blocking work runs on the caller's thread in sequential mode and on the
/// blocking pool of `handle` in parallel mode. Must not be called from within
/// an async context.
pub fn fetch_all<C>(
    stream: &mut dyn TargetStream,
    getter: Arc<Getter<C>>,
    mode: FetchMode,
    handle: &Handle,
) -> Result<FetchSummary, FetchError>
where
    C: VcsClient + 'static,
{
    let gate = Arc::new(Semaphore::new(PARALLELISM));
    let mut tasks = JoinSet::new();
    let mut summary = FetchSummary::default();

    while let Some(target) = stream.next_target() {
        summary.record(&target);
        match mode {
            FetchMode::Sequential => {
                let repository = fetch_one(&getter, &target)?;
                summary.repository = Some(repository);
            }
            FetchMode::Parallel => {
                let permit = handle
                    .block_on(gate.clone().acquire_owned())
                    .expect("admission gate is never closed");
                let getter = getter.clone();
                tasks.spawn_blocking_on(
                    move || {
                        let _permit = permit;
                        fetch_one(&getter, &target)
                            .map_err(|err| error!("{}", err))
                            .ok()
                    },
                    handle,
                );
            }
        }
    }

    handle.block_on(async {
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Some(repository)) => summary.repository = Some(repository),
                Ok(None) => {}
                Err(err) => error!("Fetch task failed: {}", err),
            }
        }
    });

    if let Some(err) = stream.take_error() {
        return Err(FetchError::Input(err));
    }
    if summary.count != 1 {
        summary.repository = None;
    }
    debug!("Processed {} target(s)", summary.count);
    Ok(summary)
}

fn fetch_one<C: VcsClient>(getter: &Getter<C>, target: &str) -> Result<LocalRepository, GetError> {
    getter.get(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        io::{self, Read},
        path::{Path, PathBuf},
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use crate::{
        getter::FetchConfig,
        input::{ArgStream, LineStream},
        model::{RemoteUrl, UrlResolver},
        vcs::CloneOptions,
    };
    use anyhow::bail;
    use pretty_assertions::assert_eq;
    use tokio::runtime::Runtime;

    /// Tracks how many fetches run at once and which URLs were fetched.
    #[derive(Default)]
    struct InstrumentedClient {
        active: AtomicUsize,
        high_water: AtomicUsize,
        fetched: Mutex<Vec<String>>,
    }

    impl VcsClient for InstrumentedClient {
        fn clone_or_update(
            &self,
            url: &RemoteUrl,
            _destination: &Path,
            _options: &CloneOptions,
        ) -> anyhow::Result<()> {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(active, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            self.fetched.lock().unwrap().push(url.path_parts().join("/"));
            self.active.fetch_sub(1, Ordering::SeqCst);
            if url.as_str().ends_with("/b") {
                bail!("remote hung up");
            }
            Ok(())
        }
    }

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    fn getter() -> Arc<Getter<InstrumentedClient>> {
        Arc::new(Getter::new(
            FetchConfig::default(),
            UrlResolver::default(),
            PathBuf::from("/repos"),
            InstrumentedClient::default(),
        ))
    }

    fn targets(names: &[&str]) -> ArgStream {
        ArgStream::new(names.iter().map(|name| format!("x/{name}")).collect())
    }

    fn fetched(getter: &Getter<InstrumentedClient>) -> Vec<String> {
        let mut fetched = getter.client().fetched.lock().unwrap().clone();
        fetched.sort();
        fetched
    }

    #[test]
    fn parallel_mode_never_exceeds_the_gate() {
        let runtime = runtime();
        let getter = getter();
        let names: Vec<String> = (0..40).map(|i| format!("repo{i}")).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();

        let summary = fetch_all(
            &mut targets(&names),
            getter.clone(),
            FetchMode::Parallel,
            runtime.handle(),
        )
        .unwrap();

        assert_eq!(summary.count, 40);
        assert_eq!(fetched(&getter).len(), 40);
        let high_water = getter.client().high_water.load(Ordering::SeqCst);
        assert_eq!(high_water, PARALLELISM);
    }

    #[test]
    fn parallel_mode_with_few_targets_stays_under_the_gate() {
        let runtime = runtime();
        let getter = getter();

        fetch_all(
            &mut targets(&["a", "c", "d", "e"]),
            getter.clone(),
            FetchMode::Parallel,
            runtime.handle(),
        )
        .unwrap();

        assert!(getter.client().high_water.load(Ordering::SeqCst) <= PARALLELISM);
    }

    #[test]
    fn sequential_mode_stops_at_first_failure() {
        let runtime = runtime();
        let getter = getter();

        let error = fetch_all(
            &mut targets(&["a", "b", "c"]),
            getter.clone(),
            FetchMode::Sequential,
            runtime.handle(),
        )
        .unwrap_err();

        assert_eq!(error.to_string(), "failed to get \"x/b\": remote hung up");
        assert!(matches!(error, FetchError::Get(GetError { ref target, .. }) if target == "x/b"));
        assert_eq!(fetched(&getter), vec!["x/a", "x/b"]);
        assert_eq!(getter.client().high_water.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blank_line_is_a_failing_target() {
        let runtime = runtime();
        let getter = getter();
        let mut stream = LineStream::new(io::Cursor::new("x/a\n\nx/c\n"));

        let error = fetch_all(
            &mut stream,
            getter.clone(),
            FetchMode::Sequential,
            runtime.handle(),
        )
        .unwrap_err();

        assert_eq!(error.to_string(), "failed to get \"\": Empty repository name");
        assert_eq!(fetched(&getter), vec!["x/a"]);
    }

    #[test]
    fn trailing_blank_line_counts_as_a_target() {
        let runtime = runtime();
        let mut stream = LineStream::new(io::Cursor::new("x/a\n\n"));

        let summary = fetch_all(&mut stream, getter(), FetchMode::Parallel, runtime.handle())
            .unwrap();

        assert_eq!(summary.count, 2);
        assert_eq!(summary.look_target(), Some(LookTarget::Name("x/a".to_owned())));
    }

    #[test]
    fn parallel_mode_continues_past_failures() {
        let runtime = runtime();
        let getter = getter();

        let summary = fetch_all(
            &mut targets(&["a", "b", "c"]),
            getter.clone(),
            FetchMode::Parallel,
            runtime.handle(),
        )
        .unwrap();

        assert_eq!(fetched(&getter), vec!["x/a", "x/b", "x/c"]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.look_target(), Some(LookTarget::Name("x/a".to_owned())));
    }

    #[test]
    fn single_target_retains_its_repository() {
        let runtime = runtime();
        for mode in [FetchMode::Sequential, FetchMode::Parallel] {
            let summary =
                fetch_all(&mut targets(&["a"]), getter(), mode, runtime.handle()).unwrap();
            let expected = LocalRepository::from_parts(
                Path::new("/repos"),
                vec!["github.com".to_owned(), "x".to_owned(), "a".to_owned()],
            );
            assert_eq!(summary.look_target(), Some(LookTarget::Repository(expected)));
        }
    }

    #[test]
    fn single_failed_target_retains_nothing() {
        let runtime = runtime();
        let summary = fetch_all(
            &mut targets(&["b"]),
            getter(),
            FetchMode::Parallel,
            runtime.handle(),
        )
        .unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.look_target(), None);
    }

    #[test]
    fn empty_stream_is_not_an_error() {
        let runtime = runtime();
        let summary = fetch_all(
            &mut targets(&[]),
            getter(),
            FetchMode::Sequential,
            runtime.handle(),
        )
        .unwrap();
        assert_eq!(summary, FetchSummary::default());
    }

    struct BrokenAfter {
        data: io::Cursor<&'static str>,
    }

    impl Read for BrokenAfter {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::Other, "stdin closed")),
                read => Ok(read),
            }
        }
    }

    #[test]
    fn input_error_surfaces_after_launched_tasks_finish() {
        let runtime = runtime();
        let getter = getter();
        let mut stream = LineStream::new(io::BufReader::new(BrokenAfter {
            data: io::Cursor::new("x/a\nx/b\nx/c\n"),
        }));

        let error = fetch_all(
            &mut stream,
            getter.clone(),
            FetchMode::Parallel,
            runtime.handle(),
        )
        .unwrap_err();

        assert_eq!(
            error.to_string(),
            "error occurred while reading input: stdin closed"
        );
        assert_eq!(fetched(&getter), vec!["x/a", "x/b", "x/c"]);
    }
}
