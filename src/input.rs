use std::io::{self, BufRead};

use is_terminal::IsTerminal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("no target args specified. see `repoget get --help` for more details")]
    NoTargets,
}

/// A forward-only source of targets.
///
/// Read failures end the stream; they are reported by [`take_error`] once
/// [`next_target`] has returned `None`.
///
/// [`take_error`]: TargetStream::take_error
/// [`next_target`]: TargetStream::next_target
pub trait TargetStream {
    fn next_target(&mut self) -> Option<String>;

    fn take_error(&mut self) -> Option<io::Error>;
}

/// Targets given on the command line.
pub struct ArgStream {
    targets: std::vec::IntoIter<String>,
}

impl ArgStream {
    pub fn new(targets: Vec<String>) -> Self {
        ArgStream {
            targets: targets.into_iter(),
        }
    }
}

impl TargetStream for ArgStream {
    fn next_target(&mut self) -> Option<String> {
        self.targets.next()
    }

    fn take_error(&mut self) -> Option<io::Error> {
        None
    }
}

/// One target per line, blank lines included.
pub struct LineStream<R> {
    reader: R,
    error: Option<io::Error>,
    done: bool,
}

impl<R: BufRead> LineStream<R> {
    pub fn new(reader: R) -> Self {
        LineStream {
            reader,
            error: None,
            done: false,
        }
    }
}

impl<R: BufRead> TargetStream for LineStream<R> {
    fn next_target(&mut self) -> Option<String> {
        if self.done {
            return None;
        }
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_owned()),
            Err(error) => {
                self.error = Some(error);
                self.done = true;
                None
            }
        }
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

/// Chooses the argument list when it is not empty and standard input
/// otherwise. An interactive standard input is refused rather than waited on.
pub fn open_targets(targets: Vec<String>) -> Result<Box<dyn TargetStream>, InputError> {
    let stdin = io::stdin();
    let interactive = stdin.is_terminal();
    select(targets, interactive, || stdin.lock())
}

fn select<'a, R, F>(
    targets: Vec<String>,
    interactive: bool,
    reader: F,
) -> Result<Box<dyn TargetStream + 'a>, InputError>
where
    R: BufRead + 'a,
    F: FnOnce() -> R,
{
    if !targets.is_empty() {
        Ok(Box::new(ArgStream::new(targets)))
    } else if interactive {
        Err(InputError::NoTargets)
    } else {
        Ok(Box::new(LineStream::new(reader())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use std::io::{Cursor, Read};

    fn drain(stream: &mut dyn TargetStream) -> Vec<String> {
        std::iter::from_fn(|| stream.next_target()).collect()
    }

    struct FailingReader {
        served: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served {
                return Err(io::Error::new(io::ErrorKind::Other, "broken pipe"));
            }
            self.served = true;
            let line = b"x/a\n";
            buf[..line.len()].copy_from_slice(line);
            Ok(line.len())
        }
    }

    #[test]
    fn arg_stream_yields_in_order() {
        let mut stream = ArgStream::new(vec!["x/a".to_owned(), "x/b".to_owned()]);
        assert_eq!(drain(&mut stream), vec!["x/a", "x/b"]);
        assert_eq!(stream.next_target(), None);
        assert!(stream.take_error().is_none());
    }

    #[test]
    fn empty_arg_stream_ends_cleanly() {
        let mut stream = ArgStream::new(Vec::new());
        assert_eq!(stream.next_target(), None);
        assert!(stream.take_error().is_none());
    }

    #[test]
    fn line_stream_strips_line_endings_and_keeps_blank_lines() {
        let mut stream = LineStream::new(Cursor::new("x/a\r\n\n  \nx/b\nx/c"));
        assert_eq!(drain(&mut stream), vec!["x/a", "", "  ", "x/b", "x/c"]);
        assert!(stream.take_error().is_none());
    }

    #[test]
    fn line_stream_reports_read_error_at_the_end() {
        let reader = io::BufReader::new(FailingReader { served: false });
        let mut stream = LineStream::new(reader);
        assert_eq!(stream.next_target(), Some("x/a".to_owned()));
        assert_eq!(stream.next_target(), None);
        assert_eq!(stream.next_target(), None);
        let error = stream.take_error().unwrap();
        assert_eq!(error.to_string(), "broken pipe");
    }

    #[test]
    fn select_prefers_arguments() {
        let mut stream = select(vec!["x/a".to_owned()], true, || Cursor::new("x/b\n")).unwrap();
        assert_eq!(drain(stream.as_mut()), vec!["x/a"]);
    }

    #[test]
    fn select_refuses_interactive_stdin() {
        let result = select(Vec::new(), true, || Cursor::new(""));
        assert!(matches!(result, Err(InputError::NoTargets)));
    }

    #[test]
    fn select_reads_piped_stdin() {
        let mut stream = select(Vec::new(), false, || Cursor::new("x/a\nx/b\n")).unwrap();
        assert_eq!(drain(stream.as_mut()), vec!["x/a", "x/b"]);
    }
}
