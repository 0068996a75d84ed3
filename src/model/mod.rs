mod local;
mod remote;

pub use local::{LocalPathError, LocalRepository};
pub use remote::{RemoteUrl, UrlError, UrlResolver, DEFAULT_HOST};
