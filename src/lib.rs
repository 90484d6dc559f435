mod counter;
mod crawler;
mod fetcher;
mod http;
mod visited;

pub use counter::*;
pub use crawler::*;
pub use fetcher::*;
pub use http::*;
pub use visited::*;

pub type Result<T> = eyre::Result<T>;
