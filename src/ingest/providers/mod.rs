pub mod bluesky;
pub mod github;

pub use bluesky::BlueskyProvider;
pub use github::GithubProvider;
