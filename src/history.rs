//! history.rs: previously written posts, read back for headline de-duplication.

use std::fs;
use std::path::Path;

use crate::post::Post;

/// All posts that parse, newest first. Unreadable files are skipped.
pub fn load_posts(dir: &Path) -> Vec<Post> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut posts: Vec<Post> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("json"))
        .filter_map(|p| {
            let parsed = fs::read_to_string(&p)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<Post>(&s).map_err(|e| e.to_string()));
            match parsed {
                Ok(post) => Some(post),
                Err(e) => {
                    tracing::debug!(path = %p.display(), error = %e, "skipping unreadable post");
                    None
                }
            }
        })
        .collect();

    posts.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.kind.as_str().cmp(a.kind.as_str())));
    posts
}

/// Titles of the `n` most recent posts, newest first.
pub fn recent_titles(dir: &Path, n: usize) -> Vec<String> {
    load_posts(dir)
        .into_iter()
        .take(n)
        .map(|p| p.title)
        .collect()
}
