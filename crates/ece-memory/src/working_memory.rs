use std::path::Path;
use tracing::warn;

/// Whole contents of the working-memory document.
///
/// A missing or unreadable file reads as empty, which the orchestrator
/// treats as "nothing to do this cycle".
pub async fn read_file_content(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Working memory unreadable");
            String::new()
        }
    }
}

/// The last `n` characters (not bytes) of the working-memory document.
pub async fn read_last_n_chars(path: impl AsRef<Path>, n: usize) -> String {
    let content = read_file_content(path).await;
    let total = content.chars().count();
    if total <= n {
        return content;
    }
    content.chars().skip(total - n).collect()
}
