use std::path::PathBuf;

use tower_http::services::ServeDir;

/// Serve the web client from `dir`; `/` resolves to its `index.html`.
pub fn serve_static(dir: PathBuf) -> ServeDir {
    ServeDir::new(dir).append_index_html_on_directories(true)
}
