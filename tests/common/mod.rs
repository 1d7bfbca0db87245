// Common test utilities and fixtures

use anyhow::Result;
use serde_json::Value;
use std::path::Path;
use std::process::Command;

/// Run the webpilot binary with an isolated state directory
#[allow(dead_code)]
pub fn run_command(home: &Path, args: &[&str]) -> Result<(Value, i32)> {
    let output = Command::new(env!("CARGO_BIN_EXE_webpilot"))
        .args(args)
        .env("WEBPILOT_HOME", home)
        .env_remove("WEBPILOT_PORT")
        .env_remove("WEBPILOT_PROFILE")
        .output()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let exit_code = output.status.code().unwrap_or(-1);

    let json = serde_json::from_str(&stdout).unwrap_or_else(|_| {
        serde_json::json!({
            "success": exit_code == 0,
            "error": if stdout.is_empty() { stderr.to_string() } else { stdout.to_string() },
        })
    });
    Ok((json, exit_code))
}

/// A port nothing listens on
#[allow(dead_code)]
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("no free port")
}

/// Fixture pages served to the browser in end-to-end tests
#[allow(dead_code)]
pub mod fixtures {
    use axum::Router;
    use axum::http::header;
    use axum::response::{Html, IntoResponse};
    use axum::routing::get;

    pub const INDEX_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Fixture Shop</title></head>
<body>
    <h1>Fixture Shop</h1>
    <input id="q" name="q" placeholder="Search">
    <button id="buy" onclick="document.getElementById('status').textContent = 'bought'">Buy</button>
    <div id="status"></div>
    <select id="size"><option value="s">Small</option><option value="l">Large</option></select>
    <a id="export" href="/export.csv">Export</a>
    <script>console.log('fixture ready')</script>
</body>
</html>"#;

    async fn export() -> impl IntoResponse {
        (
            [
                (header::CONTENT_TYPE, "text/csv"),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"export.csv\""),
            ],
            "id,name\n1,ada\n",
        )
    }

    pub fn app() -> Router {
        Router::new()
            .route("/", get(|| async { Html(INDEX_PAGE) }))
            .route("/export.csv", get(export))
    }

    /// Serve the fixture pages on an ephemeral port, returning the base URL
    pub async fn serve() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fixture server");
        let addr = listener.local_addr().expect("fixture address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app()).await;
        });
        format!("http://{}", addr)
    }
}
