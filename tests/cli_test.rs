// CLI behavior that needs no browser
use anyhow::Result;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

mod common;
use common::{free_port, run_command};

#[test]
fn test_usage_error_exits_without_server() -> Result<()> {
    let home = TempDir::new()?;
    let port = free_port().to_string();

    // Exclusive flags are rejected before any connection attempt
    let (result, code) = run_command(
        home.path(),
        &["--port", &port, "click", "--selector", "#a", "--text", "Buy"],
    )?;
    assert_eq!(code, 3);
    assert_eq!(result["success"], false);
    assert_eq!(result["kind"], "usage");
    Ok(())
}

#[test]
fn test_unreachable_server_is_infrastructure() -> Result<()> {
    let home = TempDir::new()?;
    let port = free_port().to_string();

    let (result, code) = run_command(
        home.path(),
        &["--port", &port, "navigate", "https://example.com"],
    )?;
    assert_eq!(code, 1);
    assert_eq!(result["kind"], "infrastructure");
    assert!(result["error"].as_str().unwrap().contains(&port));
    Ok(())
}

#[test]
fn test_send_unknown_action() -> Result<()> {
    let home = TempDir::new()?;
    let (result, code) = run_command(home.path(), &["send", "fly"])?;
    assert_eq!(code, 3);
    assert!(result["error"].as_str().unwrap().contains("Unknown action: fly"));
    Ok(())
}

#[test]
fn test_session_status_when_stopped() -> Result<()> {
    let home = TempDir::new()?;
    let port = free_port();

    let (result, code) = run_command(
        home.path(),
        &["--port", &port.to_string(), "session", "status"],
    )?;
    assert_eq!(code, 0);
    assert_eq!(result["success"], true);
    assert_eq!(result["status"], "stopped");
    assert_eq!(result["port"], port);

    let (result, code) = run_command(
        home.path(),
        &["--port", &port.to_string(), "session", "stop"],
    )?;
    assert_eq!(code, 0);
    assert_eq!(result["outcome"], "not_running");
    Ok(())
}

#[test]
fn test_profile_commands() -> Result<()> {
    let home = TempDir::new()?;

    let (result, code) = run_command(home.path(), &["profile", "list"])?;
    assert_eq!(code, 0);
    assert_eq!(result["count"], 0);

    let (result, code) = run_command(home.path(), &["profile", "delete", "ghost"])?;
    assert_eq!(code, 2);
    assert_eq!(result["kind"], "not_found");

    let (result, code) = run_command(home.path(), &["profile", "delete", "../etc"])?;
    assert_eq!(code, 3);
    assert_eq!(result["kind"], "usage");
    Ok(())
}
