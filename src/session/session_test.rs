use super::*;
use crate::engine::fake::FakeDriver;
use pretty_assertions::assert_eq;

fn session() -> (Arc<FakeDriver>, SessionState) {
    let driver = Arc::new(FakeDriver::new());
    let state = SessionState::new(driver.clone(), "test", None);
    (driver, state)
}

#[tokio::test]
async fn test_page_defaults_to_existing_tab() {
    let (_driver, mut state) = session();
    assert_eq!(state.page().await.unwrap(), "page-1");
    assert_eq!(state.active_page_id().map(String::as_str), Some("page-1"));
}

#[tokio::test]
async fn test_closed_tab_promotes_last_listed() {
    let (driver, mut state) = session();
    let second = driver.new_page(None).await.unwrap();
    state.set_active_page("page-1".to_string());

    driver.drop_page("page-1");
    assert_eq!(state.page().await.unwrap(), second);
}

#[tokio::test]
async fn test_never_left_without_a_tab() {
    let (driver, mut state) = session();
    state.page().await.unwrap();
    driver.drop_page("page-1");

    let page = state.page().await.unwrap();
    assert_ne!(page, "page-1");
    assert_eq!(driver.page_ids(), vec![page]);
}

#[tokio::test]
async fn test_switching_tabs_resets_frame() {
    let (driver, mut state) = session();
    driver.add_frame("page-1", "frame-a", "checkout", "https://pay.test/");
    state.page().await.unwrap();
    state.set_active_frame(driver.frames(&"page-1".to_string()).await.unwrap()[0].clone());
    assert_eq!(state.target().await.unwrap().frame.as_deref(), Some("frame-a"));

    let other = driver.new_page(None).await.unwrap();
    state.set_active_page(other.clone());
    assert!(state.active_frame().is_none());
    assert_eq!(state.target().await.unwrap(), Target::main(other));
}

#[tokio::test]
async fn test_detached_frame_falls_back_to_main() {
    let (driver, mut state) = session();
    driver.add_frame("page-1", "frame-a", "ad", "https://ads.test/");
    state.page().await.unwrap();
    state.set_active_frame(driver.frames(&"page-1".to_string()).await.unwrap()[0].clone());

    driver.remove_frames("page-1");
    let target = state.target().await.unwrap();
    assert_eq!(target.frame, None);
    assert!(state.active_frame().is_none());
}

#[tokio::test]
async fn test_dialog_listener_follows_active_page() {
    let (driver, mut state) = session();
    state.set_dialog_policy(DialogPolicy::Accept).await.unwrap();
    assert!(driver.dialog_routed("page-1"));

    let other = driver.new_page(None).await.unwrap();
    state.set_active_page(other.clone());
    assert!(!driver.dialog_routed("page-1"));
    assert!(driver.dialog_routed(&other));

    state.set_dialog_policy(DialogPolicy::Off).await.unwrap();
    assert!(!driver.dialog_routed(&other));
    assert!(!state.has_dialog_listener());
}

#[tokio::test]
async fn test_replacing_policy_keeps_route() {
    let (driver, mut state) = session();
    state.set_dialog_policy(DialogPolicy::Accept).await.unwrap();
    state
        .set_dialog_policy(DialogPolicy::Fill("Ada".into()))
        .await
        .unwrap();
    assert!(driver.dialog_routed("page-1"));
    assert_eq!(state.dialog_policy(), &DialogPolicy::Fill("Ada".into()));
}

#[tokio::test]
async fn test_block_is_additive_and_unblock_clears() {
    let (driver, mut state) = session();
    assert!(state.block("*.png").await.unwrap());
    assert!(state.block("*://ads.test/*").await.unwrap());
    assert!(!state.block("*.png").await.unwrap());
    assert_eq!(driver.blocked(), vec!["*.png", "*://ads.test/*"]);

    assert_eq!(state.unblock_all().await.unwrap(), 2);
    assert!(driver.blocked().is_empty());
    assert!(state.blocked().is_empty());
}

#[tokio::test]
async fn test_shutdown_closes_browser() {
    let (driver, mut state) = session();
    state.network.start(driver.events());
    state.shutdown().await.unwrap();
    assert!(!state.network.is_active());
    assert!(driver.calls().contains(&"shutdown".to_string()));
}
