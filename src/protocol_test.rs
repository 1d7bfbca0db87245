// Unit tests for the command protocol

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn parse(action: &str, params: Value) -> Result<Command, ParseError> {
    Command::from_envelope(Envelope {
        action: action.to_string(),
        params,
    })
}

fn usage_message(action: &str, params: Value) -> String {
    let command = parse(action, params).expect("params should deserialize");
    match command.validate() {
        Err(Error::Usage(msg)) => msg,
        other => panic!("expected usage error for {action}, got {other:?}"),
    }
}

#[test]
fn test_every_action_parses_from_its_own_serialization() {
    let samples = vec![
        Command::Navigate(NavigateParams {
            url: Some("https://example.com".into()),
            ..Default::default()
        }),
        Command::Tabs(TabsParams::default()),
        Command::Console(ConsoleParams {
            action: CaptureAction::Start,
        }),
        Command::Dialog(DialogParams {
            mode: DialogMode::Fill,
            text: Some("yes".into()),
        }),
    ];

    for command in samples {
        let wire = serde_json::to_value(&command).unwrap();
        let envelope: Envelope = serde_json::from_value(wire).unwrap();
        assert_eq!(envelope.action, command.action());
        let back = Command::from_envelope(envelope).unwrap();
        assert_eq!(back.action(), command.action());
    }
}

#[test]
fn test_action_names_are_all_accepted() {
    for action in Command::ACTIONS {
        match parse(action, json!({})) {
            Ok(command) => assert_eq!(command.action(), action),
            // Sub-action enums without a default need their positional value
            Err(ParseError::Params(Error::Usage(msg))) => {
                assert!(msg.contains(action), "{msg}")
            }
            Err(other) => panic!("{action}: {other}"),
        }
    }
}

#[test]
fn test_unknown_action_is_distinguishable() {
    match parse("teleport", json!({})) {
        Err(ParseError::UnknownAction(name)) => assert_eq!(name, "teleport"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_missing_params_defaults_to_empty_object() {
    let command = parse("snapshot", Value::Null).unwrap();
    assert!(matches!(command, Command::Snapshot(ref p) if !p.html && !p.text));
    command.validate().unwrap();
}

#[test]
fn test_params_are_camel_case_on_the_wire() {
    let command = parse(
        "navigate",
        json!({"url": "https://example.com", "waitUntil": "networkidle"}),
    )
    .unwrap();
    match command {
        Command::Navigate(p) => assert_eq!(p.wait_until, Some(LoadState::Networkidle)),
        other => panic!("unexpected {other:?}"),
    }

    let command = parse("screenshot", json!({"fullPage": true})).unwrap();
    assert!(matches!(command, Command::Screenshot(ref p) if p.full_page));
}

#[test]
fn test_bad_param_types_are_usage_errors() {
    match parse("click", json!({"count": "twice"})) {
        Err(ParseError::Params(err)) => {
            assert_eq!(err.kind(), "usage");
            assert!(err.to_string().contains("click"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn test_click_requires_exactly_one_target() {
    let msg = usage_message("click", json!({}));
    assert!(msg.contains("one of"), "{msg}");

    let msg = usage_message("click", json!({"selector": "#a", "text": "Go"}));
    assert!(msg.contains("only one"), "{msg}");

    let msg = usage_message("click", json!({"x": 10.0}));
    assert!(msg.contains("together"), "{msg}");

    parse("click", json!({"x": 1.0, "y": 2.0}))
        .unwrap()
        .validate()
        .unwrap();
}

#[test]
fn test_type_requires_key_or_selector_with_text() {
    usage_message("type", json!({}));
    usage_message("type", json!({"selector": "#q"}));
    usage_message("type", json!({"key": "Enter", "selector": "#q", "text": "x"}));
    usage_message("type", json!({"key": "Enter", "submit": true}));

    parse("type", json!({"key": "Enter"}))
        .unwrap()
        .validate()
        .unwrap();
    parse("type", json!({"selector": "#q", "text": "rust", "submit": true}))
        .unwrap()
        .validate()
        .unwrap();
}

#[test]
fn test_mouse_sub_actions_validate_their_own_params() {
    usage_message("mouse", json!({"action": "hover"}));
    usage_message("mouse", json!({"action": "hover", "selector": "a", "x": 1.0, "y": 1.0}));
    usage_message("mouse", json!({"action": "drag", "from": "#a"}));
    usage_message("mouse", json!({"action": "move", "x": 1.0}));
    usage_message("mouse", json!({"action": "wheel"}));

    for ok in [
        json!({"action": "hover", "selector": "a"}),
        json!({"action": "drag", "from": "#a", "to": "#b"}),
        json!({"action": "move", "x": 5.0, "y": 6.0}),
        json!({"action": "wheel", "dy": -120.0}),
    ] {
        parse("mouse", ok).unwrap().validate().unwrap();
    }
}

#[test]
fn test_select_strategies() {
    usage_message("select", json!({"value": "a"}));
    usage_message("select", json!({"selector": "#s"}));
    usage_message("select", json!({"selector": "#s", "value": "a", "index": 1}));

    let params: SelectParams = serde_json::from_value(json!({"selector": "#s", "list": true})).unwrap();
    assert_eq!(params.validate().unwrap(), None);

    let params: SelectParams = serde_json::from_value(json!({"selector": "#s", "label": "Two"})).unwrap();
    assert_eq!(
        params.validate().unwrap(),
        Some(OptionChoice::Label("Two".into()))
    );
}

#[test]
fn test_scroll_modes_and_defaults() {
    usage_message("scroll", json!({}));
    usage_message("scroll", json!({"to": "top", "dy": 100.0}));

    let params: ScrollParams = serde_json::from_value(json!({"infinite": true})).unwrap();
    assert_eq!(
        params.validate().unwrap(),
        ScrollRequest::Infinite {
            max: 10,
            delay_ms: 1000
        }
    );

    let params: ScrollParams = serde_json::from_value(json!({"dy": 250.0})).unwrap();
    assert_eq!(
        params.validate().unwrap(),
        ScrollRequest::By { dx: 0.0, dy: 250.0 }
    );
}

#[test]
fn test_download_modes() {
    usage_message("download", json!({}));
    usage_message("download", json!({"url": "https://x.test/a.pdf"}));
    usage_message("download", json!({"selector": "#dl"}));
    usage_message(
        "download",
        json!({"url": "https://x.test/a", "output": "/tmp/a", "selector": "#dl"}),
    );
    usage_message("download", json!({"url": "not a url", "output": "/tmp/a"}));

    let params: DownloadParams =
        serde_json::from_value(json!({"text": "Export", "dir": "/tmp/dl"})).unwrap();
    assert_eq!(
        params.validate().unwrap(),
        DownloadMode::Click {
            target: Locator::Text("Export".into()),
            dir: "/tmp/dl".into()
        }
    );
}

#[test]
fn test_screenshot_format_from_extension() {
    let shot = |path: &str| ScreenshotParams {
        path: Some(path.to_string()),
        ..Default::default()
    };
    assert_eq!(shot("a.png").validate().unwrap(), ImageFormat::Png);
    assert_eq!(shot("a.JPG").validate().unwrap(), ImageFormat::Jpeg);
    assert_eq!(shot("a.jpeg").validate().unwrap(), ImageFormat::Jpeg);
    assert_eq!(shot("a.webp").validate().unwrap(), ImageFormat::Webp);
    assert!(shot("a.gif").validate().is_err());
    assert_eq!(
        ScreenshotParams::default().validate().unwrap(),
        ImageFormat::Png
    );

    usage_message("screenshot", json!({"fullPage": true, "selector": "#x"}));
}

#[test]
fn test_wait_needs_a_condition() {
    usage_message("wait", json!({}));
    usage_message("wait", json!({"hidden": true}));
    parse("wait", json!({"selector": ".spinner", "hidden": true}))
        .unwrap()
        .validate()
        .unwrap();
}

#[test]
fn test_check_expected_rules() {
    usage_message("check", json!({"kind": "visible"}));
    usage_message("check", json!({"kind": "text", "selector": "h1"}));
    usage_message("check", json!({"kind": "count", "selector": "li", "expected": "many"}));
    usage_message("check", json!({"kind": "visible", "selector": "h1", "expected": "x"}));
    parse("check", json!({"kind": "count", "selector": "li", "expected": "0"}))
        .unwrap()
        .validate()
        .unwrap();
}

#[test]
fn test_emulate_combinations() {
    usage_message("emulate", json!({}));
    usage_message("emulate", json!({"width": 800}));
    usage_message("emulate", json!({"device": "iPhone 13", "width": 1, "height": 1}));
    usage_message("emulate", json!({"reset": true, "locale": "de-DE"}));
    usage_message("emulate", json!({"latitude": 100.0, "longitude": 0.0}));

    parse("emulate", json!({"locale": "de-DE", "timezone": "Europe/Berlin"}))
        .unwrap()
        .validate()
        .unwrap();
}

#[test]
fn test_frame_switch_selector() {
    usage_message("frame", json!({"action": "switch"}));
    usage_message("frame", json!({"action": "list", "index": 0}));

    let params: FrameParams =
        serde_json::from_value(json!({"action": "switch", "url": "embed"})).unwrap();
    assert_eq!(
        params.validate().unwrap(),
        Some(FrameSelector::Url("embed".into()))
    );
}

#[test]
fn test_sub_action_rules() {
    usage_message("tabs", json!({"action": "switch"}));
    usage_message("tabs", json!({"action": "list", "url": "https://x.test"}));
    usage_message("network", json!({"action": "block"}));
    usage_message("network", json!({"action": "start", "pattern": "*.png"}));
    usage_message("cookies", json!({"action": "set", "name": "a"}));
    usage_message("cookies", json!({"action": "export"}));
    usage_message("storage", json!({"action": "get"}));
    usage_message("dialog", json!({"mode": "fill"}));
    usage_message("dialog", json!({"mode": "accept", "text": "x"}));
}
