use super::extract::{timestamp_of, RawMessage};
use super::send::{sanitize_for_whatsapp, to_keystrokes};
use super::webdriver::{chrome_capabilities, element_arg, wire_error, LaunchOptions, ELEMENT_KEY};
use super::*;
use parley_core::message::Sender;
use serde_json::json;

#[test]
fn test_sanitize_headers() {
    assert_eq!(sanitize_for_whatsapp("## Hello World"), "*HELLO WORLD*");
    assert_eq!(sanitize_for_whatsapp("# Big Title"), "*BIG TITLE*");
    assert_eq!(sanitize_for_whatsapp("### Small"), "*SMALL*");
}

#[test]
fn test_sanitize_bold_and_italic() {
    assert_eq!(
        sanitize_for_whatsapp("this is **bold** and __soft__"),
        "this is *bold* and _soft_"
    );
}

#[test]
fn test_sanitize_links() {
    assert_eq!(
        sanitize_for_whatsapp("menu: [Luigi's](https://luigis.example) at 8?"),
        "menu: Luigi's (https://luigis.example) at 8?"
    );
}

#[test]
fn test_sanitize_bracket_without_link_untouched() {
    assert_eq!(sanitize_for_whatsapp("[sic] ok"), "[sic] ok");
}

#[test]
fn test_sanitize_horizontal_rules() {
    assert_eq!(sanitize_for_whatsapp("above\n---\nbelow"), "above\nbelow");
}

#[test]
fn test_sanitize_passthrough() {
    assert_eq!(sanitize_for_whatsapp("*bold*"), "*bold*");
    assert_eq!(sanitize_for_whatsapp("_italic_"), "_italic_");
    assert_eq!(sanitize_for_whatsapp("~strike~"), "~strike~");
    let plain = "Yes! Dinner at 8 sounds perfect";
    assert_eq!(sanitize_for_whatsapp(plain), plain);
}

#[test]
fn test_keystrokes_single_line_submit() {
    assert_eq!(to_keystrokes("see you", true), "see you\u{E007}");
}

#[test]
fn test_keystrokes_draft_only_has_no_enter() {
    assert_eq!(to_keystrokes("see you", false), "see you");
}

#[test]
fn test_keystrokes_newlines_use_shift_enter() {
    let keys = to_keystrokes("line one\r\nline two", true);
    assert_eq!(keys, "line one\u{E008}\u{E007}\u{E000}line two\u{E007}");
}

#[test]
fn test_timestamp_of_pre_plain_text() {
    assert_eq!(
        timestamp_of("[10:42 PM, 10/18/2026] Alice: "),
        Some("10:42 PM, 10/18/2026")
    );
    assert_eq!(timestamp_of("no brackets"), None);
    assert_eq!(timestamp_of("[] Bob: "), None);
}

#[test]
fn test_raw_message_conversion() {
    let raw: Vec<RawMessage> = serde_json::from_value(json!([
        {"text": " are you free tonight? ", "outgoing": false,
         "meta": "[10:42 PM, 10/18/2026] Alice: ", "id": "false_123@c.us_3EB0"},
        {"text": "yes", "outgoing": true, "meta": null, "id": null},
    ]))
    .unwrap();
    let messages: Vec<Message> = raw.into_iter().map(Message::from).collect();

    assert_eq!(messages[0].sender, Sender::Peer);
    assert_eq!(messages[0].text, "are you free tonight?");
    assert_eq!(messages[0].timestamp.as_deref(), Some("10:42 PM, 10/18/2026"));
    assert_eq!(messages[0].platform_id.as_deref(), Some("false_123@c.us_3EB0"));

    assert_eq!(messages[1].sender, Sender::Me);
    assert!(messages[1].timestamp.is_none());
    assert!(messages[1].platform_id.is_none());
}

#[test]
fn test_chrome_capabilities() {
    let caps = chrome_capabilities(&LaunchOptions {
        profile_dir: "/tmp/parley/session",
        headless: true,
        timeout_ms: 30_000,
    });
    let always = &caps["capabilities"]["alwaysMatch"];
    let args: Vec<&str> = always["goog:chromeOptions"]["args"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(args.contains(&"--user-data-dir=/tmp/parley/session"));
    assert!(args.contains(&"--headless=new"));
    assert_eq!(always["timeouts"]["script"], 30_000);
}

#[test]
fn test_chrome_capabilities_headed() {
    let caps = chrome_capabilities(&LaunchOptions {
        profile_dir: "p",
        headless: false,
        timeout_ms: 1,
    });
    let args = caps["capabilities"]["alwaysMatch"]["goog:chromeOptions"]["args"].to_string();
    assert!(!args.contains("headless"));
}

#[test]
fn test_element_arg_uses_w3c_key() {
    let arg = element_arg("abc-123");
    assert_eq!(arg[ELEMENT_KEY], "abc-123");
}

#[test]
fn test_wire_error_mapping() {
    let timeout = wire_error(json!({"error": "script timeout", "message": "slow\nstack"}));
    assert!(timeout.is_transient());
    assert!(!timeout.to_string().contains("stack"));

    let missing = wire_error(json!({"error": "no such element", "message": "nope"}));
    assert!(matches!(missing, ParleyError::Channel(ref m) if m.starts_with("no such element")));

    let malformed = wire_error(json!("garbage"));
    assert!(matches!(malformed, ParleyError::Channel(_)));
}

#[tokio::test]
async fn test_reads_before_start_fail() {
    let mut session = WhatsAppWebSession::new(BrowserConfig::default());
    assert_eq!(session.name(), "whatsapp-web");
    assert!(session.get_recent_messages(5).await.is_err());
    assert!(session.send_text("hi").await.is_err());
}

#[tokio::test]
async fn test_close_without_start_is_noop() {
    let mut session = WhatsAppWebSession::new(BrowserConfig::default());
    assert!(session.close().await.is_ok());
}
