use super::*;
use std::io::Write;

fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
    move |key| {
        pairs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.to_string())
    }
}

#[test]
fn test_defaults_when_unset() {
    let cfg = Config::from_lookup(lookup(&[])).unwrap();
    assert_eq!(cfg.provider.kind, ProviderKind::Gemini);
    assert_eq!(cfg.provider.gemini.model, "gemini-2.5-flash-lite");
    assert_eq!(cfg.provider.openai.model, "gpt-4o-mini");
    assert_eq!(cfg.provider.timeout_secs, 60);
    assert!(!cfg.browser.headless);
    assert_eq!(cfg.browser.timeout_ms, 30_000);
    assert_eq!(cfg.browser.webdriver_url, "http://localhost:9515");
    assert!(cfg.helper.human_approval);
    assert_eq!(cfg.helper.max_messages_to_read, 30);
    assert_eq!(cfg.helper.max_response_length, 500);
    assert_eq!(cfg.helper.response_tone, "romantic, respectful, natural");
    assert_eq!(cfg.helper.persona, Persona::Default);
    assert!(cfg.helper.enable_safety_filter);
    assert_eq!(cfg.helper.poll_interval_secs, 2);
    assert_eq!(cfg.logging.level, "info");
    assert_eq!(cfg.logging.file, "logs/parley.log");
}

#[test]
fn test_defaults_fail_validation_without_api_key() {
    let cfg = Config::from_lookup(lookup(&[])).unwrap();
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.contains("GOOGLE_API_KEY is required"), "{err}");
}

#[test]
fn test_gemini_key_alias() {
    let cfg = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "g-key")])).unwrap();
    assert_eq!(cfg.provider.selected_api_key(), "g-key");
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_claude_alias_selects_anthropic() {
    let cfg = Config::from_lookup(lookup(&[
        ("LLM_PROVIDER", "Claude"),
        ("ANTHROPIC_API_KEY", "sk-ant"),
    ]))
    .unwrap();
    assert_eq!(cfg.provider.kind, ProviderKind::Anthropic);
    assert_eq!(cfg.provider.selected_model(), "claude-3-5-sonnet-20241022");
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_boolean_spellings() {
    for (raw, expected) in [
        ("true", true),
        ("YES", true),
        ("1", true),
        ("false", false),
        ("No", false),
        ("0", false),
    ] {
        let cfg = Config::from_lookup(lookup(&[("HUMAN_APPROVAL", raw)])).unwrap();
        assert_eq!(cfg.helper.human_approval, expected, "{raw}");
    }
}

#[test]
fn test_parse_errors_are_collected() {
    let err = Config::from_lookup(lookup(&[
        ("LLM_PROVIDER", "llama"),
        ("HUMAN_APPROVAL", "maybe"),
        ("MAX_MESSAGES_TO_READ", "-3"),
        ("AGENT_PERSONA", "pirate"),
    ]))
    .unwrap_err();
    let msg = err.to_string();
    assert!(msg.starts_with("config error: configuration errors:"), "{msg}");
    assert!(msg.contains("LLM_PROVIDER"), "{msg}");
    assert!(msg.contains("HUMAN_APPROVAL"), "{msg}");
    assert!(msg.contains("MAX_MESSAGES_TO_READ"), "{msg}");
    assert!(msg.contains("AGENT_PERSONA"), "{msg}");
}

#[test]
fn test_zero_values_rejected_by_validate() {
    let cfg = Config::from_lookup(lookup(&[
        ("GOOGLE_API_KEY", "k"),
        ("POLL_INTERVAL_SECS", "0"),
        ("MAX_RESPONSE_LENGTH", "0"),
    ]))
    .unwrap();
    let msg = cfg.validate().unwrap_err().to_string();
    assert!(msg.contains("POLL_INTERVAL_SECS must be a positive integer"), "{msg}");
    assert!(msg.contains("MAX_RESPONSE_LENGTH must be a positive integer"), "{msg}");
}

#[test]
fn test_unknown_log_level_rejected() {
    let cfg = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "k"), ("LOG_LEVEL", "LOUD")]))
        .unwrap();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_log_level_case_insensitive() {
    let cfg = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "k"), ("LOG_LEVEL", "DEBUG")]))
        .unwrap();
    assert_eq!(cfg.logging.level, "debug");
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_blocklist_split_and_trimmed() {
    let cfg = Config::from_lookup(lookup(&[("SAFETY_BLOCKLIST", " venmo, ,cashapp ")])).unwrap();
    assert_eq!(cfg.helper.safety_blocklist, vec!["venmo", "cashapp"]);
}

#[test]
fn test_blank_value_uses_default() {
    let cfg = Config::from_lookup(lookup(&[("OPENAI_MODEL", "   ")])).unwrap();
    assert_eq!(cfg.provider.openai.model, "gpt-4o-mini");
}

fn env_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_read_env_file_content() {
    let file = env_file(
        "# comment\n\
         LLM_PROVIDER=openai\n\
         export OPENAI_API_KEY=\"sk-test\"\n\
         RESPONSE_TONE='warm, brief'\n\
         MAX_RESPONSE_LENGTH=200 # chars\n",
    );
    let vars = read_env_file(file.path()).unwrap();
    assert_eq!(vars.get("LLM_PROVIDER").map(String::as_str), Some("openai"));
    assert_eq!(vars.get("OPENAI_API_KEY").map(String::as_str), Some("sk-test"));
    assert_eq!(vars.get("RESPONSE_TONE").map(String::as_str), Some("warm, brief"));
    assert_eq!(vars.get("MAX_RESPONSE_LENGTH").map(String::as_str), Some("200"));
    assert_eq!(vars.len(), 4);
}

#[test]
fn test_read_env_file_escapes_and_substitution() {
    let file = env_file(
        "PARLEY_TEST_BASE=http://localhost:9515\n\
         WEBDRIVER_URL=${PARLEY_TEST_BASE}/wd\n\
         RESPONSE_TONE=\"warm\\nbrief\"\n",
    );
    let vars = read_env_file(file.path()).unwrap();
    assert_eq!(
        vars.get("WEBDRIVER_URL").map(String::as_str),
        Some("http://localhost:9515/wd")
    );
    assert_eq!(vars.get("RESPONSE_TONE").map(String::as_str), Some("warm\nbrief"));
}

#[test]
fn test_read_env_file_malformed_line_is_config_error() {
    let file = env_file("LLM_PROVIDER=openai\nnot a pair\n");
    let err = read_env_file(file.path()).unwrap_err();
    assert!(matches!(err, ParleyError::Config(_)));
}

#[test]
fn test_env_file_feeds_config_lookup() {
    let file = env_file("LLM_PROVIDER=openai\nOPENAI_API_KEY=sk-file\n");
    let vars = read_env_file(file.path()).unwrap();
    let cfg = Config::from_lookup(|key| vars.get(key).cloned()).unwrap();
    assert_eq!(cfg.provider.kind, ProviderKind::OpenAi);
    assert_eq!(cfg.provider.selected_api_key(), "sk-file");
}

#[test]
fn test_read_env_file_missing_is_config_error() {
    let err = read_env_file(Path::new("/nonexistent/__parley__/.env")).unwrap_err();
    assert!(matches!(err, ParleyError::Config(_)));
}

#[test]
fn test_persona_prompts_embed_length() {
    for persona in [Persona::Default, Persona::Friendly, Persona::Flirty] {
        let prompt = persona.system_prompt("warm", 280);
        assert!(prompt.contains("under 280 characters"), "{persona}");
        assert!(prompt.contains("[Contact]"), "{persona}");
    }
}

#[test]
fn test_default_persona_embeds_tone() {
    let prompt = Persona::Default.system_prompt("romantic, respectful, natural", 500);
    assert!(prompt.contains("natural, romantic, respectful, natural WhatsApp messages"));
}

#[test]
fn test_api_keys_not_serialized() {
    let cfg = Config::from_lookup(lookup(&[("GOOGLE_API_KEY", "secret-key")])).unwrap();
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(!json.contains("secret-key"));
}
