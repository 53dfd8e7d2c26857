//! Outgoing text preparation: Markdown cleanup and keystroke encoding.

use super::webdriver::{KEY_ENTER, KEY_NULL, KEY_SHIFT};

/// Convert Markdown formatting to WhatsApp-native formatting.
///
/// - `## Header` -> `*HEADER*` (bold uppercase)
/// - `**bold**` -> `*bold*`
/// - `__italic__` -> `_italic_`
/// - `[text](url)` -> `text (url)`
/// - `---` horizontal rules -> removed
pub(super) fn sanitize_for_whatsapp(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.chars().all(|c| c == '-' || c == ' ') && trimmed.matches('-').count() >= 3 {
            continue;
        }

        if let Some(header) = ["### ", "## ", "# "]
            .iter()
            .find_map(|p| trimmed.strip_prefix(p))
        {
            out.push_str(&format!("*{}*\n", header.trim().to_uppercase()));
            continue;
        }

        let mut result = convert_links(line);
        result = replace_pairs(&result, "**", "*");
        result = replace_pairs(&result, "__", "_");

        out.push_str(&result);
        out.push('\n');
    }

    if !text.ends_with('\n') && out.ends_with('\n') {
        out.pop();
    }

    out
}

/// `[text](url)` -> `text (url)`.
fn convert_links(line: &str) -> String {
    let mut result = line.to_string();
    let mut from = 0;
    while let Some(open) = result[from..].find('[').map(|i| from + i) {
        let Some(mid) = result[open..].find("](").map(|i| open + i) else {
            break;
        };
        let Some(close) = result[mid + 2..].find(')').map(|i| mid + 2 + i) else {
            break;
        };
        let replacement = format!("{} ({})", &result[open + 1..mid], &result[mid + 2..close]);
        result.replace_range(open..=close, &replacement);
        from = open + replacement.len();
    }
    result
}

/// Replace each balanced `marker ... marker` pair with `with ... with`.
fn replace_pairs(line: &str, marker: &str, with: &str) -> String {
    let mut result = line.to_string();
    while let Some(start) = result.find(marker) {
        let Some(end) = result[start + marker.len()..]
            .find(marker)
            .map(|i| start + marker.len() + i)
        else {
            break;
        };
        let inner = result[start + marker.len()..end].to_string();
        result.replace_range(start..end + marker.len(), &format!("{with}{inner}{with}"));
    }
    result
}

/// Encode `text` as WebDriver keystrokes.
///
/// A bare Enter would send the message early, so line breaks become
/// Shift+Enter. With `submit`, a final Enter sends the message.
pub(super) fn to_keystrokes(text: &str, submit: bool) -> String {
    let line_break = format!("{KEY_SHIFT}{KEY_ENTER}{KEY_NULL}");
    let mut keys = text
        .replace("\r\n", "\n")
        .split('\n')
        .collect::<Vec<_>>()
        .join(&line_break);
    if submit {
        keys.push_str(KEY_ENTER);
    }
    keys
}
