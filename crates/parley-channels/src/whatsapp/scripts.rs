//! Scripts injected into WhatsApp Web.

/// Returns `"chats"` once the chat list is visible, `"qr"` while the login
/// QR code is shown, `"loading"` otherwise.
pub(super) const LOGIN_STATE: &str = r#"
if (document.querySelector('#pane-side')) return 'chats';
if (document.querySelector('canvas[aria-label*="QR"], div[data-ref] canvas')) return 'qr';
return 'loading';
"#;

/// Returns the last `arguments[0]` text messages of the open conversation,
/// oldest first, as `{text, outgoing, meta, id}` records. Empty when no chat
/// is open. Media-only bubbles have no selectable text and are skipped.
pub(super) const READ_MESSAGES: &str = r#"
const limit = arguments[0];
const main = document.querySelector('#main');
if (!main) return [];
const rows = main.querySelectorAll('div.message-in, div.message-out');
const out = [];
for (const row of rows) {
  const textEl = row.querySelector('span.selectable-text');
  const text = textEl ? textEl.innerText.trim() : '';
  if (!text) continue;
  const metaEl = row.querySelector('[data-pre-plain-text]');
  const idEl = row.closest('[data-id]');
  const id = idEl ? idEl.getAttribute('data-id') : null;
  out.push({
    text: text,
    outgoing: row.classList.contains('message-out') || (id !== null && id.startsWith('true_')),
    meta: metaEl ? metaEl.getAttribute('data-pre-plain-text') : null,
    id: id
  });
}
return out.slice(-limit);
"#;

/// Clears the element passed as `arguments[0]`.
pub(super) const CLEAR_INPUT: &str = "arguments[0].innerText = '';";

/// Compose box candidates, most specific first.
pub(super) const COMPOSE_SELECTORS: &[&str] = &[
    "footer div[contenteditable=\"true\"][role=\"textbox\"]",
    "div[contenteditable=\"true\"][data-tab=\"10\"]",
    "div[contenteditable=\"true\"][aria-label*=\"Type\"]",
    "footer div[contenteditable=\"true\"]",
];
