//! Sharing URLs for rendered diagrams (mermaid.live / mermaid.ink)
//!
//! URLs are constructed offline; nothing here talks to the network. The
//! only side effect is the best-effort browser launch.

use std::process::Command;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::info;
use url::Url;

use crate::error::PipevizError;

static MERMAID_LIVE: Lazy<Url> = Lazy::new(|| Url::parse("https://mermaid.live").unwrap());
static MERMAID_INK: Lazy<Url> = Lazy::new(|| Url::parse("https://mermaid.ink").unwrap());

/// mermaid.live editor mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveMode {
    View,
    Edit,
}

/// Payload mermaid.live expects in its `#base64:` fragment.
#[derive(Serialize)]
struct LivePayload<'a> {
    code: &'a str,
    mermaid: &'a str,
    #[serde(rename = "updateEditor")]
    update_editor: bool,
}

/// URL that opens `document` on mermaid.live.
pub fn live_url(document: &str, mode: LiveMode) -> Result<Url, PipevizError> {
    let payload = serde_json::to_string(&LivePayload {
        code: document,
        mermaid: "{}",
        update_editor: false,
    })?;
    let encoded = BASE64.encode(payload);

    let mut url = MERMAID_LIVE.clone();
    url.set_path(match mode {
        LiveMode::View => "view",
        LiveMode::Edit => "edit",
    });
    url.set_fragment(Some(&format!("base64:{encoded}")));
    Ok(url)
}

/// URL of `document` rendered as an image on mermaid.ink.
pub fn ink_url(document: &str, image_format: &str) -> Url {
    let encoded = BASE64.encode(document);

    let mut url = MERMAID_INK.clone();
    url.set_path(&format!("/img/{encoded}"));
    url.set_query(Some(&format!("type={image_format}")));
    url
}

/// Launch the platform browser on `url`.
///
/// Spawns and detaches; the spawned command's own exit status is not
/// checked.
pub fn open_in_browser(url: &Url) -> std::io::Result<()> {
    let mut command = browser_command(url.as_str());
    command.spawn()?;
    info!("opened URL in browser: {url}");
    Ok(())
}

fn browser_command(url: &str) -> Command {
    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg(url);
        command
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    } else {
        let mut command = Command::new("xdg-open");
        command.arg(url);
        command
    }
}
