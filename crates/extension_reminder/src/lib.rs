//! Reminder extension: a small in-game reminders box.
//!
//! Serves an embedded script that mounts a reminders list into the game's
//! overlay UI, plus the stylesheet the script links in itself.

use async_trait::async_trait;
use axum::Router;
use tokio_util::sync::CancellationToken;

use extension_system::serve::static_bytes;
use extension_system::{
    BuiltExtension, Extension, ExtensionError, ExtensionInfo, HttpCapability,
};

/// Stable id the extension is registered and mounted under.
pub const ID: &str = "reminder";

const REMINDER_JS: &[u8] = include_bytes!("../assets/reminder.js");
const REMINDER_CSS: &[u8] = include_bytes!("../assets/reminder.css");

/// Descriptor for the registry assembled at process entry.
pub fn info() -> ExtensionInfo {
    ExtensionInfo {
        id: ID,
        build: Box::new(build),
    }
}

struct ReminderExtension;

#[async_trait]
impl Extension for ReminderExtension {
    async fn start(&self, _shutdown: CancellationToken) -> Result<(), ExtensionError> {
        Ok(())
    }

    async fn stop(&self) -> Result<(), ExtensionError> {
        Ok(())
    }
}

// The config payload carries no fields; its presence alone enables the
// extension.
fn build(_cfg: serde_json::Value) -> Result<BuiltExtension, ExtensionError> {
    let router = Router::new()
        .route("/reminder.js", static_bytes("text/javascript", REMINDER_JS))
        .route("/reminder.css", static_bytes("text/css", REMINDER_CSS));

    Ok(BuiltExtension::new(ReminderExtension).with_http(HttpCapability::with_scripts(
        router,
        vec!["/reminder.js".to_string()],
    )))
}
