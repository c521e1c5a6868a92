//! Push notification configuration types.
//!
//! The protocol lets a client register a webhook for task updates. Only the
//! configuration is modelled here; delivery is left to the host.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Webhook configuration for a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PushNotificationConfig {
    /// The webhook URL where updates would be POSTed.
    pub url: Url,

    /// Token echoed back to the webhook so it can validate the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Authentication the webhook expects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationInfo>,
}

/// Authentication schemes accepted by a webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationInfo {
    /// Scheme names, e.g. `Bearer`.
    pub schemes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

/// Params and result of `tasks/pushNotificationConfig/set` and `get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskPushNotificationConfig {
    /// The task this configuration belongs to.
    pub id: String,

    pub push_notification_config: PushNotificationConfig,
}
