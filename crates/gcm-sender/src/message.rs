//! Message value objects.
//!
//! A [`Message`] serializes directly into the gateway's request body; the
//! transport only adds the recipient list.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{GcmError, Result};

/// Maximum time-to-live accepted by the gateway (4 weeks, in seconds).
pub const MAX_TIME_TO_LIVE: u32 = 4 * 7 * 24 * 60 * 60;

/// Sound played when a notification does not name one.
pub const DEFAULT_SOUND: &str = "default";

/// Delivery priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Normal,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = GcmError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            other => Err(GcmError::invalid_argument(format!(
                "unknown priority: {other}"
            ))),
        }
    }
}

/// A push message. Absent options are left out of the request body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    /// Seconds the gateway keeps the message while the device is offline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_to_live: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collapse_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_while_idle: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<bool>,
    /// Opaque key/value payload.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty dry-run message used to probe a registration without
    /// delivering anything to the device.
    pub fn dry_run_probe() -> Self {
        Self {
            dry_run: Some(true),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.notification = Some(notification);
        self
    }

    /// Check the constraints the gateway would otherwise reject.
    pub fn validate(&self) -> Result<()> {
        if let Some(ttl) = self.time_to_live
            && ttl > MAX_TIME_TO_LIVE
        {
            return Err(GcmError::invalid_argument(format!(
                "time_to_live {ttl} exceeds maximum of {MAX_TIME_TO_LIVE} seconds"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fields = Vec::new();
        if let Some(priority) = self.priority {
            fields.push(format!("priority={priority}"));
        }
        if let Some(key) = &self.collapse_key {
            fields.push(format!("collapseKey={key}"));
        }
        if let Some(ttl) = self.time_to_live {
            fields.push(format!("timeToLive={ttl}"));
        }
        if let Some(idle) = self.delay_while_idle {
            fields.push(format!("delayWhileIdle={idle}"));
        }
        if let Some(dry_run) = self.dry_run {
            fields.push(format!("dryRun={dry_run}"));
        }
        if let Some(name) = &self.restricted_package_name {
            fields.push(format!("restrictedPackageName={name}"));
        }
        if self.notification.is_some() {
            fields.push("notification=..".to_string());
        }
        if !self.data.is_empty() {
            let keys: Vec<&str> = self.data.keys().map(String::as_str).collect();
            fields.push(format!("data={{{}}}", keys.join(",")));
        }
        write!(f, "Message({})", fields.join(", "))
    }
}

/// Display block rendered by the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub icon: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_badge"
    )]
    pub badge: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub click_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_loc_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_loc_args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_loc_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_loc_args: Option<Vec<String>>,
}

// The gateway expects the badge as a string.
fn serialize_badge<S: Serializer>(
    badge: &Option<u32>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match badge {
        Some(value) => serializer.serialize_str(&value.to_string()),
        None => serializer.serialize_none(),
    }
}

impl Notification {
    /// Notification with the given icon and the default sound.
    pub fn new(icon: impl Into<String>) -> Self {
        Self {
            title: None,
            body: None,
            icon: icon.into(),
            sound: Some(DEFAULT_SOUND.to_string()),
            badge: None,
            tag: None,
            color: None,
            click_action: None,
            body_loc_key: None,
            body_loc_args: None,
            title_loc_key: None,
            title_loc_args: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}
