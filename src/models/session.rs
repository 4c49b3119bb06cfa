use chrono::{DateTime, Utc};
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use uuid::Uuid;

/// The kind of device a login came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "device_class")]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[postgres(name = "desktop")]
    Desktop,
    #[postgres(name = "mobile")]
    Mobile,
    #[postgres(name = "tablet")]
    Tablet,
}

impl DeviceClass {
    /// Classifies a `User-Agent` header value.
    pub fn from_user_agent(user_agent: Option<&str>) -> Self {
        let Some(ua) = user_agent else {
            return DeviceClass::Desktop;
        };
        let ua = ua.to_ascii_lowercase();

        if ua.contains("ipad") || ua.contains("tablet") || (ua.contains("android") && !ua.contains("mobile")) {
            DeviceClass::Tablet
        } else if ua.contains("mobi") || ua.contains("iphone") || ua.contains("android") {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

/// One row of the session ledger.
///
/// The `id` is the `jti` of the credential issued for this login, so a
/// credential is live exactly as long as its row exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier, shared with the credential's `jti`.
    pub id: Uuid,
    /// The ID of the user this session belongs to.
    pub user_id: i64,
    /// The device class reported at login.
    pub device_class: DeviceClass,
    /// Client IP or origin reported at login.
    pub origin: String,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
}

impl From<&Row> for SessionRecord {
    fn from(row: &Row) -> Self {
        Self {
            id: row.get("id"),
            user_id: row.get("user_id"),
            device_class: row.get("device_class"),
            origin: row.get("origin"),
            created_at: row.get("created_at"),
        }
    }
}

/// Input for recording a login.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub id: Uuid,
    pub user_id: i64,
    pub device_class: DeviceClass,
    pub origin: String,
}

/// The authenticated caller, attached to requests by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: i64,
    pub session_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_user_agents() {
        let iphone = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Mobile/15E148";
        let ipad = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)";
        let android_tab = "Mozilla/5.0 (Linux; Android 13; SM-X700) Safari/537.36";
        let android_phone = "Mozilla/5.0 (Linux; Android 13; Pixel 7) Mobile Safari/537.36";
        let firefox = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

        assert_eq!(DeviceClass::from_user_agent(Some(iphone)), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_user_agent(Some(ipad)), DeviceClass::Tablet);
        assert_eq!(DeviceClass::from_user_agent(Some(android_tab)), DeviceClass::Tablet);
        assert_eq!(DeviceClass::from_user_agent(Some(android_phone)), DeviceClass::Mobile);
        assert_eq!(DeviceClass::from_user_agent(Some(firefox)), DeviceClass::Desktop);
        assert_eq!(DeviceClass::from_user_agent(None), DeviceClass::Desktop);
    }
}
