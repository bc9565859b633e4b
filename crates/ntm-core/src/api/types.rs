//! Request and response bodies of the task service.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned task identifier.
pub type TaskId = i64;

/// Generic acknowledgement returned by most mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SendCodeRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct VerifyCodeRequest<'a> {
    pub email: &'a str,
    pub code: &'a str,
}

/// Result of a successful code verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// Profile of the logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default, with = "timestamp::option")]
    pub last_login: Option<NaiveDateTime>,
}

/// A task as the server returned it.
///
/// Only `id` is interpreted; every other field is kept verbatim so the
/// client never alters or invents server-owned data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Task {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.field(key).and_then(Value::as_str)
    }

    /// Display name; this backend calls it `name`, older payloads `title`.
    pub fn name(&self) -> Option<&str> {
        self.str_field("name").or_else(|| self.str_field("title"))
    }

    /// Whether the task is scheduled to run (`is_active`, or `enabled`).
    pub fn is_active(&self) -> bool {
        self.field("is_active")
            .or_else(|| self.field("enabled"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn frequency(&self) -> Option<Frequency> {
        self.str_field("frequency").and_then(|f| f.parse().ok())
    }

    pub fn scheduled_time(&self) -> Option<&str> {
        self.str_field("scheduled_time")
    }

    pub fn next_run(&self) -> Option<&str> {
        self.str_field("next_run")
    }
}

/// Response of `GET /tasks`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub total: usize,
}

/// How often a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "once" => Ok(Self::Once),
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "yearly" => Ok(Self::Yearly),
            _ => Err(format!(
                "Unknown frequency: {value} (expected once, daily, weekly, monthly or yearly)"
            )),
        }
    }
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub name: String,
    pub frequency: Frequency,
    /// `HH:MM`
    pub scheduled_time: String,
    /// `YYYY-MM-DD`, used by `once` and `yearly`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    /// `mon`..`sun`, used by `weekly`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    /// 1-31, used by `monthly`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    pub prompt: String,
    #[serde(default)]
    pub expert_mode: bool,
    /// IANA zone such as `Asia/Shanghai`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

/// Body of `PUT /tasks/{id}`. Unset fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_week: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_of_month: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expert_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One recorded run of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskExecution {
    pub id: i64,
    pub task_id: TaskId,
    #[serde(default, with = "timestamp::option")]
    pub executed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub result: Option<String>,
    /// `success`, `failed` or `pending`
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Server timestamps: naive UTC (`2025-01-31T08:00:00.123`) or RFC 3339.
pub(crate) mod timestamp {
    use chrono::{DateTime, NaiveDateTime};

    pub fn parse(value: &str) -> Option<NaiveDateTime> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.naive_utc())
            .ok()
            .or_else(|| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok())
    }

    pub mod option {
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(value: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match value {
                Some(ts) => serializer.serialize_str(&ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let raw: Option<String> = Option::deserialize(deserializer)?;
            match raw {
                None => Ok(None),
                Some(value) => super::parse(&value).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp: {value}"))
                }),
            }
        }
    }
}
