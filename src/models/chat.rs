use chrono::{ DateTime, Local, Utc };
use serde::{ Serialize, Deserialize };
use uuid::Uuid;

/// Prefix marking a message id the client minted for an optimistic entry.
pub const PROVISIONAL_ID_PREFIX: &str = "temp-";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Agent,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "You",
            Role::Agent => "AI",
        }
    }
}

/// Emotional analysis attached to an agent reply. The backend leaves out
/// `insights` when it already used them as the message content.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Analysis {
    pub emotional_tone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub insights: String,
    pub possible_reasons: Vec<String>,
    pub suggestions: Vec<String>,
    pub follow_up_questions: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

impl Message {
    /// Builds the temporary user entry shown while a send is in flight.
    pub fn provisional(content: &str) -> Self {
        Self {
            id: format!("{}{}", PROVISIONAL_ID_PREFIX, Uuid::new_v4()),
            role: Role::User,
            content: content.to_string(),
            timestamp: Utc::now(),
            analysis: None,
        }
    }

    pub fn is_provisional(&self) -> bool {
        self.id.starts_with(PROVISIONAL_ID_PREFIX)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
    #[serde(default, with = "timestamp::option", skip_serializing_if = "Option::is_none")]
    pub last_message_time: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn new(id: String, title: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            title,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            last_message: None,
            last_message_time: None,
        }
    }

    /// Agent reply carrying the newest analysis, if any.
    pub fn latest_analysis(&self) -> Option<&Analysis> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Agent)
            .and_then(|m| m.analysis.as_ref())
    }
}

/// The pair of confirmed messages the backend returns for one send.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageExchange {
    pub user_message: Message,
    pub ai_message: Message,
}

/// Title given to a conversation the server created without one.
pub fn default_title() -> String {
    format!("Chat - {}", Local::now().format("%H:%M:%S"))
}

/// Accepts RFC 3339 and the offset-less ISO strings the backend writes,
/// reading the latter as UTC. Always writes RFC 3339.
pub(crate) mod timestamp {
    use chrono::{ DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc };
    use serde::{ Deserialize, Deserializer, Serializer };

    const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS.iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub mod option {
        use chrono::{ DateTime, Utc };
        use serde::{ Deserialize, Deserializer, Serializer };

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            s: S
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, s),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) =>
                    super::parse(&raw)
                        .map(Some)
                        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw))),
            }
        }
    }
}
