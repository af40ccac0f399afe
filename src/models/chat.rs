use serde::{ Serialize, Deserialize };

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    /// Creation instant in unix milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
}

/// The registered user. Stored as `{"name", "token", "isRegistered"}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub name: String,
    pub token: String,
    pub is_registered: bool,
}

/// Structured output of one provider call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SageReply {
    pub text: String,
    pub plan: Vec<String>,
    pub dopamine_boost: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_uses_camel_case_keys() {
        let profile = UserProfile {
            name: "Ana".to_string(),
            token: "rishi-exclusive-2024".to_string(),
            is_registered: true,
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            json!({ "name": "Ana", "token": "rishi-exclusive-2024", "isRegistered": true })
        );
    }

    #[test]
    fn message_without_plan_omits_the_field() {
        let msg = Message {
            id: "00000001".to_string(),
            role: Role::Assistant,
            text: "hello".to_string(),
            timestamp: 1_700_000_000_000,
            plan: None,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert!(value.get("plan").is_none());
    }

    #[test]
    fn sage_reply_requires_every_field() {
        let missing_plan = json!({ "text": "t", "dopamine_boost": "b" });
        assert!(serde_json::from_value::<SageReply>(missing_plan).is_err());

        let extra = json!({ "text": "t", "plan": [], "dopamine_boost": "b", "mood": "calm" });
        assert!(serde_json::from_value::<SageReply>(extra).is_err());
    }
}
