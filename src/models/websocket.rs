use serde::{ Serialize, Deserialize };

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Chat {
        content: String,
    },
    ReadAloud,
    ToggleTools,
    TimerStart,
    TimerStop,
    SaveNote {
        text: String,
    },
    Motivation,
    AnalyzeImage {
        file_name: String,
        /// Base64-encoded file contents. A `data:` URL is accepted as well.
        data: String,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Session {
        id: String,
        tools_visible: bool,
    },
    Processing,
    Partial {
        content: String,
    },
    Done {
        content: String,
        timestamp: i64,
    },
    Tools {
        visible: bool,
    },
    Notice {
        level: NoticeLevel,
        message: String,
    },
    Note {
        text: String,
    },
    Quote {
        text: String,
    },
    Analyzing,
    Analysis {
        content: String,
    },
    ToolError {
        message: String,
    },
    Speak {
        text: String,
        lang: String,
        pitch: f32,
        rate: f32,
        script: String,
    },
    Error {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_client_messages() {
        let chat: ClientMessage = serde_json::from_str(r#"{"type":"chat","content":"Hi"}"#).unwrap();
        assert_eq!(chat, ClientMessage::Chat { content: "Hi".into() });

        let stop: ClientMessage = serde_json::from_str(r#"{"type":"timer_stop"}"#).unwrap();
        assert_eq!(stop, ClientMessage::TimerStop);
    }

    #[test]
    fn notice_serializes_with_level() {
        let json = serde_json::to_string(
            &(ServerMessage::Notice { level: NoticeLevel::Info, message: "x".into() })
        ).unwrap();
        assert_eq!(json, r#"{"type":"notice","level":"info","message":"x"}"#);
    }
}
