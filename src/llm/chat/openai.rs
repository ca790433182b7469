use async_trait::async_trait;
use base64::{ engine::general_purpose::STANDARD as BASE64, Engine as _ };
use futures::StreamExt;
use log::{ debug, warn };
use reqwest::{ Client as HttpClient, Response, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };

use super::{ create_streaming_response, ChatClient, FragmentStream };
use crate::llm::{ ImageMime, LlmConfig, LlmError };
use crate::models::chat::ChatMessage;

const VISION_MAX_TOKENS: u32 = 300;

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    vision_model: String,
    base_url: String,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    error: Option<OpenAIErrorBody>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIStreamResponse {
    #[serde(default)]
    choices: Vec<OpenAIStreamChoice>,
    error: Option<OpenAIErrorBody>,
}

#[derive(Deserialize)]
struct OpenAIStreamChoice {
    delta: Option<OpenAIDelta>,
}

#[derive(Deserialize)]
struct OpenAIDelta {
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Delta(String),
    Done,
}

/// Splits a server-sent-event byte stream into complete `data:` lines. Network
/// chunks may end mid-line or mid-codepoint, so bytes are held until a newline.
#[derive(Default)]
pub(crate) struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Result<SseEvent, LlmError>> {
        self.pending.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_sse_line(line.trim_end_matches(&['\r', '\n'][..])) {
                events.push(event);
            }
        }
        events
    }

    pub(crate) fn finish(&mut self) -> Option<Result<SseEvent, LlmError>> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        parse_sse_line(String::from_utf8_lossy(&rest).trim())
    }
}

fn parse_sse_line(line: &str) -> Option<Result<SseEvent, LlmError>> {
    // Blank separators and ": keep-alive" comments carry nothing.
    let data = line.strip_prefix("data:")?.trim_start();
    if data == "[DONE]" {
        return Some(Ok(SseEvent::Done));
    }

    match serde_json::from_str::<OpenAIStreamResponse>(data) {
        Ok(resp) => {
            if let Some(err) = resp.error {
                return Some(Err(LlmError::Api(err.message)));
            }
            let delta = resp.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content)
                .unwrap_or_default();
            Some(Ok(SseEvent::Delta(delta)))
        }
        Err(e) => {
            warn!("Skipping unparseable stream line: {} ({})", data, e);
            None
        }
    }
}

async fn error_for_status(resp: Response) -> Result<Response, LlmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(LlmError::Status { status: status.as_u16(), body })
}

impl OpenAIChatClient {
    pub fn new(
        api_key: &str,
        model: String,
        vision_model: String,
        base_url: String
    ) -> Result<Self, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key)).map_err(|e|
            LlmError::InvalidApiKey(e.to_string())
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = HttpClient::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            model,
            vision_model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::new(
            &config.api_key,
            config.chat_model.clone(),
            config.vision_model.clone(),
            config.base_url.clone()
        )
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn stream_chat(&self, history: &[ChatMessage]) -> Result<FragmentStream, LlmError> {
        let body = serde_json::to_value(OpenAIChatRequest {
            model: &self.model,
            messages: history,
            max_tokens: None,
            stream: Some(true),
        }).map_err(|e| LlmError::Malformed(e.to_string()))?;

        let request = self.http.post(self.completions_url()).json(&body);
        debug!("Opening chat stream with {} messages on {}", history.len(), self.model);

        Ok(
            create_streaming_response(move |tx| async move {
                let resp = match request.send().await {
                    Ok(r) => r,
                    Err(e) => {
                        let _ = tx.send(Err(e.into())).await;
                        return;
                    }
                };
                let resp = match error_for_status(resp).await {
                    Ok(r) => r,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                let mut decoder = SseDecoder::default();
                let mut bytes = resp.bytes_stream();

                while let Some(chunk) = bytes.next().await {
                    let chunk = match chunk {
                        Ok(c) => c,
                        Err(e) => {
                            let _ = tx.send(Err(e.into())).await;
                            return;
                        }
                    };
                    for event in decoder.push(&chunk) {
                        match event {
                            Ok(SseEvent::Delta(text)) => {
                                if tx.send(Ok(text)).await.is_err() {
                                    return;
                                }
                            }
                            Ok(SseEvent::Done) => {
                                return;
                            }
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        }
                    }
                }

                match decoder.finish() {
                    Some(Ok(SseEvent::Delta(text))) => {
                        let _ = tx.send(Ok(text)).await;
                    }
                    Some(Err(e)) => {
                        let _ = tx.send(Err(e)).await;
                    }
                    Some(Ok(SseEvent::Done)) | None => {}
                }
            })
        )
    }

    async fn analyze_image(
        &self,
        image: &[u8],
        mime: ImageMime,
        instruction: &str
    ) -> Result<String, LlmError> {
        let data_url = format!("data:{};base64,{}", mime, BASE64.encode(image));
        let messages = vec![ChatMessage::vision(instruction, data_url)];

        let req = OpenAIChatRequest {
            model: &self.vision_model,
            messages: &messages,
            max_tokens: Some(VISION_MAX_TOKENS),
            stream: None,
        };

        let resp = self.http.post(self.completions_url()).json(&req).send().await?;
        let resp = error_for_status(resp).await?;
        let parsed = resp
            .json::<OpenAIResponse>().await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        if let Some(err) = parsed.error {
            return Err(LlmError::Api(err.message));
        }

        parsed.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }

    fn get_model(&self) -> String {
        self.model.clone()
    }

    fn get_vision_model(&self) -> String {
        self.vision_model.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::{ Mock, MockServer, ResponseTemplate };
    use wiremock::matchers::{ body_partial_json, header, method, path };

    fn client_for(server: &MockServer) -> OpenAIChatClient {
        OpenAIChatClient::new(
            "test-key",
            "openai/gpt-4o-mini".to_string(),
            "qwen/qwen2.5-vl-32b-instruct:free".to_string(),
            format!("{}/api/v1/", server.uri())
        ).unwrap()
    }

    fn sse_body(deltas: &[&str]) -> String {
        let mut body = String::from(": OPENROUTER PROCESSING\n\n");
        for delta in deltas {
            let line = json!({"choices": [{"delta": {"content": delta}}]});
            body.push_str(&format!("data: {}\n\n", line));
        }
        body.push_str("data: [DONE]\n\n");
        body
    }

    #[test]
    fn decoder_joins_lines_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        let first = decoder.push(b"data: {\"choices\":[{\"delta\":{\"cont");
        assert!(first.is_empty());
        let second = decoder.push(b"ent\":\"Hi\"}}]}\n\ndata: [DONE]\n");
        let events: Vec<SseEvent> = second.into_iter().map(|e| e.unwrap()).collect();
        assert_eq!(events, vec![SseEvent::Delta("Hi".into()), SseEvent::Done]);
    }

    #[test]
    fn decoder_keeps_multibyte_chars_intact() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"💖\"}}]}\n".as_bytes();
        let split = line.len() - 8;
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(&line[..split]).is_empty());
        let events = decoder.push(&line[split..]);
        assert_eq!(events.into_iter().next().unwrap().unwrap(), SseEvent::Delta("💖".into()));
    }

    #[test]
    fn decoder_surfaces_in_band_errors() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: {\"error\":{\"message\":\"Rate limit exceeded\"}}\n");
        match events.into_iter().next() {
            Some(Err(LlmError::Api(msg))) => assert_eq!(msg, "Rate limit exceeded"),
            _ => panic!("expected an API error"),
        }
    }

    #[tokio::test]
    async fn streams_deltas_from_chat_completions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({"model": "openai/gpt-4o-mini", "stream": true})))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(sse_body(&["Hi", " there", "!"]), "text/event-stream")
            )
            .mount(&server).await;

        let client = client_for(&server);
        let history = vec![ChatMessage::system("sys"), ChatMessage::user("Hello")];
        let fragments: Vec<String> = client
            .stream_chat(&history).await
            .unwrap()
            .map(|item| item.unwrap())
            .collect().await;

        assert_eq!(fragments, vec!["Hi", " there", "!"]);
    }

    #[tokio::test]
    async fn stream_ends_with_error_on_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("No auth credentials found"))
            .mount(&server).await;

        let client = client_for(&server);
        let items: Vec<Result<String, LlmError>> = client
            .stream_chat(&[ChatMessage::user("Hello")]).await
            .unwrap()
            .collect().await;

        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(LlmError::Status { status, body }) => {
                assert_eq!(*status, 401);
                assert!(body.contains("No auth credentials"));
            }
            _ => panic!("expected a status error"),
        }
    }

    #[tokio::test]
    async fn analyzes_image_with_vision_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(
                body_partial_json(
                    json!({
                "model": "qwen/qwen2.5-vl-32b-instruct:free",
                "max_tokens": 300,
                "messages": [{
                    "role": "user",
                    "content": [
                        {"type": "text", "text": "Describe"},
                        {"type": "image_url", "image_url": {"url": "data:image/png;base64,AQID"}}
                    ]
                }]
            })
                )
            )
            .respond_with(
                ResponseTemplate::new(200).set_body_json(
                    json!({
                "choices": [{"message": {"role": "assistant", "content": "A page of notes."}}]
            })
                )
            )
            .mount(&server).await;

        let client = client_for(&server);
        let analysis = client.analyze_image(&[1, 2, 3], ImageMime::Png, "Describe").await.unwrap();
        assert_eq!(analysis, "A page of notes.");
    }

    #[tokio::test]
    async fn analyze_reports_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(502).set_body_string("upstream down"))
            .mount(&server).await;

        let client = client_for(&server);
        let err = client.analyze_image(&[0xff], ImageMime::Jpeg, "Describe").await.unwrap_err();
        assert_eq!(err.to_string(), "API returned 502: upstream down");
    }
}
