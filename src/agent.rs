use crate::config::prompt::{ self, PromptConfig, PromptError };
use crate::llm::LlmError;
use crate::llm::chat::ChatClient;
use crate::models::websocket::{ ClientMessage, NoticeLevel, ServerMessage };
use crate::session::SessionContext;
use crate::widgets::speech::SpeechRequest;
use crate::widgets::timer::{ minutes_and_seconds, TimerEvent };
use crate::widgets::vision::{ analysis_error_message, ImageUpload };

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::error::Error;
use std::path::PathBuf;
use std::sync::{ Arc, RwLock };

pub type BoxError = Box<dyn Error + Send + Sync>;

/// Appended to the visible text while a reply is still streaming.
pub const STREAM_CURSOR: char = '▌';
pub const EMPTY_REPLY_PLACEHOLDER: &str = "_(no response)_";

/// Receives the events produced while handling one client action.
#[async_trait]
pub trait EventSink: Send {
    async fn emit(&mut self, message: ServerMessage) -> Result<(), BoxError>;
}

pub struct Assistant {
    chat_client: Arc<dyn ChatClient>,
    prompt_config: RwLock<Arc<PromptConfig>>,
    prompts_path: Option<PathBuf>,
}

fn notice(level: NoticeLevel, message: impl Into<String>) -> ServerMessage {
    ServerMessage::Notice { level, message: message.into() }
}

fn timer_notice(event: TimerEvent, user_name: &str) -> ServerMessage {
    match event {
        TimerEvent::Started =>
            notice(
                NoticeLevel::Success,
                format!("Timer started! Focus on your studies, {}! 💪", user_name)
            ),
        TimerEvent::AlreadyRunning => notice(NoticeLevel::Info, "Timer is already running!"),
        TimerEvent::Stopped { total } => {
            let (minutes, seconds) = minutes_and_seconds(total);
            notice(
                NoticeLevel::Success,
                format!(
                    "Study time: {} minutes and {} seconds. Great job, {}! 🎉",
                    minutes,
                    seconds,
                    user_name
                )
            )
        }
        TimerEvent::NotRunning => notice(NoticeLevel::Info, "Timer is not running!"),
    }
}

fn error_reply(err: &LlmError) -> String {
    format!("Sorry, I hit an error: {}", err)
}

impl Assistant {
    pub fn new(
        chat_client: Arc<dyn ChatClient>,
        prompt_config: Arc<PromptConfig>,
        prompts_path: Option<String>
    ) -> Self {
        Self {
            chat_client,
            prompt_config: RwLock::new(prompt_config),
            prompts_path: prompts_path.map(PathBuf::from),
        }
    }

    pub fn prompts(&self) -> Arc<PromptConfig> {
        let guard = self.prompt_config.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn new_session(&self) -> SessionContext {
        SessionContext::new(&self.prompts().system_prompt)
    }

    /// Swaps in the prompt file when it changed on disk. Sessions already
    /// running keep the system prompt they started with.
    pub fn reload_prompts_if_changed(&self) -> Result<bool, PromptError> {
        let path = match &self.prompts_path {
            Some(p) => p,
            None => {
                return Ok(false);
            }
        };

        let current = self.prompts();
        match prompt::reload_prompts_if_changed(path, &current)? {
            Some(new_config) => {
                let mut guard = self.prompt_config
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *guard = new_config;
                info!("Prompts successfully reloaded from {}", path.display());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// One conversational turn: records the user input, streams the reply to
    /// `sink` and records the final assistant text. Model failures become the
    /// reply text; only sink failures are returned as errors.
    pub async fn chat_turn<S>(
        &self,
        session: &mut SessionContext,
        input: &str,
        sink: &mut S
    ) -> Result<String, BoxError>
        where S: EventSink + ?Sized
    {
        session.history.add_user(input);
        sink.emit(ServerMessage::Processing).await?;
        debug!(
            "Streaming reply for session {} from {}",
            session.id,
            self.chat_client.get_model()
        );

        let final_text = match self.chat_client.stream_chat(session.history().messages()).await {
            Ok(mut stream) => {
                let mut full_response = String::new();
                let mut failure = None;

                while let Some(item) = stream.next().await {
                    match item {
                        Ok(delta) => {
                            if delta.is_empty() {
                                continue;
                            }
                            full_response.push_str(&delta);
                            let visible = format!("{}{}", full_response, STREAM_CURSOR);
                            sink.emit(ServerMessage::Partial { content: visible }).await?;
                        }
                        Err(e) => {
                            failure = Some(e);
                            break;
                        }
                    }
                }

                match failure {
                    Some(e) => {
                        error!("Stream error for session {}: {}", session.id, e);
                        error_reply(&e)
                    }
                    None => full_response,
                }
            }
            Err(e) => {
                error!("Failed to open chat stream for session {}: {}", session.id, e);
                error_reply(&e)
            }
        };

        let displayed = if final_text.is_empty() {
            EMPTY_REPLY_PLACEHOLDER.to_string()
        } else {
            final_text.clone()
        };
        sink.emit(ServerMessage::Done {
            content: displayed,
            timestamp: Utc::now().timestamp(),
        }).await?;

        session.history.add_assistant(&final_text);
        debug!("Session {} history now has {} messages", session.id, session.history().len());
        Ok(final_text)
    }

    async fn analyze_upload(&self, file_name: &str, data: &str) -> ServerMessage {
        let upload = match ImageUpload::decode(file_name, data) {
            Ok(u) => u,
            Err(e) => {
                warn!("Rejected image upload '{}': {}", file_name, e);
                return ServerMessage::ToolError { message: analysis_error_message(&e) };
            }
        };

        let instruction = self.prompts().vision_instruction.clone();
        info!(
            "Analyzing image '{}' ({} bytes, {}) with {}",
            upload.file_name,
            upload.bytes.len(),
            upload.mime,
            self.chat_client.get_vision_model()
        );

        match self.chat_client.analyze_image(&upload.bytes, upload.mime, &instruction).await {
            Ok(analysis) => ServerMessage::Analysis { content: analysis },
            Err(e) => {
                error!("Image analysis failed for '{}': {}", upload.file_name, e);
                ServerMessage::ToolError { message: analysis_error_message(&e) }
            }
        }
    }

    /// Applies one client action to the session. Returns an error only when
    /// the sink can no longer be written to.
    pub async fn handle<S>(
        &self,
        session: &mut SessionContext,
        message: ClientMessage,
        sink: &mut S
    ) -> Result<(), BoxError>
        where S: EventSink + ?Sized
    {
        let prompts = self.prompts();

        match &message {
            ClientMessage::Chat { content } => {
                if content.trim().is_empty() {
                    return Ok(());
                }
                self.chat_turn(session, content, sink).await?;
                return Ok(());
            }
            ClientMessage::ReadAloud => {
                let reply = match session.last_assistant_text() {
                    Some(r) => r,
                    None => {
                        return sink.emit(
                            notice(NoticeLevel::Info, "There is no response to read yet.")
                        ).await;
                    }
                };
                let request = SpeechRequest::from_reply(&reply);
                let script = request.to_script();
                return sink.emit(ServerMessage::Speak {
                    text: request.text,
                    lang: request.lang.to_string(),
                    pitch: request.pitch,
                    rate: request.rate,
                    script,
                }).await;
            }
            ClientMessage::ToggleTools => {
                let visible = session.toggle_tools();
                return sink.emit(ServerMessage::Tools { visible }).await;
            }
            _ => {}
        }

        if !session.tools_visible {
            return sink.emit(
                notice(
                    NoticeLevel::Info,
                    "Student tools are hidden. Use Show/Hide Tools to open them."
                )
            ).await;
        }

        match message {
            ClientMessage::TimerStart => {
                let event = session.timer.start();
                sink.emit(timer_notice(event, &prompts.user_name)).await
            }
            ClientMessage::TimerStop => {
                let event = session.timer.stop();
                sink.emit(timer_notice(event, &prompts.user_name)).await
            }
            ClientMessage::SaveNote { text } => {
                let saved = session.notes.save(&text).to_string();
                sink.emit(
                    notice(
                        NoticeLevel::Success,
                        format!("Note saved! Check it anytime, {}! 📝", prompts.user_name)
                    )
                ).await?;
                sink.emit(ServerMessage::Note { text: saved }).await
            }
            ClientMessage::Motivation => {
                match session.quotes.next(&prompts.quotes) {
                    Some(quote) => sink.emit(ServerMessage::Quote { text: quote.to_string() }).await,
                    None => Ok(()),
                }
            }
            ClientMessage::AnalyzeImage { file_name, data } => {
                sink.emit(ServerMessage::Analyzing).await?;
                let result = self.analyze_upload(&file_name, &data).await;
                sink.emit(result).await
            }
            ClientMessage::Chat { .. } | ClientMessage::ReadAloud | ClientMessage::ToggleTools => {
                Ok(())
            }
        }
    }
}
