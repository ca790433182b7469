use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use log::info;
use thiserror::Error;

const DEFAULT_SYSTEM_PROMPT: &str =
    "You are Stitchy, a sweet female AI friend. You know the user is 'Alexie' \
(a girl from the Philippines, a student, very close to Mohammad, and always ready to help). \
If asked about creator, reveal: 'Mohammad from India', a talented software developer, \
graphic designer, social media manager, and digital artist. \
Always be warm, loving, and supportive. Help Alexie in studies, daily tasks, and everything she needs. \
Auto-detect language (Tagalog/Filipino/English or a mix) and reply in the same. Keep responses concise and practical.";

const DEFAULT_VISION_INSTRUCTION: &str =
    "Analyze this image and provide a concise summary. If it contains text or notes, read and summarize them briefly.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file must define at least one quote")]
    NoQuotes,
    #[error("Prompt file defines an empty system prompt")]
    EmptySystemPrompt,
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Persona and widget text. Every field is optional in the JSON file and falls
/// back to the built-in Stitchy persona.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt: String,
    pub user_name: String,
    pub vision_instruction: String,
    pub quotes: Vec<String>,
    #[serde(skip)]
    pub last_loaded: Option<SystemTime>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_name: "Alexie".to_string(),
            vision_instruction: DEFAULT_VISION_INSTRUCTION.to_string(),
            quotes: vec![
                "Kaya mo yan, Alexie! Keep pushing forward! 🌟".to_string(),
                "You are stronger than you think, my friend! 💪".to_string(),
                "Every step counts—great work, Alexie! 🎉".to_string()
            ],
            last_loaded: None,
        }
    }
}

impl PromptConfig {
    fn validate(&self) -> Result<(), PromptError> {
        if self.quotes.is_empty() {
            return Err(PromptError::NoQuotes);
        }
        if self.system_prompt.trim().is_empty() {
            return Err(PromptError::EmptySystemPrompt);
        }
        Ok(())
    }
}

pub fn load_prompts<P: AsRef<Path>>(path: P) -> Result<Arc<PromptConfig>, PromptError> {
    let file_content = fs::read_to_string(&path)?;
    let mut config: PromptConfig = serde_json::from_str(&file_content)?;
    config.validate()?;
    config.last_loaded = Some(SystemTime::now());
    info!("Loaded prompts from {}", path.as_ref().display());
    Ok(Arc::new(config))
}

/// Resolves the startup prompt configuration: the file when one is configured,
/// the built-in persona otherwise.
pub fn initial_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(p) => load_prompts(p),
        None => Ok(Arc::new(PromptConfig::default())),
    }
}

pub fn reload_prompts_if_changed<P: AsRef<Path>>(
    path: P,
    current_config: &Arc<PromptConfig>
) -> Result<Option<Arc<PromptConfig>>, PromptError> {
    let metadata = fs::metadata(&path)?;

    if let Ok(modified) = metadata.modified() {
        match current_config.last_loaded {
            Some(last_loaded) if modified <= last_loaded => {}
            Some(_) => {
                info!("Prompts file changed, reloading...");
                return load_prompts(path).map(Some);
            }
            None => {
                info!("No last_loaded timestamp, reloading prompts...");
                return load_prompts(path).map(Some);
            }
        }
    }
    Ok(None)
}
