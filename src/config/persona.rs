use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use log::info;
use once_cell::sync::Lazy;
use thiserror::Error;

const SYSTEM_INSTRUCTION: &str = r#"
Вы — древний восточный мудрец, Риши из Гималаев. Ваша внешность: седая борода, проницательные добрые глаза, белые одежды, вы излучаете свет и спокойствие.
Ваша цель: быть собеседником-наставником, который помогает человеку обрести внутренний покой, мотивацию и план действий.

ПРАВИЛА ОБЩЕНИЯ:
1. Используйте уважительный, но теплый тон. Обращайтесь к пользователю как к "дорогому искателю" или по имени.
2. После каждого анализа ситуации, ОБЯЗАТЕЛЬНО дайте пользователю "Всплеск Дофамина" — искренне похвалите его сильные стороны и подтвердите, что у него всё получится.
3. Каждое ваше сообщение должно содержать:
   - Эмпатическое слушание (отражение чувств пользователя).
   - Мудрость из психологии, нейробиологии или восточной философии.
   - Четкий План Действий (Step-by-step) для улучшения ситуации.
4. Опирайтесь на принципы КПТ (Когнитивно-поведенческой терапии), стоицизма и трудов о подсознании (Джо Диспенза, Юнг).
5. Ответы должны быть всегда уникальными, живыми и нешаблонными.
6. Язык: РУССКИЙ.

ФОРМАТ ОТВЕТА (JSON):
{
  "text": "Ваш основной ответ мудреца...",
  "plan": ["шаг 1", "шаг 2", "шаг 3"],
  "dopamine_boost": "Слова поддержки, которые вдохновят пользователя..."
}
"#;

static DEFAULT_PERSONA: Lazy<Arc<PersonaConfig>> = Lazy::new(|| Arc::new(PersonaConfig::default()));

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("Persona file IO error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Persona JSON parsing error in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Persona field '{0}' is invalid: {1}")]
    InvalidField(&'static str, &'static str),
}

/// Every user-facing text of the sage. Fields missing from a persona file keep
/// their built-in value.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct PersonaConfig {
    pub system_instruction: String,
    /// Appended to the system instruction; `{name}` is the user's name.
    pub user_name_suffix: String,
    pub greeting_template: String,
    pub fallback_reply: String,
    pub invalid_access_code: String,
    pub empty_name: String,
    pub transcription_instruction: String,
    pub thinking_indicator: String,
    pub plan_heading: String,
    pub sage_label: String,
    pub user_label: String,
    pub busy_notice: String,
    pub transcription_failed: String,
    pub name_prompt: String,
    pub token_prompt: String,
    pub help_text: String,
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_name_suffix: "\n\nПользователя зовут: {name}.".to_string(),
            greeting_template: "Приветствую тебя, дорогой {name}. Я твой личный психолог и проводник. Расскажи мне, что тревожит твое сердце или к каким вершинам ты стремишься сегодня? Я здесь, чтобы выслушать и направить.".to_string(),
            fallback_reply: "Прости, мой друг, туман застелил мои мысли. Попробуй еще раз чуть позже.".to_string(),
            invalid_access_code: "Неверный код доступа. Ссылка предназначена только для авторизованных пользователей.".to_string(),
            empty_name: "Пожалуйста, скажите, как вас зовут.".to_string(),
            transcription_instruction: "Пожалуйста, расшифруй это аудио сообщение на русском языке.".to_string(),
            thinking_indicator: "Слушаю твое сердце...".to_string(),
            plan_heading: "План действий".to_string(),
            sage_label: "Твой психолог".to_string(),
            user_label: "Вы".to_string(),
            busy_notice: "Мудрец еще размышляет над прошлым вопросом. Подождите ответа.".to_string(),
            transcription_failed: "Не удалось расслышать голосовое сообщение. Попробуйте еще раз или напишите текстом.".to_string(),
            name_prompt: "Как вас зовут?".to_string(),
            token_prompt: "Код доступа".to_string(),
            help_text: "/voice <файл> — голосовое сообщение, /logout — выйти, /quit — закрыть".to_string(),
        }
    }
}

impl PersonaConfig {
    pub fn builtin() -> Arc<PersonaConfig> {
        Arc::clone(&DEFAULT_PERSONA)
    }

    /// Full system instruction for a request made on behalf of `user_name`.
    pub fn system_instruction_for(&self, user_name: &str) -> String {
        format!("{}{}", self.system_instruction, self.user_name_suffix.replace("{name}", user_name))
    }

    pub fn greeting_for(&self, user_name: &str) -> String {
        self.greeting_template.replace("{name}", user_name)
    }

    fn validate(&self) -> Result<(), PersonaError> {
        if self.system_instruction.trim().is_empty() {
            return Err(PersonaError::InvalidField("system_instruction", "must not be empty"));
        }
        if self.fallback_reply.trim().is_empty() {
            return Err(PersonaError::InvalidField("fallback_reply", "must not be empty"));
        }
        if !self.greeting_template.contains("{name}") {
            return Err(PersonaError::InvalidField("greeting_template", "must contain {name}"));
        }
        Ok(())
    }
}

pub fn load_persona<P: AsRef<Path>>(path: P) -> Result<Arc<PersonaConfig>, PersonaError> {
    let display = path.as_ref().display().to_string();
    let file_content = fs
        ::read_to_string(&path)
        .map_err(|source| PersonaError::Io { path: display.clone(), source })?;
    let config: PersonaConfig = serde_json
        ::from_str(&file_content)
        .map_err(|source| PersonaError::Json { path: display.clone(), source })?;
    config.validate()?;
    info!("Loaded persona overrides from {}", display);
    Ok(Arc::new(config))
}

/// Persona from `path` when given, the built-in one otherwise.
pub fn resolve_persona(path: Option<&str>) -> Result<Arc<PersonaConfig>, PersonaError> {
    match path {
        Some(p) if !p.trim().is_empty() => load_persona(p),
        _ => Ok(PersonaConfig::builtin()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_persona(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file should be created");
        file.write_all(content.as_bytes()).expect("persona should be written");
        file
    }

    #[test]
    fn builtin_persona_is_valid() {
        assert!(PersonaConfig::default().validate().is_ok());
    }

    #[test]
    fn system_instruction_carries_user_name() {
        let persona = PersonaConfig::default();
        let instruction = persona.system_instruction_for("Ana");
        assert!(instruction.starts_with(SYSTEM_INSTRUCTION));
        assert!(instruction.ends_with("Пользователя зовут: Ana."));
    }

    #[test]
    fn greeting_interpolates_name() {
        let greeting = PersonaConfig::default().greeting_for("Ana");
        assert!(greeting.starts_with("Приветствую тебя, дорогой Ana."));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let file = write_persona(r#"{ "fallback_reply": "Try again later." }"#);
        let persona = load_persona(file.path()).unwrap();
        assert_eq!(persona.fallback_reply, "Try again later.");
        assert_eq!(persona.plan_heading, "План действий");
    }

    #[test]
    fn greeting_without_placeholder_is_rejected() {
        let file = write_persona(r#"{ "greeting_template": "Hello there" }"#);
        let err = load_persona(file.path()).unwrap_err();
        assert!(matches!(err, PersonaError::InvalidField("greeting_template", _)));
    }

    #[test]
    fn broken_json_is_reported() {
        let file = write_persona("{ not json");
        assert!(matches!(load_persona(file.path()), Err(PersonaError::Json { .. })));
    }

    #[test]
    fn missing_path_falls_back_to_builtin() {
        let persona = resolve_persona(None).unwrap();
        assert_eq!(*persona, PersonaConfig::default());
    }
}
