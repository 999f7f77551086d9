//! Canned local responses used when no AI provider is configured

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, TimeZone};

use super::AiBackend;

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

/// Offline backend answering a handful of everyday questions
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalBackend;

impl LocalBackend {
    /// Answer `prompt` as of `now`
    #[must_use]
    pub fn reply_at<Tz: TimeZone>(prompt: &str, now: &DateTime<Tz>) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let lower = prompt.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has_word = |candidates: &[&str]| candidates.iter().any(|c| words.contains(c));
        let has_phrase = |candidates: &[&str]| candidates.iter().any(|c| lower.contains(c));

        if has_word(&["hora", "time"]) {
            format!(
                "Son las {} del {}",
                now.format("%H:%M:%S"),
                now.format("%d/%m/%Y")
            )
        } else if has_word(&["fecha", "date"]) {
            let month = MONTHS[now.month0() as usize];
            format!("Hoy es {:02} de {month} de {}", now.day(), now.year())
        } else if has_word(&["hola", "hello", "hi"]) {
            "¡Hola! Soy Jarvis, tu asistente virtual. ¿En qué puedo ayudarte?".to_string()
        } else if has_word(&["gracias", "thanks"]) {
            "¡De nada! Estoy aquí para ayudarte.".to_string()
        } else if has_phrase(&["como estas", "cómo estás", "how are you"]) {
            "Estoy funcionando perfectamente, gracias por preguntar. ¿Y tú qué tal?".to_string()
        } else if has_word(&["clima", "weather", "tiempo"]) {
            "Lo siento, no tengo acceso a información meteorológica en este momento. \
             Puedes consultar tu app de clima favorita."
                .to_string()
        } else {
            format!(
                "He recibido tu consulta: '{prompt}'. Como no tengo configurada una API de IA, \
                 esta es una respuesta básica. Para funcionalidad completa, configura tu API key."
            )
        }
    }
}

#[async_trait]
impl AiBackend for LocalBackend {
    fn name(&self) -> &str {
        "Local"
    }

    async fn ask(&self, prompt: &str, _context: &[String]) -> String {
        Self::reply_at(prompt, &Local::now())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9).unwrap()
    }

    #[test]
    fn test_time_and_date() {
        assert_eq!(
            LocalBackend::reply_at("¿Qué hora es?", &at()),
            "Son las 14:05:09 del 07/03/2024"
        );
        assert_eq!(
            LocalBackend::reply_at("dime la fecha", &at()),
            "Hoy es 07 de marzo de 2024"
        );
    }

    #[test]
    fn test_greeting_needs_whole_word() {
        assert!(LocalBackend::reply_at("hola jarvis", &at()).starts_with("¡Hola!"));
        // "hi" inside another word is not a greeting
        assert!(LocalBackend::reply_at("chispa", &at()).starts_with("He recibido"));
    }

    #[test]
    fn test_fallback_echoes_prompt() {
        let reply = LocalBackend::reply_at("cuéntame un chiste", &at());
        assert!(reply.contains("'cuéntame un chiste'"));
    }
}
