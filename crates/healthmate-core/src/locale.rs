//! Supported display/response languages and the localized system text
//! shown in the chat.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HealthmateError;

/// A selectable interface and response language.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    #[default]
    English,
    Hindi,
    Spanish,
    French,
}

impl Locale {
    pub const ALL: [Locale; 4] = [
        Locale::English,
        Locale::Hindi,
        Locale::Spanish,
        Locale::French,
    ];

    /// Short key persisted in preference storage.
    pub fn key(&self) -> &'static str {
        match self {
            Locale::English => "en",
            Locale::Hindi => "hi",
            Locale::Spanish => "es",
            Locale::French => "fr",
        }
    }

    /// Machine locale tag, also used for speech recognition.
    pub fn code(&self) -> &'static str {
        match self {
            Locale::English => "en-US",
            Locale::Hindi => "hi-IN",
            Locale::Spanish => "es-ES",
            Locale::French => "fr-FR",
        }
    }

    /// Name shown in the language selector.
    pub fn display_name(&self) -> &'static str {
        match self {
            Locale::English => "English",
            Locale::Hindi => "हिन्दी (Hindi)",
            Locale::Spanish => "Español (Spanish)",
            Locale::French => "Français (French)",
        }
    }

    /// English name of the language, used in the model's response directive.
    pub fn language_name(&self) -> &'static str {
        match self {
            Locale::English => "English",
            Locale::Hindi => "Hindi",
            Locale::Spanish => "Spanish",
            Locale::French => "French",
        }
    }

    pub fn from_key(key: &str) -> Option<Locale> {
        Locale::ALL.into_iter().find(|l| l.key() == key)
    }

    /// Resolve a locale tag by its language prefix (`es-MX` -> Spanish).
    pub fn from_code(code: &str) -> Option<Locale> {
        let language = code.split(['-', '_']).next().unwrap_or_default();
        Locale::from_key(&language.to_ascii_lowercase())
    }

    pub fn welcome_text(&self) -> &'static str {
        match self {
            Locale::English => "Hello! I'm your AI health assistant. How can I help you today?",
            Locale::Hindi => "नमस्ते! मैं आपका AI स्वास्थ्य सहायक हूँ। आज मैं आपकी कैसे मदद कर सकता हूँ?",
            Locale::Spanish => "¡Hola! Soy tu asistente de salud con IA. ¿Cómo puedo ayudarte hoy?",
            Locale::French => "Bonjour! Je suis votre assistant de santé IA. Comment puis-je vous aider aujourd'hui?",
        }
    }

    pub fn quota_exceeded_text(&self) -> &'static str {
        match self {
            Locale::English => "You've reached the maximum number of messages for this demo. Please contact us to upgrade!",
            Locale::Hindi => "आपने इस डेमो के लिए अधिकतम संदेशों तक पहुंच गए हैं। अपग्रेड करने के लिए कृपया हमसे संपर्क करें!",
            Locale::Spanish => "Has alcanzado el número máximo de mensajes para esta demostración. ¡Póngase en contacto con nosotros para actualizar!",
            Locale::French => "Vous avez atteint le nombre maximum de messages pour cette démo. Veuillez nous contacter pour mettre à niveau!",
        }
    }

    pub fn error_text(&self) -> &'static str {
        match self {
            Locale::English => "Sorry, there was an error processing your request. Please try again.",
            Locale::Hindi => "क्षमा करें, आपके अनुरोध को संसाधित करने में एक त्रुटि हुई थी। कृपया पुनः प्रयास करें।",
            Locale::Spanish => "Lo sentimos, ha ocurrido un error al procesar su solicitud. Por favor, inténtelo de nuevo.",
            Locale::French => "Désolé, une erreur s'est produite lors du traitement de votre demande. Veuillez réessayer.",
        }
    }

    /// Canned reply used in demo mode when the model cannot be reached.
    pub fn demo_reply_text(&self) -> &'static str {
        match self {
            Locale::English => "Hello! I'm your health assistant. I'm sorry that the API service is currently unavailable, but this is a demo response. I'm not a doctor, but I can help answer your health questions.",
            Locale::Hindi => "नमस्ते! मैं आपका स्वास्थ्य सहायक हूँ। मुझे खेद है कि वर्तमान में API सेवा उपलब्ध नहीं है, लेकिन यह एक डेमो प्रतिक्रिया है। मैं एक डॉक्टर नहीं हूँ, लेकिन मैं आपके स्वास्थ्य प्रश्नों का उत्तर देने में मदद कर सकता हूँ।",
            Locale::Spanish => "¡Hola! Soy tu asistente de salud. Lamento que el servicio de API no esté disponible actualmente, pero esta es una respuesta de demostración. No soy médico, pero puedo ayudarte a responder tus preguntas de salud.",
            Locale::French => "Bonjour! Je suis votre assistant santé. Je regrette que le service API ne soit pas disponible actuellement, mais il s'agit d'une réponse de démonstration. Je ne suis pas médecin, mais je peux vous aider à répondre à vos questions de santé.",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = HealthmateError;

    /// Accepts either a short key (`hi`) or a full tag (`hi-IN`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Locale::from_key(trimmed)
            .or_else(|| Locale::from_code(trimmed))
            .ok_or_else(|| HealthmateError::Config(format!("unsupported locale: {trimmed}")))
    }
}
