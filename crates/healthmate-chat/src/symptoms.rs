//! Guided symptom check: a fixed symptom catalog turned into a structured
//! triage question for the assistant.

use std::fmt;
use std::str::FromStr;

use tracing::info;

use healthmate_core::locale::Locale;

use crate::error::ChatError;
use crate::prompt::PromptTranslator;

/// Symptoms offered by the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symptom {
    Headache,
    Fever,
    Cough,
    Fatigue,
    Nausea,
    Dizziness,
    Pain,
    Rash,
}

impl Symptom {
    pub const ALL: [Symptom; 8] = [
        Symptom::Headache,
        Symptom::Fever,
        Symptom::Cough,
        Symptom::Fatigue,
        Symptom::Nausea,
        Symptom::Dizziness,
        Symptom::Pain,
        Symptom::Rash,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Symptom::Headache => "headache",
            Symptom::Fever => "fever",
            Symptom::Cough => "cough",
            Symptom::Fatigue => "fatigue",
            Symptom::Nausea => "nausea",
            Symptom::Dizziness => "dizziness",
            Symptom::Pain => "pain",
            Symptom::Rash => "rash",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Symptom::Headache => "Headache",
            Symptom::Fever => "Fever",
            Symptom::Cough => "Cough",
            Symptom::Fatigue => "Fatigue",
            Symptom::Nausea => "Nausea",
            Symptom::Dizziness => "Dizziness",
            Symptom::Pain => "Pain",
            Symptom::Rash => "Rash",
        }
    }
}

impl fmt::Display for Symptom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Symptom {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Symptom::ALL
            .into_iter()
            .find(|symptom| symptom.id() == wanted)
            .ok_or_else(|| ChatError::InvalidSymptoms(format!("unknown symptom '{}'", s.trim())))
    }
}

/// A symptom selection with optional free-text details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomCheck {
    symptoms: Vec<Symptom>,
    details: Option<String>,
}

impl SymptomCheck {
    /// Build a check. Duplicates are collapsed in selection order; an empty
    /// selection is rejected.
    pub fn new(symptoms: &[Symptom], details: Option<&str>) -> Result<Self, ChatError> {
        let mut selected = Vec::with_capacity(symptoms.len());
        for symptom in symptoms {
            if !selected.contains(symptom) {
                selected.push(*symptom);
            }
        }
        if selected.is_empty() {
            return Err(ChatError::InvalidSymptoms(
                "select at least one symptom".to_string(),
            ));
        }
        let details = details
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        Ok(Self {
            symptoms: selected,
            details,
        })
    }

    /// Parse a comma separated id list such as `"fever, cough"`.
    pub fn parse(list: &str, details: Option<&str>) -> Result<Self, ChatError> {
        let symptoms = list
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Symptom>, _>>()?;
        Self::new(&symptoms, details)
    }

    pub fn symptoms(&self) -> &[Symptom] {
        &self.symptoms
    }

    /// The triage question sent to the assistant.
    pub fn prompt(&self) -> String {
        let labels: Vec<&str> = self.symptoms.iter().map(Symptom::label).collect();
        let mut prompt = format!(
            "I'm experiencing the following symptoms: {}.\n",
            labels.join(", ")
        );
        if let Some(details) = &self.details {
            prompt.push_str(&format!("Additional information: {}\n", details));
        }
        prompt.push_str(
            "\nBased on these symptoms, what could be potential causes? \
             What should I do next? Should I seek medical attention?\n\n\
             Please format your response with the following sections:\n\
             1. Possible causes\n\
             2. Recommended actions\n\
             3. When to seek immediate medical attention",
        );
        prompt
    }

    /// Ask the assistant. Symptom checks are not part of the conversation
    /// and do not count against its quota.
    pub async fn run(&self, translator: &PromptTranslator, locale: Locale) -> Result<String, ChatError> {
        info!(symptoms = self.symptoms.len(), locale = %locale, "Running symptom check");
        Ok(translator.translate(&self.prompt(), locale).await?)
    }
}
