//! Target languages offered for dubbing, with their translation codes and
//! synthesis voices.

use serde::{Deserialize, Serialize};

use crate::error::{RedubError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Male,
    #[default]
    Female,
}

impl std::fmt::Display for VoiceGender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoiceGender::Male => write!(f, "male"),
            VoiceGender::Female => write!(f, "female"),
        }
    }
}

impl std::str::FromStr for VoiceGender {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" => Ok(VoiceGender::Male),
            "female" => Ok(VoiceGender::Female),
            _ => Err(format!("Unknown voice: {}. Use 'male' or 'female'", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    /// Code understood by the translator.
    pub code: &'static str,
    pub male_voice: &'static str,
    pub female_voice: &'static str,
}

impl Language {
    pub fn voice(&self, gender: VoiceGender) -> &'static str {
        match gender {
            VoiceGender::Male => self.male_voice,
            VoiceGender::Female => self.female_voice,
        }
    }
}

pub const LANGUAGES: &[Language] = &[
    Language { name: "Spanish", code: "es", male_voice: "es-ES-AlvaroNeural", female_voice: "es-ES-ElviraNeural" },
    Language { name: "French", code: "fr", male_voice: "fr-FR-HenriNeural", female_voice: "fr-FR-DeniseNeural" },
    Language { name: "German", code: "de", male_voice: "de-DE-ConradNeural", female_voice: "de-DE-KatjaNeural" },
    Language { name: "Hindi", code: "hi", male_voice: "hi-IN-MadhurNeural", female_voice: "hi-IN-SwaraNeural" },
    Language { name: "Tamil", code: "ta", male_voice: "ta-IN-ValluvarNeural", female_voice: "ta-IN-PallaviNeural" },
    Language { name: "Arabic", code: "ar", male_voice: "ar-SA-FareedNeural", female_voice: "ar-SA-ZariyahNeural" },
    Language { name: "Bengali", code: "bn", male_voice: "bn-IN-BashkarNeural", female_voice: "bn-IN-TanishaaNeural" },
    Language { name: "Chinese", code: "zh-cn", male_voice: "zh-CN-YunxiNeural", female_voice: "zh-CN-XiaoxiaoNeural" },
    Language { name: "Portuguese", code: "pt", male_voice: "pt-PT-FernandoNeural", female_voice: "pt-PT-FernandaNeural" },
    Language { name: "Russian", code: "ru", male_voice: "ru-RU-DmitryNeural", female_voice: "ru-RU-SvetlanaNeural" },
    Language { name: "English", code: "en", male_voice: "en-US-GuyNeural", female_voice: "en-US-JennyNeural" },
];

/// Find a language by display name or code, ignoring case.
pub fn lookup(query: &str) -> Result<&'static Language> {
    let query = query.trim();
    LANGUAGES
        .iter()
        .find(|l| l.name.eq_ignore_ascii_case(query) || l.code.eq_ignore_ascii_case(query))
        .ok_or_else(|| {
            let known: Vec<&str> = LANGUAGES.iter().map(|l| l.name).collect();
            RedubError::Config(format!(
                "Unknown language: {}. Supported: {}",
                query,
                known.join(", ")
            ))
        })
}
