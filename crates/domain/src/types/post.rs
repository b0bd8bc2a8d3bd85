//! Noise and green-area reports

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A noise reading captured on the device, ready to be submitted
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSubmission {
    pub latitude: f64,
    pub longitude: f64,
    pub decibels: f64,
}

/// Body of `POST posts_ruido/`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoisePostRequest {
    pub local_latitude: f64,
    pub local_longitude: f64,
    pub decibeis: f64,
}

impl From<&AudioSubmission> for NoisePostRequest {
    fn from(submission: &AudioSubmission) -> Self {
        Self {
            local_latitude: submission.latitude,
            local_longitude: submission.longitude,
            decibeis: submission.decibels,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoisePost {
    pub id: i64,
    pub user: i64,
    pub local_latitude: f64,
    pub local_longitude: f64,
    pub local_data: NaiveDate,
    pub decibeis: f64,
}

/// Coins and streak awarded by the server for a new post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub aumentou_streak: bool,
    pub moedas_ganhas: i64,
}

/// Response of `POST posts_ruido/`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoisePostCreated {
    pub post: NoisePost,
    pub recompensa: Reward,
}

/// A green-area report as captured on the device
///
/// `image` holds the raw picture bytes; it is optimized and base64-encoded
/// before upload.
#[derive(Debug, Clone, PartialEq)]
pub struct GreenAreaSubmission {
    pub latitude: f64,
    pub longitude: f64,
    pub title: String,
    pub access_mode: String,
    pub description: String,
    pub image_name: String,
    pub image_content_type: Option<String>,
    pub image: Vec<u8>,
}

/// Body of `POST posts_areas/`
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenAreaPostRequest {
    pub local_latitude: f64,
    pub local_longitude: f64,
    pub titulo: String,
    pub modo_acesso: String,
    pub descricao: String,
    pub imagem_nome: String,
    pub imagem_base64: String,
    pub imagem_content_type: String,
}

impl std::fmt::Debug for GreenAreaPostRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreenAreaPostRequest")
            .field("local_latitude", &self.local_latitude)
            .field("local_longitude", &self.local_longitude)
            .field("titulo", &self.titulo)
            .field("imagem_nome", &self.imagem_nome)
            .field("imagem_base64_len", &self.imagem_base64.len())
            .field("imagem_content_type", &self.imagem_content_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreenAreaPost {
    pub id: i64,
    pub user: i64,
    pub local_latitude: f64,
    pub local_longitude: f64,
    pub created_at: DateTime<Utc>,
    pub titulo: String,
    pub modo_acesso: String,
    #[serde(default)]
    pub descricao: String,
    pub imagem_nome: String,
    #[serde(default)]
    pub imagem_url: Option<String>,
}
