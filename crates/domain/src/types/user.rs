use serde::{Deserialize, Serialize};

/// User profile as returned by `current_user/` and `usuarios/`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub streak: i64,
    #[serde(default)]
    pub moedas: i64,
    /// Selected profile icon; the backend stores `null` until one is chosen
    #[serde(default)]
    pub id_icone: Option<i64>,
}

/// Body of `PATCH usuarios/{id}/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateIconRequest {
    pub id_icone: i64,
}
