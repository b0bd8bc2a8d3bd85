use serde::{Deserialize, Serialize};

/// Cosmetic profile icon sold in the shop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Icone {
    pub id: i64,
    pub titulo: String,
    #[serde(default)]
    pub descricao: String,
    pub preco: i64,
}

/// Ownership record from `icones_comprados/meus_icones/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchasedIcon {
    pub user: i64,
    pub icone: i64,
}

/// `{"detail": "..."}` body used by action endpoints and error responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailResponse {
    pub detail: String,
}
