//! Integration tests for the backend wire contract
//!
//! Payloads below are shaped like real backend responses; field names must
//! round-trip exactly.

use heatmapp_domain::{
    AppConfig, GreenAreaPost, HeatmapDataResponse, LogFormat, LoginResponse, NoisePost,
    NoisePostRequest, UserData,
};
use serde_json::json;

#[test]
fn test_current_user_payload() {
    let user: UserData = serde_json::from_value(json!({
        "id": 3,
        "username": "ana",
        "first_name": "Ana",
        "last_name": "Lima",
        "email": "ana@example.com",
        "streak": 4,
        "moedas": 120,
        "id_icone": 2
    }))
    .unwrap();

    assert_eq!(user.moedas, 120);
    assert_eq!(user.id_icone, Some(2));
}

#[test]
fn test_login_response_without_refresh() {
    let response: LoginResponse = serde_json::from_value(json!({"access": "a"})).unwrap();
    assert_eq!(response.refresh, None);
    assert_eq!(serde_json::to_value(&response).unwrap(), json!({"access": "a"}));
}

#[test]
fn test_noise_request_uses_backend_names() {
    let request = NoisePostRequest { local_latitude: -8.0, local_longitude: -34.9, decibeis: 65.0 };
    assert_eq!(
        serde_json::to_value(request).unwrap(),
        json!({"local_latitude": -8.0, "local_longitude": -34.9, "decibeis": 65.0})
    );
}

#[test]
fn test_noise_posts_project_onto_heatmap() {
    let posts: Vec<NoisePost> = serde_json::from_value(json!([
        {"id": 1, "user": 1, "local_latitude": -8.0, "local_longitude": -34.9,
         "local_data": "2025-05-02", "decibeis": 30.0},
        {"id": 2, "user": 2, "local_latitude": -8.1, "local_longitude": -34.8,
         "local_data": "2025-05-02", "decibeis": -5.0}
    ]))
    .unwrap();

    let heatmap = HeatmapDataResponse::from_noise_posts(&posts);

    assert_eq!(heatmap.points.len(), 2);
    assert!((heatmap.points[0].weight - 0.25).abs() < f64::EPSILON);
    assert!(heatmap.points[1].weight.abs() < f64::EPSILON);
}

#[test]
fn test_green_area_post_with_null_image_url() {
    let post: GreenAreaPost = serde_json::from_value(json!({
        "id": 9,
        "user": 1,
        "local_latitude": -8.0,
        "local_longitude": -34.9,
        "created_at": "2025-05-02T10:30:00Z",
        "titulo": "Praça",
        "modo_acesso": "livre",
        "descricao": "",
        "imagem_nome": "praca.jpg",
        "imagem_url": null
    }))
    .unwrap();

    assert_eq!(post.imagem_url, None);
    assert_eq!(post.created_at.to_rfc3339(), "2025-05-02T10:30:00+00:00");
}

#[test]
fn test_partial_toml_config_keeps_defaults() {
    let config: AppConfig = toml::from_str(
        r#"
[logging]
format = "json"
"#,
    )
    .unwrap();

    assert_eq!(config.logging.format, LogFormat::Json);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.api, heatmapp_domain::ApiConfig::default());
}
