//! Backend endpoint paths, relative to the API base URL

pub const TOKEN: &str = "token/";
pub const TOKEN_REFRESH: &str = "token/refresh/";
pub const CURRENT_USER: &str = "current_user/";
pub const USERS: &str = "usuarios/";
pub const RANKING: &str = "usuarios/ranking/";
pub const ICONS: &str = "icones/";
// The backend routes this action without a trailing slash.
pub const AVAILABLE_ICONS: &str = "icones/disponiveis";
pub const MY_ICONS: &str = "icones_comprados/meus_icones/";
pub const NOISE_POSTS: &str = "posts_ruido/";
pub const GREEN_AREA_POSTS: &str = "posts_areas/";

pub fn user(id: i64) -> String {
    format!("{USERS}{id}/")
}

pub fn purchase_icon(id: i64) -> String {
    format!("{ICONS}{id}/comprar/")
}
