//! Typed wrappers for every backend endpoint
//!
//! Each wrapper builds an [`ApiRequest`] and hands it to
//! [`ApiClient::request`], so all of them share the refresh-and-retry
//! behaviour.

use heatmapp_domain::{
    AudioSubmission, DetailResponse, GreenAreaPost, GreenAreaPostRequest, GreenAreaSubmission,
    HeatmapDataResponse, Icone, LoginRequest, LoginResponse, NoisePost, NoisePostCreated,
    NoisePostRequest, PurchasedIcon, RegisterRequest, UpdateIconRequest, UserData,
};
use tracing::{instrument, warn};

use super::client::ApiClient;
use super::paths;
use super::problem::ApiResult;
use crate::http::ApiRequest;
use crate::imaging::ImageSource;

impl ApiClient {
    // Authentication
    // ---------------------------------------------------------------

    /// `POST token/`
    ///
    /// Does not touch the stored tokens; see
    /// [`AuthSession::login`](super::AuthSession::login).
    pub async fn login(&self, credentials: &LoginRequest) -> ApiResult<LoginResponse> {
        self.request(ApiRequest::post(paths::TOKEN).json(credentials)?).await
    }

    // Users
    // ---------------------------------------------------------------

    pub async fn current_user(&self) -> ApiResult<UserData> {
        self.request(ApiRequest::get(paths::CURRENT_USER)).await
    }

    pub async fn register_user(&self, registration: &RegisterRequest) -> ApiResult<UserData> {
        self.request(ApiRequest::post(paths::USERS).json(registration)?).await
    }

    /// Users ordered by streak, as ranked by the server.
    pub async fn ranking(&self) -> ApiResult<Vec<UserData>> {
        self.request(ApiRequest::get(paths::RANKING)).await
    }

    pub async fn update_profile_icon(&self, user_id: i64, icon_id: i64) -> ApiResult<UserData> {
        let body = UpdateIconRequest { id_icone: icon_id };
        self.request(ApiRequest::patch(paths::user(user_id)).json(&body)?).await
    }

    // Icons
    // ---------------------------------------------------------------

    pub async fn icons(&self) -> ApiResult<Vec<Icone>> {
        self.request(ApiRequest::get(paths::ICONS)).await
    }

    /// Icons the current user can still buy.
    pub async fn available_icons(&self) -> ApiResult<Vec<Icone>> {
        self.request(ApiRequest::get(paths::AVAILABLE_ICONS)).await
    }

    pub async fn purchase_icon(&self, icon_id: i64) -> ApiResult<DetailResponse> {
        self.request(ApiRequest::post(paths::purchase_icon(icon_id))).await
    }

    pub async fn my_icons(&self) -> ApiResult<Vec<PurchasedIcon>> {
        self.request(ApiRequest::get(paths::MY_ICONS)).await
    }

    // Noise posts
    // ---------------------------------------------------------------

    #[instrument(skip(self))]
    pub async fn submit_noise(&self, submission: &AudioSubmission) -> ApiResult<NoisePostCreated> {
        let body = NoisePostRequest::from(submission);
        self.request(ApiRequest::post(paths::NOISE_POSTS).json(&body)?).await
    }

    pub async fn noise_posts(&self) -> ApiResult<Vec<NoisePost>> {
        self.request(ApiRequest::get(paths::NOISE_POSTS)).await
    }

    /// Noise posts projected onto heatmap points.
    ///
    /// Posts with non-finite readings are skipped; an empty result is still
    /// `Ok`.
    pub async fn noise_heatmap(&self) -> ApiResult<HeatmapDataResponse> {
        let posts = self.noise_posts().await?;
        Ok(HeatmapDataResponse::from_noise_posts(&posts))
    }

    // Green areas
    // ---------------------------------------------------------------

    /// Optimize the photo and upload the report.
    ///
    /// If the photo cannot be optimized the original bytes are uploaded.
    #[instrument(skip(self, submission), fields(title = %submission.title))]
    pub async fn submit_green_area(
        &self,
        submission: &GreenAreaSubmission,
    ) -> ApiResult<GreenAreaPost> {
        let source = ImageSource::new(
            submission.image.clone(),
            submission.image_name.clone(),
            submission.image_content_type.clone(),
        );
        let image = match self.image_optimizer().optimize(&source).await {
            Ok(image) => image,
            Err(err) => {
                warn!(error = %err, "Image optimization failed; uploading original bytes");
                source.passthrough()
            }
        };

        let body = GreenAreaPostRequest {
            local_latitude: submission.latitude,
            local_longitude: submission.longitude,
            titulo: submission.title.clone(),
            modo_acesso: submission.access_mode.clone(),
            descricao: submission.description.clone(),
            imagem_nome: image.file_name,
            imagem_base64: image.base64,
            imagem_content_type: image.content_type,
        };
        self.request(ApiRequest::post(paths::GREEN_AREA_POSTS).json(&body)?).await
    }

    pub async fn green_areas(&self) -> ApiResult<Vec<GreenAreaPost>> {
        self.request(ApiRequest::get(paths::GREEN_AREA_POSTS)).await
    }
}
