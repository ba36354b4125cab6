use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};

use super::api::error::ErrorResponse;
use super::api::health::HealthResponse;
use super::api::predict::{PredictResponse, SatInfo};
use super::api::update::UpdateResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        super::api::predict::predict,
        super::api::update::update_tle,
        super::api::health::health,
    ),
    components(
        schemas(
            PredictResponse,
            SatInfo,
            crate::predict::PassRecord,
            UpdateResponse,
            HealthResponse,
            ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Satpass API",
        description = "Satellite pass predictions from cached Space-Track element sets",
        version = "0.1.0"
    ),
    tags(
        (name = "predict", description = "Pass prediction"),
        (name = "tle", description = "TLE cache maintenance"),
        (name = "health", description = "Liveness")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::new("apiKey"))),
            );
        }
    }
}
