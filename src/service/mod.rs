//service/mod.rs
pub mod audit_service;
pub mod locales_service;
pub mod localized_values_service;
pub mod metadata_service;

use actix_web::error::ErrorBadRequest;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use log::{debug, error};
use log_mdc;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;

use crate::app_state::AppState;
use crate::audit::{AuditDataType, AuditEventType, AuditFilter};
use crate::keyvalue::{BulkUpdateStrategy, MetadataError};
use crate::localization::{Locale, LocalesError, LocalizedValue, LocalizedValuesError};
use crate::service::metadata_service::MetadataModel;

/// Attribution for audited mutations, taken from request headers.
struct RequestContext {
    user_name: String,
    correlation_id: String,
}

/// Mutations on audited entities require a `User-Name` header; the
/// `Correlation-Id` header is optional. Both land in the log MDC.
fn request_context(req: &HttpRequest) -> Result<RequestContext, Error> {
    let user_name = req
        .headers()
        .get("User-Name")
        .ok_or_else(|| ErrorBadRequest("Missing User-Name header"))?
        .to_str()
        .map_err(|_| ErrorBadRequest("Invalid User-Name header value"))?
        .to_string();

    let correlation_id = req
        .headers()
        .get("Correlation-Id")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("")
        .to_string();

    log_mdc::insert("user", &user_name);
    log_mdc::insert("correlationId", &correlation_id);

    Ok(RequestContext { user_name, correlation_id })
}

fn error_body(code: &str, message: String) -> serde_json::Value {
    json!({ "errorCode": code, "message": message })
}

fn metadata_error_response(e: MetadataError) -> HttpResponse {
    match e {
        MetadataError::AlreadyExists { ref keys } => HttpResponse::Conflict()
            .json(json!({ "errorCode": "AlreadyExists", "message": e.to_string(), "keys": keys })),
        MetadataError::NotFound { ref keys } => HttpResponse::NotFound()
            .json(json!({ "errorCode": "NotFound", "message": e.to_string(), "keys": keys })),
        MetadataError::Validation(msg) => {
            HttpResponse::BadRequest().json(error_body("Validation", msg))
        }
        MetadataError::Storage(msg) => {
            error!("Metadata storage error: {}", msg);
            HttpResponse::InternalServerError()
                .json(error_body("Storage", "internal storage error".to_string()))
        }
    }
}

fn locales_error_response(e: LocalesError) -> HttpResponse {
    match e {
        LocalesError::AlreadyExists => {
            HttpResponse::Conflict().json(error_body("AlreadyExists", e.to_string()))
        }
        LocalesError::DoesNotExist => {
            HttpResponse::NotFound().json(error_body("DoesNotExist", e.to_string()))
        }
        LocalesError::CannotDeleteDefaultLocale => HttpResponse::BadRequest()
            .json(error_body("CannotDeleteDefaultLocale", e.to_string())),
        LocalesError::CannotSetLocaleAsDefault { ref missing_keys } => HttpResponse::BadRequest()
            .json(json!({
                "errorCode": "CannotSetLocaleAsDefault",
                "message": e.to_string(),
                "missingKeys": missing_keys,
            })),
        LocalesError::CannotDeleteLocaleInUse => {
            HttpResponse::BadRequest().json(error_body("CannotDeleteLocaleInUse", e.to_string()))
        }
        LocalesError::Validation(msg) => {
            HttpResponse::BadRequest().json(error_body("Validation", msg))
        }
        LocalesError::Storage(msg) => {
            error!("Locales storage error: {}", msg);
            HttpResponse::InternalServerError()
                .json(error_body("Storage", "internal storage error".to_string()))
        }
    }
}

fn localized_values_error_response(e: LocalizedValuesError) -> HttpResponse {
    match e {
        LocalizedValuesError::AlreadyExists => {
            HttpResponse::Conflict().json(error_body("AlreadyExists", e.to_string()))
        }
        LocalizedValuesError::DoesNotExist => {
            HttpResponse::NotFound().json(error_body("DoesNotExist", e.to_string()))
        }
        LocalizedValuesError::LocaleDoesNotExist => {
            HttpResponse::BadRequest().json(error_body("LocaleDoesNotExist", e.to_string()))
        }
        LocalizedValuesError::UpsertFailed => {
            HttpResponse::BadRequest().json(error_body("UpsertFailed", e.to_string()))
        }
        LocalizedValuesError::UpsertPartiallyFailed { ref locales } => HttpResponse::BadRequest()
            .json(json!({
                "errorCode": "UpsertPartiallyFailed",
                "message": e.to_string(),
                "locales": locales,
            })),
        LocalizedValuesError::Validation(msg) => {
            HttpResponse::BadRequest().json(error_body("Validation", msg))
        }
        LocalizedValuesError::Storage(msg) => {
            error!("Localized values storage error: {}", msg);
            HttpResponse::InternalServerError()
                .json(error_body("Storage", "internal storage error".to_string()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeywordQuery {
    keyword: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StrategyQuery {
    strategy: BulkUpdateStrategy,
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    skip: Option<usize>,
    take: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct AuditQuery {
    skip: Option<usize>,
    take: Option<usize>,
    user_name: Option<String>,
    correlation_id: Option<String>,
    reference_id: Option<String>,
    data_type: Option<AuditDataType>,
    action_type: Option<AuditEventType>,
    start_date_time: Option<chrono::DateTime<chrono::Utc>>,
    end_date_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
struct LocalizedValueBody {
    value: String,
}

#[derive(Debug, Deserialize)]
struct UpsertByKeyBody {
    values: HashMap<String, String>,
}

// ---- Metadata handlers ----

pub async fn get_categories(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    match app_state.metadata_service.get_categories() {
        Ok(categories) => Ok(HttpResponse::Ok().json(categories)),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn get_collections(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let category = path.into_inner();
    match app_state.metadata_service.get_collections(&category) {
        Ok(collections) => Ok(HttpResponse::Ok().json(collections)),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn get_key_values(
    path: web::Path<(String, String)>,
    query: web::Query<KeywordQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection) = path.into_inner();
    match app_state
        .metadata_service
        .get_key_values(&category, &collection, query.keyword.as_deref())
    {
        Ok(values) => Ok(HttpResponse::Ok().json(values)),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn find_metadata_by_keys(
    path: web::Path<(String, String)>,
    query: web::Query<KeywordQuery>,
    keys: web::Json<Vec<String>>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection) = path.into_inner();
    match app_state.metadata_service.find_by_keys(
        &category,
        &collection,
        &keys,
        query.keyword.as_deref(),
    ) {
        Ok(values) => Ok(HttpResponse::Ok().json(values)),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn get_metadata(
    path: web::Path<(String, String, String)>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection, key) = path.into_inner();
    match app_state.metadata_service.get(&category, &collection, &key) {
        Ok(Some(model)) => Ok(HttpResponse::Ok().json(model)),
        Ok(None) => Ok(HttpResponse::NotFound().json(error_body(
            "NotFound",
            format!("no metadata under {}/{}/{}", category, collection, key),
        ))),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn add_metadata(
    path: web::Path<(String, String, String)>,
    model: web::Json<MetadataModel>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection, key) = path.into_inner();
    debug!("POST metadata {}/{}/{}", category, collection, key);
    match app_state
        .metadata_service
        .add(&category, &collection, &key, &model)
    {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn update_metadata(
    path: web::Path<(String, String, String)>,
    model: web::Json<MetadataModel>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection, key) = path.into_inner();
    match app_state
        .metadata_service
        .update(&category, &collection, &key, &model)
    {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn delete_metadata(
    path: web::Path<(String, String, String)>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection, key) = path.into_inner();
    match app_state.metadata_service.delete(&category, &collection, &key) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn bulk_add_metadata(
    path: web::Path<(String, String)>,
    entries: web::Json<HashMap<String, MetadataModel>>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection) = path.into_inner();
    match app_state
        .metadata_service
        .bulk_add(&category, &collection, &entries)
    {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn bulk_update_metadata(
    path: web::Path<(String, String)>,
    query: web::Query<StrategyQuery>,
    entries: web::Json<HashMap<String, MetadataModel>>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection) = path.into_inner();
    match app_state
        .metadata_service
        .bulk_update(&category, &collection, &entries, query.strategy)
    {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

pub async fn bulk_delete_metadata(
    path: web::Path<(String, String)>,
    keys: web::Json<Vec<String>>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (category, collection) = path.into_inner();
    match app_state
        .metadata_service
        .bulk_delete(&category, &collection, &keys)
    {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(metadata_error_response(e)),
    }
}

// ---- Locale handlers ----

pub async fn get_locales(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    match app_state.locales_service.get_all() {
        Ok(locales) => Ok(HttpResponse::Ok().json(locales)),
        Err(e) => Ok(locales_error_response(e)),
    }
}

pub async fn get_default_locale(app_state: web::Data<AppState>) -> Result<HttpResponse, Error> {
    match app_state.locales_service.get_default() {
        Ok(locale) => Ok(HttpResponse::Ok().json(locale)),
        Err(e) => Ok(locales_error_response(e)),
    }
}

pub async fn upsert_locale(
    locale: web::Json<Locale>,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = request_context(&req)?;
    match app_state.locales_service.upsert(
        locale.into_inner(),
        &context.user_name,
        &context.correlation_id,
    ) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(locales_error_response(e)),
    }
}

pub async fn delete_locale(
    path: web::Path<String>,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = request_context(&req)?;
    let id = path.into_inner();
    match app_state
        .locales_service
        .delete(&id, &context.user_name, &context.correlation_id)
    {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(locales_error_response(e)),
    }
}

// ---- Localized value handlers ----

pub async fn get_all_localized_values(
    query: web::Query<PageQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    match app_state
        .localized_values_service
        .get_all(query.skip.unwrap_or(0), query.take.unwrap_or(0))
    {
        Ok(page) => Ok(HttpResponse::Ok().json(page)),
        Err(e) => Ok(localized_values_error_response(e)),
    }
}

pub async fn get_localized_values_by_locale(
    path: web::Path<String>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let locale = path.into_inner();
    match app_state.localized_values_service.get_by_locale(&locale) {
        Ok(values) => Ok(HttpResponse::Ok().json(values)),
        Err(e) => Ok(localized_values_error_response(e)),
    }
}

pub async fn get_localized_value(
    path: web::Path<(String, String)>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let (locale, key) = path.into_inner();
    match app_state.localized_values_service.get(&locale, &key) {
        Ok(value) => Ok(HttpResponse::Ok().json(value)),
        Err(e) => Ok(localized_values_error_response(e)),
    }
}

pub async fn add_localized_value(
    path: web::Path<(String, String)>,
    body: web::Json<LocalizedValueBody>,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = request_context(&req)?;
    let (locale, key) = path.into_inner();
    let value = LocalizedValue { locale, key, value: body.into_inner().value };
    match app_state.localized_values_service.add(
        value,
        &context.user_name,
        &context.correlation_id,
    ) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(localized_values_error_response(e)),
    }
}

pub async fn update_localized_value(
    path: web::Path<(String, String)>,
    body: web::Json<LocalizedValueBody>,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = request_context(&req)?;
    let (locale, key) = path.into_inner();
    let value = LocalizedValue { locale, key, value: body.into_inner().value };
    match app_state.localized_values_service.update(
        value,
        &context.user_name,
        &context.correlation_id,
    ) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(localized_values_error_response(e)),
    }
}

pub async fn delete_localized_value(
    path: web::Path<(String, String)>,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = request_context(&req)?;
    let (locale, key) = path.into_inner();
    match app_state.localized_values_service.delete(
        &locale,
        &key,
        &context.user_name,
        &context.correlation_id,
    ) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(localized_values_error_response(e)),
    }
}

pub async fn upsert_localized_values_by_key(
    path: web::Path<String>,
    body: web::Json<UpsertByKeyBody>,
    req: HttpRequest,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let context = request_context(&req)?;
    let key = path.into_inner();
    match app_state.localized_values_service.upsert_by_key(
        &key,
        &body.values,
        &context.user_name,
        &context.correlation_id,
    ) {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(localized_values_error_response(e)),
    }
}

// ---- Audit handler ----

pub async fn get_audit_logs(
    query: web::Query<AuditQuery>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    let query = query.into_inner();
    let filter = AuditFilter {
        user_name: query.user_name,
        correlation_id: query.correlation_id,
        reference_id: query.reference_id,
        data_type: query.data_type,
        action_type: query.action_type,
        start_date_time: query.start_date_time,
        end_date_time: query.end_date_time,
    };

    match app_state
        .audit_service
        .get_logs(&filter, query.skip, query.take)
    {
        Ok(page) => Ok(HttpResponse::Ok().json(page)),
        Err(e) => {
            error!("Audit storage error: {}", e);
            Ok(HttpResponse::InternalServerError()
                .json(error_body("Storage", "internal storage error".to_string())))
        }
    }
}

/// Route table shared by the server binary and the integration tests.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/metadata", web::get().to(get_categories))
            .route("/metadata/{category}", web::get().to(get_collections))
            .route(
                "/metadata/{category}/{collection}",
                web::get().to(get_key_values),
            )
            .route(
                "/metadata/{category}/{collection}",
                web::post().to(bulk_add_metadata),
            )
            .route(
                "/metadata/{category}/{collection}",
                web::patch().to(bulk_update_metadata),
            )
            .route(
                "/metadata/{category}/{collection}",
                web::delete().to(bulk_delete_metadata),
            )
            .route(
                "/metadata/{category}/{collection}/find",
                web::post().to(find_metadata_by_keys),
            )
            .route(
                "/metadata/{category}/{collection}/{key}",
                web::get().to(get_metadata),
            )
            .route(
                "/metadata/{category}/{collection}/{key}",
                web::post().to(add_metadata),
            )
            .route(
                "/metadata/{category}/{collection}/{key}",
                web::put().to(update_metadata),
            )
            .route(
                "/metadata/{category}/{collection}/{key}",
                web::delete().to(delete_metadata),
            )
            .route("/locales", web::get().to(get_locales))
            .route("/locales", web::post().to(upsert_locale))
            .route("/locales/default", web::get().to(get_default_locale))
            .route("/locales/{id}", web::delete().to(delete_locale))
            .route(
                "/localized-values",
                web::get().to(get_all_localized_values),
            )
            .route(
                "/localized-values/by-key/{key}",
                web::post().to(upsert_localized_values_by_key),
            )
            .route(
                "/localized-values/{locale}",
                web::get().to(get_localized_values_by_locale),
            )
            .route(
                "/localized-values/{locale}/{key}",
                web::get().to(get_localized_value),
            )
            .route(
                "/localized-values/{locale}/{key}",
                web::post().to(add_localized_value),
            )
            .route(
                "/localized-values/{locale}/{key}",
                web::put().to(update_localized_value),
            )
            .route(
                "/localized-values/{locale}/{key}",
                web::delete().to(delete_localized_value),
            )
            .route("/audit", web::get().to(get_audit_logs)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_request_context_requires_user_name() {
        let req = TestRequest::default().to_http_request();
        assert!(request_context(&req).is_err());

        let req = TestRequest::default()
            .insert_header(("User-Name", "alice"))
            .to_http_request();
        let context = request_context(&req).unwrap();
        assert_eq!(context.user_name, "alice");
        assert_eq!(context.correlation_id, "");
    }

    #[test]
    fn test_request_context_reads_correlation_id() {
        let req = TestRequest::default()
            .insert_header(("User-Name", "alice"))
            .insert_header(("Correlation-Id", "corr-42"))
            .to_http_request();
        let context = request_context(&req).unwrap();
        assert_eq!(context.correlation_id, "corr-42");
    }
}
