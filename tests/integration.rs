use actix_web::{http::StatusCode, test, web, App};
use serde_json::{json, Value};

use curio::app_state::AppState;
use curio::service::configure_routes;

// Each test gets its own mock-backed state, so tests stay independent.
macro_rules! test_app {
    () => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(AppState::new_for_testing()))
                .configure(configure_routes),
        )
        .await
    };
}

fn metadata_body(pairs: &[(&str, &str)], keywords: Option<Vec<&str>>) -> Value {
    let data: serde_json::Map<String, Value> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    match keywords {
        Some(kw) => json!({ "data": data, "keywords": kw }),
        None => json!({ "data": data }),
    }
}

#[actix_web::test]
async fn test_metadata_round_trip_is_case_insensitive() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/metadata/Assets/Fx/EurUsd")
        .set_json(metadata_body(&[("rate", "1.09")], None))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Lookup under different casing resolves to the same record.
    let req = test::TestRequest::get()
        .uri("/api/metadata/assets/FX/eurusd")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["rate"], "1.09");

    // A second add under different casing is a conflict.
    let req = test::TestRequest::post()
        .uri("/api/metadata/ASSETS/fx/eurUSD")
        .set_json(metadata_body(&[("rate", "1.10")], None))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_metadata_update_and_delete_semantics() {
    let app = test_app!();

    // Updating an absent key fails.
    let req = test::TestRequest::put()
        .uri("/api/metadata/cat/col/key")
        .set_json(metadata_body(&[("v", "1")], None))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/metadata/cat/col/key")
        .set_json(metadata_body(&[("v", "1")], None))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::put()
        .uri("/api/metadata/cat/col/key")
        .set_json(metadata_body(&[("v", "2")], None))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    // Delete twice; the second is still a success.
    for _ in 0..2 {
        let req = test::TestRequest::delete()
            .uri("/api/metadata/cat/col/key")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    }

    let req = test::TestRequest::get().uri("/api/metadata/cat/col/key").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_metadata_validation_rejected() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/metadata/cat/col/key")
        .set_json(json!({ "data": {} }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errorCode"], "Validation");
}

#[actix_web::test]
async fn test_bulk_add_reports_conflicts_and_keeps_the_rest() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/metadata/cat/col/A")
        .set_json(metadata_body(&[("v", "1")], None))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/api/metadata/cat/col")
        .set_json(json!({
            "a": metadata_body(&[("v", "9")], None),
            "B": metadata_body(&[("v", "2")], None),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["keys"], json!(["a"]));

    // The non-conflicting entry landed, the conflicting one kept its payload.
    let req = test::TestRequest::get().uri("/api/metadata/cat/col/B").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let req = test::TestRequest::get().uri("/api/metadata/cat/col/A").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["v"], "1");
}

#[actix_web::test]
async fn test_bulk_update_matched_only_fails_with_full_missing_set() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/metadata/cat/col/A")
        .set_json(metadata_body(&[("v", "1")], None))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::patch()
        .uri("/api/metadata/cat/col?strategy=UpdateMatchedOnly")
        .set_json(json!({
            "A": metadata_body(&[("v", "9")], None),
            "B": metadata_body(&[("v", "9")], None),
            "C": metadata_body(&[("v", "9")], None),
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["keys"], json!(["B", "C"]));

    // Nothing was committed.
    let req = test::TestRequest::get().uri("/api/metadata/cat/col/A").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["data"]["v"], "1");
}

#[actix_web::test]
async fn test_bulk_update_replace_swaps_the_key_set() {
    let app = test_app!();

    for key in ["A", "B"] {
        let req = test::TestRequest::post()
            .uri(&format!("/api/metadata/cat/col/{}", key))
            .set_json(metadata_body(&[("v", "old")], None))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    }

    let req = test::TestRequest::patch()
        .uri("/api/metadata/cat/col?strategy=Replace")
        .set_json(json!({
            "B": metadata_body(&[("v", "new")], None),
            "C": metadata_body(&[("v", "new")], None),
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri("/api/metadata/cat/col/A").to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    for key in ["B", "C"] {
        let req = test::TestRequest::get()
            .uri(&format!("/api/metadata/cat/col/{}", key))
            .to_request();
        let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
        assert_eq!(body["data"]["v"], "new");
    }
}

#[actix_web::test]
async fn test_keyword_search_and_enumeration() {
    let app = test_app!();

    let entries = [
        ("A", Some(vec!["swap", "fx"])),
        ("B", Some(vec!["rollover"])),
        ("C", None),
    ];
    for (key, keywords) in entries {
        let req = test::TestRequest::post()
            .uri(&format!("/api/metadata/Assets/Fx/{}", key))
            .set_json(metadata_body(&[("v", "1")], keywords))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    }

    let req = test::TestRequest::get().uri("/api/metadata").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body, json!(["Assets"]));

    let req = test::TestRequest::get().uri("/api/metadata/assets").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body, json!(["Fx"]));

    let req = test::TestRequest::get()
        .uri("/api/metadata/assets/fx?keyword=SWAP")
        .to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["A"]);

    let req = test::TestRequest::get().uri("/api/metadata/assets/fx").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body.as_object().unwrap().len(), 3);
}

#[actix_web::test]
async fn test_find_by_keys_omits_absent_keys() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/metadata/cat/col/Known")
        .set_json(metadata_body(&[("v", "1")], None))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/api/metadata/cat/col/find")
        .set_json(json!(["known", "missing"]))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["Known"]);
}

async fn upsert_locale(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    id: &str,
    is_default: bool,
) -> StatusCode {
    let req = test::TestRequest::post()
        .uri("/api/locales")
        .insert_header(("User-Name", "alice"))
        .insert_header(("Correlation-Id", "it-test"))
        .set_json(json!({ "id": id, "isDefault": is_default }))
        .to_request();
    test::call_service(app, req).await.status()
}

async fn add_value(
    app: &impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    >,
    locale: &str,
    key: &str,
    value: &str,
) -> StatusCode {
    let req = test::TestRequest::post()
        .uri(&format!("/api/localized-values/{}/{}", locale, key))
        .insert_header(("User-Name", "alice"))
        .insert_header(("Correlation-Id", "it-test"))
        .set_json(json!({ "value": value }))
        .to_request();
    test::call_service(app, req).await.status()
}

#[actix_web::test]
async fn test_locale_promotion_gate_and_handoff() {
    let app = test_app!();

    assert_eq!(upsert_locale(&app, "en", true).await, StatusCode::NO_CONTENT);
    assert_eq!(upsert_locale(&app, "fr", false).await, StatusCode::NO_CONTENT);
    assert_eq!(add_value(&app, "en", "k1", "one").await, StatusCode::NO_CONTENT);
    assert_eq!(add_value(&app, "en", "k2", "two").await, StatusCode::NO_CONTENT);
    assert_eq!(add_value(&app, "fr", "k1", "un").await, StatusCode::NO_CONTENT);

    // Promotion is gated on full coverage of the default locale's keys.
    let req = test::TestRequest::post()
        .uri("/api/locales")
        .insert_header(("User-Name", "alice"))
        .set_json(json!({ "id": "fr", "isDefault": true }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errorCode"], "CannotSetLocaleAsDefault");
    assert_eq!(body["missingKeys"], json!(["k2"]));

    assert_eq!(add_value(&app, "fr", "k2", "deux").await, StatusCode::NO_CONTENT);
    assert_eq!(upsert_locale(&app, "fr", true).await, StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri("/api/locales/default").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["id"], "fr");

    // Exactly one default after the handoff.
    let req = test::TestRequest::get().uri("/api/locales").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let defaults = body
        .as_array()
        .unwrap()
        .iter()
        .filter(|l| l["isDefault"] == true)
        .count();
    assert_eq!(defaults, 1);
}

#[actix_web::test]
async fn test_locale_delete_guards() {
    let app = test_app!();

    assert_eq!(upsert_locale(&app, "en", true).await, StatusCode::NO_CONTENT);
    assert_eq!(upsert_locale(&app, "fr", false).await, StatusCode::NO_CONTENT);
    assert_eq!(add_value(&app, "fr", "k1", "un").await, StatusCode::NO_CONTENT);

    let delete = |id: &str| {
        test::TestRequest::delete()
            .uri(&format!("/api/locales/{}", id))
            .insert_header(("User-Name", "alice"))
            .to_request()
    };

    let resp = test::call_service(&app, delete("en")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errorCode"], "CannotDeleteDefaultLocale");

    let resp = test::call_service(&app, delete("fr")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errorCode"], "CannotDeleteLocaleInUse");

    assert_eq!(
        test::call_service(&app, delete("de")).await.status(),
        StatusCode::NOT_FOUND
    );

    // Remove the reference and the delete goes through.
    let req = test::TestRequest::delete()
        .uri("/api/localized-values/fr/k1")
        .insert_header(("User-Name", "alice"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        test::call_service(&app, delete("fr")).await.status(),
        StatusCode::NO_CONTENT
    );
}

#[actix_web::test]
async fn test_localized_value_mutations_require_user_header() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/locales")
        .set_json(json!({ "id": "en", "isDefault": true }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri("/api/localized-values/en/k1")
        .set_json(json!({ "value": "one" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_localized_value_lifecycle_and_catalogue() {
    let app = test_app!();

    assert_eq!(upsert_locale(&app, "en", true).await, StatusCode::NO_CONTENT);
    assert_eq!(upsert_locale(&app, "fr", false).await, StatusCode::NO_CONTENT);

    // Values require an existing locale.
    assert_eq!(add_value(&app, "xx", "k1", "?").await, StatusCode::BAD_REQUEST);

    assert_eq!(add_value(&app, "en", "greeting", "hello").await, StatusCode::NO_CONTENT);
    assert_eq!(add_value(&app, "fr", "greeting", "bonjour").await, StatusCode::NO_CONTENT);
    assert_eq!(add_value(&app, "en", "farewell", "bye").await, StatusCode::NO_CONTENT);

    let req = test::TestRequest::put()
        .uri("/api/localized-values/en/greeting")
        .insert_header(("User-Name", "alice"))
        .set_json(json!({ "value": "hi" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri("/api/localized-values/en/greeting").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["value"], "hi");

    let req = test::TestRequest::get().uri("/api/localized-values/en").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    // Catalogue is grouped by key and paginated over distinct keys.
    let req = test::TestRequest::get().uri("/api/localized-values?skip=0&take=1").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["totalSize"], 2);
    assert_eq!(body["contents"][0]["key"], "farewell");
    assert_eq!(body["contents"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get().uri("/api/localized-values?skip=1&take=1").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["contents"][0]["key"], "greeting");
    assert_eq!(body["contents"][0]["values"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn test_upsert_by_key_reports_partial_failures() {
    let app = test_app!();

    assert_eq!(upsert_locale(&app, "en", true).await, StatusCode::NO_CONTENT);
    assert_eq!(add_value(&app, "en", "greeting", "hello").await, StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/api/localized-values/by-key/greeting")
        .insert_header(("User-Name", "alice"))
        .set_json(json!({ "values": { "en": "hi", "xx": "?" } }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errorCode"], "UpsertPartiallyFailed");
    assert_eq!(body["locales"], json!(["xx"]));

    // The valid locale still took the update.
    let req = test::TestRequest::get().uri("/api/localized-values/en/greeting").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["value"], "hi");
}

#[actix_web::test]
async fn test_audit_trail_covers_localization_mutations() {
    let app = test_app!();

    assert_eq!(upsert_locale(&app, "en", true).await, StatusCode::NO_CONTENT);
    assert_eq!(add_value(&app, "en", "greeting", "hello").await, StatusCode::NO_CONTENT);

    let req = test::TestRequest::put()
        .uri("/api/localized-values/en/greeting")
        .insert_header(("User-Name", "bob"))
        .set_json(json!({ "value": "hi" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get().uri("/api/audit").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["totalSize"], 3);
    // Newest first.
    assert_eq!(body["contents"][0]["eventType"], "Updated");
    assert_eq!(body["contents"][0]["userName"], "bob");
    assert_eq!(body["contents"][0]["dataReference"], "en.greeting");

    let req = test::TestRequest::get().uri("/api/audit?dataType=Locale").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["totalSize"], 1);
    assert_eq!(body["contents"][0]["dataReference"], "en");

    let req = test::TestRequest::get().uri("/api/audit?userName=bob").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["totalSize"], 1);

    let req = test::TestRequest::get().uri("/api/audit?skip=0&take=2").to_request();
    let body: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(body["totalSize"], 3);
    assert_eq!(body["size"], 2);
}
