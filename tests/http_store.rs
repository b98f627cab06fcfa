//! `HttpStore` against the in-process fake API: paths, bodies, headers, and
//! error pass-through.

mod common;

use census_console::config::Config;
use census_console::draft::AddFlow;
use census_console::edit::EditSession;
use census_console::error::ApiError;
use census_console::fields;
use census_console::models::{Credentials, ReferenceCategory, Section};
use census_console::references;
use census_console::store::http::HttpStore;
use census_console::store::SurveyStore;
use serde_json::json;

fn store(api: &common::FakeApi, token: Option<&str>) -> HttpStore {
    HttpStore::new(&Config::with_base_url(api.base_url.clone()), token).unwrap()
}

#[tokio::test]
async fn test_login_returns_token_or_server_message() {
    let api = common::spawn().await;
    let store = store(&api, None);

    let token = store
        .login(&Credentials {
            username: common::USERNAME.into(),
            password: common::PASSWORD.into(),
        })
        .await
        .unwrap();
    assert_eq!(token, common::TOKEN);

    let err = store
        .login(&Credentials {
            username: common::USERNAME.into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid username or password");
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let api = common::spawn().await;
    assert!(store(&api, None).list_records().await.is_err());
    assert!(store(&api, Some(common::TOKEN)).list_records().await.unwrap().is_empty());

    let sent = api.requests_to("GET /api/users");
    assert_eq!(sent[0].auth, None);
    assert_eq!(sent[1].auth.as_deref(), Some("Bearer tok-admin"));
}

#[tokio::test]
async fn test_field_management_wire_format() {
    let api = common::spawn().await;
    let store = store(&api, Some(common::TOKEN));

    let current = fields::load_schema(&store).await;
    let schema = fields::add_field(&store, &current, Section::FamilyMembers, "Education")
        .await
        .unwrap();
    assert_eq!(schema.family_members.last().map(String::as_str), Some("Education"));

    let schema = fields::remove_field(&store, Section::GeneralInfo, "Gotra")
        .await
        .unwrap();
    assert!(!schema.general_info.contains(&"Gotra".to_string()));

    let add = &api.requests_to("POST /api/fields/add")[0];
    assert_eq!(add.body, json!({ "category": "familyMembers", "newFields": ["Education"] }));
    let remove = &api.requests_to("POST /api/fields/remove")[0];
    assert_eq!(remove.body, json!({ "category": "generalInfo", "removeFields": ["Gotra"] }));
    assert_eq!(api.requests_to("GET /api/fields").len(), 3);
}

#[tokio::test]
async fn test_reference_lists_load_and_mutate() {
    let api = common::spawn().await;
    api.seed_ref("wards", "Ward 1");
    api.seed_ref("subcaste", "S1");
    let store = store(&api, Some(common::TOKEN));

    let lists = references::load_all(&store).await;
    assert_eq!(lists.names(ReferenceCategory::Ward), vec!["Ward 1"]);
    assert_eq!(lists.names(ReferenceCategory::SubCaste), vec!["S1"]);
    assert!(lists.names(ReferenceCategory::Tehsil).is_empty());
    assert_eq!(api.requests_to("GET /api/").len(), 7);

    let list = references::add_reference(&store, ReferenceCategory::Tehsil, "Rehli")
        .await
        .unwrap();
    assert_eq!(list.len(), 1);
    let list = references::delete_reference(&store, ReferenceCategory::Tehsil, &list[0].id)
        .await
        .unwrap();
    assert!(list.is_empty());

    let err = store
        .delete_reference(ReferenceCategory::Tehsil, "missing")
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_create_sends_wrapped_general_info_and_count() {
    let api = common::spawn().await;
    let store = store(&api, Some(common::TOKEN));
    let schema = fields::load_schema(&store).await;

    let mut flow = AddFlow::new();
    flow.set_general("Head of Family", "Ram").unwrap();
    flow.set_general("Number of Family Members", "7").unwrap();
    for name in ["A", "B", "C"] {
        let mut dialog = flow.open_member();
        dialog.set("Name", name);
        flow.commit_member(dialog).unwrap();
    }
    flow.preview().unwrap();
    let id = flow.submit(&store, &schema).await.unwrap();
    assert!(id.starts_with('u'));

    let sent = &api.requests_to("POST /api/users/add")[0].body;
    assert_eq!(
        sent["generalInfo"],
        json!([{ "Head of Family": "Ram", "Number of Family Members": 3 }])
    );
    assert_eq!(sent["familyCount"], json!(3));
    assert_eq!(sent["familyMembers"].as_array().map(Vec::len), Some(3));
    assert_eq!(sent["additionalInfo"], json!(""));
}

#[tokio::test]
async fn test_fetch_single_and_batch() {
    let api = common::spawn().await;
    let a = api.seed_user(json!({ "generalInfo": [{}], "familyMembers": [], "additionalInfo": "" }));
    let b = api.seed_user(json!({ "generalInfo": {}, "familyMembers": [], "additionalInfo": null }));
    let store = store(&api, Some(common::TOKEN));

    let one = store.fetch_records(&[a.clone()]).await.unwrap();
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].id, a);

    let both = store.fetch_records(&[a.clone(), b.clone()]).await.unwrap();
    assert_eq!(both.len(), 2);
    assert_eq!(both[1].general_info.len(), 1);
    assert_eq!(api.requests_to(&format!("GET /api/users/{},{}", a, b)).len(), 1);

    let err = store.fetch_records(&["nope".to_string()]).await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(ref m) if m == "User not found"));
}

#[tokio::test]
async fn test_update_round_trip_preserves_untouched_fields() {
    let api = common::spawn().await;
    let original = json!({
        "generalInfo": [{ "Head of Family": "Ram", "Gotra": "Yadav", "Old Field": 12 }],
        "familyMembers": [{ "_id": "m1", "Name": "Sita", "Age": "31" }],
        "additionalInfo": "first visit",
        "createdAt": "2024-01-01T00:00:00.000Z",
        "updatedAt": "2024-01-01T00:00:00.000Z",
        "__v": 3
    });
    let id = api.seed_user(original);
    let before = api.user(&id).unwrap();
    let store = store(&api, Some(common::TOKEN));

    let mut session = EditSession::open(&store, &id).await.unwrap();
    session.set_general("Gotra", "Kashyap");
    session.submit(&store).await.unwrap();

    let put = &api.requests_to("PUT /api/users/update/")[0].body;
    assert_eq!(put["generalInfo"].as_array().map(Vec::len), Some(1));
    assert_eq!(put["__v"], json!(3));

    let after = api.user(&id).unwrap();
    assert_eq!(after["generalInfo"][0]["Gotra"], json!("Kashyap"));
    assert_eq!(after["generalInfo"][0]["Head of Family"], before["generalInfo"][0]["Head of Family"]);
    assert_eq!(after["generalInfo"][0]["Old Field"], json!(12));
    assert_eq!(after["familyMembers"], before["familyMembers"]);
    assert_eq!(after["additionalInfo"], before["additionalInfo"]);
    assert_eq!(after["createdAt"], before["createdAt"]);

    let refetched = EditSession::open(&store, &id).await.unwrap();
    assert_eq!(refetched.record().general_value("Gotra"), "Kashyap");
}

#[tokio::test]
async fn test_bulk_delete_body_and_server_errors() {
    let api = common::spawn().await;
    let a = api.seed_user(json!({ "generalInfo": [{}], "familyMembers": [] }));
    let b = api.seed_user(json!({ "generalInfo": [{}], "familyMembers": [] }));
    let store = store(&api, Some(common::TOKEN));

    store.delete_records(&[a.clone(), b.clone()]).await.unwrap();
    assert_eq!(api.user_count(), 0);
    assert_eq!(api.requests_to("DELETE /api/users")[0].body, json!({ "ids": [a, b] }));

    api.set_fail_users(true);
    let err = store.list_records().await.unwrap_err();
    assert!(matches!(err, ApiError::Server { status: 500, .. }));
    assert_eq!(err.to_string(), "database offline");
}

#[tokio::test]
async fn test_list_keeps_records_carrying_both_ids() {
    let api = common::spawn().await;
    let good = api.seed_user(json!({
        "id": "virtual",
        "generalInfo": [{ "Head of Family": "Ram" }],
        "familyMembers": [{ "Name": "Sita" }]
    }));
    api.seed_user(json!({ "generalInfo": [{}], "familyMembers": "not a list" }));
    let store = store(&api, Some(common::TOKEN));

    let records = store.list_records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, good);
    assert_eq!(records[0].general_value("Head of Family"), "Ram");
    assert_eq!(records[0].extra.get("id"), Some(&json!("virtual")));
}
