use std::sync::Arc;

use sea_orm::ConnectionTrait;

use crate::common::{SAMPLE_CSV, TestApp, UnavailableBlobStore, csv_with_rows, routes};

const PASSWORD: &str = "securepass";

mod submit {
    use super::*;

    #[tokio::test]
    async fn upload_returns_stats_distribution_and_rows() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;

        let res = app.upload_with_token("sample.csv", SAMPLE_CSV, &token).await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["filename"], "sample.csv");
        assert_eq!(res.body["stats"]["total_count"], 3);
        assert_eq!(res.body["stats"]["avg_flowrate"], 20.0);
        assert_eq!(res.body["stats"]["avg_temperature"], 115.0);
        assert_eq!(res.body["distribution"]["Pump"], 2);
        assert_eq!(res.body["distribution"]["Valve"], 1);
        assert_eq!(res.body["rows"].as_array().unwrap().len(), 3);
        assert_eq!(res.body["rows"][1]["equipment_name"], "Valve-1");
        assert_eq!(res.body["rows"][1]["type"], "Valve");
        assert!(res.body["retention_error"].is_null());
        assert!(res.body["created_at"].is_string());
    }

    #[tokio::test]
    async fn upload_stores_summary_records_and_original_file() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;

        let id = app.create_upload(&token, SAMPLE_CSV).await;

        assert_eq!(app.summary_count().await, 1);
        assert_eq!(app.record_count().await, 3);
        assert_eq!(app.blob_count(), 1);

        let key = app.source_key(id).await;
        assert_eq!(key.filename(), "equipment.csv");
        let stored = app.blob_store.get(&key).await.unwrap();
        assert_eq!(stored, SAMPLE_CSV.as_bytes());
    }

    #[tokio::test]
    async fn header_only_file_has_null_averages() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;

        let res = app
            .upload_with_token("empty.csv", csv_with_rows(0), &token)
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["stats"]["total_count"], 0);
        assert!(res.body["stats"]["avg_flowrate"].is_null());
        assert!(res.body["stats"]["avg_pressure"].is_null());
        assert!(res.body["stats"]["avg_temperature"].is_null());
        assert_eq!(res.body["distribution"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn missing_column_is_malformed_and_nothing_is_stored() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        let csv = "Equipment Name,Type,Flowrate,Temperature\nPump-1,Pump,10,110\n";

        let res = app.upload_with_token("bad.csv", csv, &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "MALFORMED_INPUT");
        assert!(res.body["message"].as_str().unwrap().contains("pressure"));
        assert_eq!(app.summary_count().await, 0);
        assert_eq!(app.record_count().await, 0);
        assert_eq!(app.blob_count(), 0);
    }

    #[tokio::test]
    async fn non_numeric_cell_is_malformed() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        let csv = "Equipment Name,Type,Flowrate,Pressure,Temperature\nPump-1,Pump,fast,5,110\n";

        let res = app.upload_with_token("bad.csv", csv, &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "MALFORMED_INPUT");
        assert_eq!(app.summary_count().await, 0);
    }

    #[tokio::test]
    async fn empty_file_is_malformed() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;

        let res = app.upload_with_token("empty.csv", "", &token).await;

        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "MALFORMED_INPUT");
    }

    #[tokio::test]
    async fn request_without_file_field_is_a_validation_error() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        let form = reqwest::multipart::Form::new().text("note", "no file here");

        let res = app
            .client
            .post(app.url(routes::UPLOADS))
            .header("Authorization", format!("Bearer {token}"))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send request");

        let res = crate::common::TestResponse::from_response(res).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn client_path_is_stripped_from_filename() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;

        let res = app
            .upload_with_token(r"C:\data\plant.csv", SAMPLE_CSV, &token)
            .await;

        assert_eq!(res.status, 201, "{}", res.text);
        assert_eq!(res.body["filename"], "plant.csv");
    }

    #[tokio::test]
    async fn upload_requires_authentication() {
        let app = TestApp::spawn().await;
        let part = reqwest::multipart::Part::bytes(SAMPLE_CSV.as_bytes().to_vec())
            .file_name("sample.csv");
        let form = reqwest::multipart::Form::new().part("file", part);

        let res = app
            .client
            .post(app.url(routes::UPLOADS))
            .multipart(form)
            .send()
            .await
            .expect("Failed to send request");

        let res = crate::common::TestResponse::from_response(res).await;
        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
        assert_eq!(app.summary_count().await, 0);
    }

    #[tokio::test]
    async fn storage_failure_is_a_persistence_error_and_nothing_is_stored() {
        let app = TestApp::spawn_with_blob_store(Arc::new(UnavailableBlobStore)).await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;

        let res = app.upload_with_token("sample.csv", SAMPLE_CSV, &token).await;

        assert_eq!(res.status, 503);
        assert_eq!(res.body["code"], "PERSISTENCE_ERROR");
        assert_eq!(app.summary_count().await, 0);
        assert_eq!(app.record_count().await, 0);
    }
}

mod history {
    use super::*;

    #[tokio::test]
    async fn history_is_most_recent_first() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        let first = app.create_upload(&token, SAMPLE_CSV).await;
        let second = app.create_upload(&token, &csv_with_rows(2)).await;

        let res = app.get_with_token(routes::HISTORY, &token).await;

        assert_eq!(res.status, 200);
        let uploads = res.body["uploads"].as_array().unwrap();
        let ids: Vec<_> = uploads.iter().map(|u| u["id"].as_i64().unwrap()).collect();
        assert_eq!(ids, [second, first]);
        assert_eq!(uploads[0]["count"], 2);
        assert_eq!(uploads[1]["count"], 3);
        assert_eq!(uploads[1]["avg_flowrate"], 20.0);
        assert_eq!(uploads[1]["filename"], "equipment.csv");
        // "%Y-%m-%d %I:%M %p"
        let date = uploads[0]["date"].as_str().unwrap();
        assert_eq!(date.len(), "2025-01-31 02:45 PM".len());
        assert!(date.ends_with("AM") || date.ends_with("PM"));
    }

    #[tokio::test]
    async fn sixth_upload_evicts_the_oldest() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        let mut ids = Vec::new();
        let mut oldest_key = None;
        for n in 1..=6 {
            ids.push(app.create_upload(&token, &csv_with_rows(n)).await);
            if n == 1 {
                oldest_key = Some(app.source_key(ids[0]).await);
            }
        }
        let oldest_key = oldest_key.unwrap();
        let kept_key = app.source_key(ids[1]).await;

        let res = app.get_with_token(routes::HISTORY, &token).await;

        let listed: Vec<_> = res.body["uploads"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_i64().unwrap())
            .collect();
        let expected: Vec<_> = ids[1..].iter().rev().copied().collect();
        assert_eq!(listed, expected);

        // Uploads 2..=6 carry 2 + 3 + 4 + 5 + 6 records.
        assert_eq!(app.summary_count().await, 5);
        assert_eq!(app.record_count().await, 20);
        assert_eq!(app.blob_count(), 5);
        assert!(!app.blob_store.exists(&oldest_key).await.unwrap());
        assert!(app.blob_store.exists(&kept_key).await.unwrap());

        let evicted = app
            .get_with_token(&routes::report(ids[0]), &token)
            .await;
        assert_eq!(evicted.status, 404);
    }

    #[tokio::test]
    async fn failed_trim_keeps_the_upload_and_retries_next_time() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        for n in 1..=5 {
            app.create_upload(&token, &csv_with_rows(n)).await;
        }

        app.db
            .execute_unprepared(
                "CREATE TRIGGER block_record_delete BEFORE DELETE ON equipment_record \
                 BEGIN SELECT RAISE(ABORT, 'record delete blocked'); END",
            )
            .await
            .unwrap();

        let res = app.upload_with_token("sixth.csv", SAMPLE_CSV, &token).await;

        assert_eq!(res.status, 201);
        assert!(res.body["retention_error"].is_string());
        let sixth = res.id();
        assert_eq!(app.summary_count().await, 6);
        assert_eq!(app.blob_count(), 6);

        app.db
            .execute_unprepared("DROP TRIGGER block_record_delete")
            .await
            .unwrap();

        let res = app.upload_with_token("seventh.csv", SAMPLE_CSV, &token).await;

        assert_eq!(res.status, 201);
        assert!(res.body["retention_error"].is_null());
        assert_eq!(app.summary_count().await, 5);
        assert_eq!(app.blob_count(), 5);

        let history = app.get_with_token(routes::HISTORY, &token).await;
        let listed: Vec<_> = history.body["uploads"]
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_i64().unwrap())
            .collect();
        assert_eq!(listed.len(), 5);
        assert_eq!(listed[0], res.id());
        assert_eq!(listed[1], sixth);
    }

    #[tokio::test]
    async fn each_user_sees_only_their_own_history() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", PASSWORD).await;
        let bob = app.create_authenticated_user("bob", PASSWORD).await;
        for _ in 0..5 {
            app.create_upload(&alice, SAMPLE_CSV).await;
        }
        let bobs = app.create_upload(&bob, SAMPLE_CSV).await;

        let alice_history = app.get_with_token(routes::HISTORY, &alice).await;
        let bob_history = app.get_with_token(routes::HISTORY, &bob).await;

        assert_eq!(alice_history.body["uploads"].as_array().unwrap().len(), 5);
        let bob_uploads = bob_history.body["uploads"].as_array().unwrap();
        assert_eq!(bob_uploads.len(), 1);
        assert_eq!(bob_uploads[0]["id"], bobs);
        // Bob's upload did not push one of Alice's out.
        assert_eq!(app.summary_count().await, 6);
    }

    #[tokio::test]
    async fn new_user_has_empty_history() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;

        let res = app.get_with_token(routes::HISTORY, &token).await;

        assert_eq!(res.status, 200);
        assert_eq!(res.body["uploads"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn history_requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(routes::HISTORY).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod report {
    use super::*;

    async fn fetch_pdf(app: &TestApp, id: i64, token: &str) -> Vec<u8> {
        let res = app.get_raw_with_token(&routes::report(id), token).await;
        assert_eq!(res.status().as_u16(), 200);
        assert_eq!(res.headers()["content-type"], "application/pdf");
        assert_eq!(
            res.headers()["content-disposition"],
            format!("attachment; filename=\"report_{id}.pdf\"").as_str()
        );
        res.bytes().await.unwrap().to_vec()
    }

    #[tokio::test]
    async fn owner_can_download_a_pdf_report() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        let id = app.create_upload(&token, SAMPLE_CSV).await;

        let pdf = fetch_pdf(&app, id, &token).await;

        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn report_is_stable_across_requests() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        let id = app.create_upload(&token, &csv_with_rows(12)).await;

        let first = fetch_pdf(&app, id, &token).await;
        let second = fetch_pdf(&app, id, &token).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn report_of_empty_upload_renders() {
        let app = TestApp::spawn().await;
        let token = app.create_authenticated_user("plant_eng", PASSWORD).await;
        let id = app.create_upload(&token, &csv_with_rows(0)).await;

        let pdf = fetch_pdf(&app, id, &token).await;

        assert!(pdf.starts_with(b"%PDF-"));
    }

    #[tokio::test]
    async fn foreign_upload_is_not_found() {
        let app = TestApp::spawn().await;
        let alice = app.create_authenticated_user("alice", PASSWORD).await;
        let bob = app.create_authenticated_user("bob", PASSWORD).await;
        let id = app.create_upload(&alice, SAMPLE_CSV).await;

        let foreign = app.get_with_token(&routes::report(id), &bob).await;
        let missing = app.get_with_token(&routes::report(id + 1000), &bob).await;

        assert_eq!(foreign.status, 404);
        assert_eq!(foreign.body["code"], "NOT_FOUND");
        // Indistinguishable from an id that never existed.
        assert_eq!(foreign.body, missing.body);
    }

    #[tokio::test]
    async fn report_requires_authentication() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token(&routes::report(1)).await;

        assert_eq!(res.status, 401);
        assert_eq!(res.body["code"], "TOKEN_MISSING");
    }
}

mod api_docs {
    use super::*;

    #[tokio::test]
    async fn openapi_document_lists_upload_routes() {
        let app = TestApp::spawn().await;

        let res = app.get_without_token("/api-docs/openapi.json").await;

        assert_eq!(res.status, 200);
        let paths = &res.body["paths"];
        assert!(paths["/api/v1/uploads"]["post"].is_object());
        assert!(paths["/api/v1/uploads/history"]["get"].is_object());
        assert!(paths["/api/v1/uploads/{id}/report"]["get"].is_object());
    }
}
