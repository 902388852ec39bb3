//! List service behavior over a mock REST endpoint: envelope handling,
//! query composition, pagination, partial updates and batch accounting.

mod common;

use common::{client_for, fast_retry, mount_token_endpoint};
use serde::Deserialize;
use serde_json::json;
use sharepoint_client::{ItemUpdate, ListService, QueryOptions};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize)]
struct Job {
    #[serde(rename = "Id")]
    id: u32,
    #[serde(rename = "Title")]
    title: String,
}

fn jobs(server: &wiremock::MockServer) -> ListService {
    ListService::new(client_for(server, fast_retry()), "Jobs")
}

#[tokio::test]
async fn items_are_unwrapped_and_decoded() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "d": {"results": [
                {"Id": 1, "Title": "JOB-001"},
                {"Id": 2, "Title": "JOB-002"}
            ]}
        })))
        .mount(&server)
        .await;

    let items: Vec<Job> = jobs(&server).get_items(None).await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, 1);
    assert_eq!(items[1].title, "JOB-002");
}

#[tokio::test]
async fn empty_result_set_yields_empty_vec() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"d": {"results": []}})),
        )
        .mount(&server)
        .await;

    let items: Vec<Job> = jobs(&server).get_items(None).await.unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn query_options_become_odata_parameters() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items"))
        .and(query_param("$select", "Id,Title"))
        .and(query_param("$filter", "Status eq 'Pending'"))
        .and(query_param("$orderby", "JobDate desc"))
        .and(query_param("$top", "10"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"d": {"results": []}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = QueryOptions::new()
        .select(["Id", "Title"])
        .filter("Status eq 'Pending'")
        .order_by("JobDate")
        .descending()
        .top(10);
    let _: Vec<Job> = jobs(&server).get_items(Some(&options)).await.unwrap();
}

#[tokio::test]
async fn pagination_probes_one_past_the_page() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // Page size 20 probes with $top=21; return the full probe.
    let full_page: Vec<_> = (1..=21)
        .map(|i| json!({"Id": i, "Title": format!("JOB-{i:03}")}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items"))
        .and(query_param("$top", "21"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"d": {"results": full_page}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = QueryOptions::new().top(20);
    let page = jobs(&server)
        .get_items_paginated::<Job>(Some(&options))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 20);
    assert!(page.has_more);
    assert_eq!(page.next_skip, Some(20));
}

#[tokio::test]
async fn short_page_reports_no_more_items() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    let short_page: Vec<_> = (1..=15).map(|i| json!({"Id": i, "Title": "x"})).collect();
    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items"))
        .and(query_param("$top", "21"))
        .and(query_param("$skip", "40"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"d": {"results": short_page}})),
        )
        .mount(&server)
        .await;

    let options = QueryOptions::new().top(20).skip(40);
    let page = jobs(&server)
        .get_items_paginated::<Job>(Some(&options))
        .await
        .unwrap();

    assert_eq!(page.items.len(), 15);
    assert!(!page.has_more);
    assert_eq!(page.next_skip, None);
}

#[tokio::test]
async fn create_stamps_the_list_item_type() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items"))
        .and(body_partial_json(json!({
            "Title": "JOB-100",
            "__metadata": {"type": "SP.Data.JobsListItem"}
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "d": {"Id": 100, "Title": "JOB-100"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let created: Job = jobs(&server)
        .create_item(json!({"Title": "JOB-100"}))
        .await
        .unwrap();
    assert_eq!(created.id, 100);
}

#[tokio::test]
async fn update_sends_merge_headers_and_only_supplied_fields() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items(7)"))
        .and(header("IF-MATCH", "*"))
        .and(header("X-HTTP-Method", "MERGE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    jobs(&server)
        .update_item(7, json!({"Status": "Complete"}))
        .await
        .unwrap();

    // Partial-update semantics: the body carries exactly the supplied field
    // plus the type stamp.
    let requests = server.received_requests().await.unwrap();
    let update = requests
        .iter()
        .find(|r| r.url.path().ends_with("/items(7)"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&update.body).unwrap();
    let fields = body.as_object().unwrap();
    assert_eq!(fields.len(), 2);
    assert_eq!(fields["Status"], "Complete");
    assert!(fields.contains_key("__metadata"));
}

#[tokio::test]
async fn delete_sends_if_match_any() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("DELETE"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items(7)"))
        .and(header("IF-MATCH", "*"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    jobs(&server).delete_item(7).await.unwrap();
}

#[tokio::test]
async fn batch_create_collects_indexed_failures() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    // The failing item is matched first; everything else succeeds.
    Mock::given(method("POST"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items"))
        .and(body_partial_json(json!({"Title": "B"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "FIELD_VALIDATION", "message": {"value": "Title B is invalid"}}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items"))
        .respond_with(
            ResponseTemplate::new(201).set_body_json(json!({"d": {"Id": 1, "Title": "ok"}})),
        )
        .mount(&server)
        .await;

    let batch = jobs(&server)
        .batch_create::<Job>(vec![
            json!({"Title": "A"}),
            json!({"Title": "B"}),
            json!({"Title": "C"}),
        ])
        .await;

    assert!(!batch.success);
    assert_eq!(batch.results.len(), 2);
    assert_eq!(batch.errors.len(), 1);
    assert_eq!(batch.errors[0].index, 1);
    assert_eq!(batch.errors[0].status_code, Some(400));
    assert!(batch.errors[0].error.contains("Title B is invalid"));
}

#[tokio::test]
async fn batch_update_reports_succeeded_ids() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("POST"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items(2)"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "NOT_FOUND", "message": {"value": "Item does not exist."}}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items(1)"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let batch = jobs(&server)
        .batch_update(vec![
            ItemUpdate { id: 1, data: json!({"Status": "Done"}) },
            ItemUpdate { id: 2, data: json!({"Status": "Done"}) },
        ])
        .await;

    assert!(!batch.success);
    assert_eq!(batch.results, vec![1]);
    assert_eq!(batch.errors[0].index, 1);
    assert_eq!(batch.errors[0].status_code, Some(404));
}

#[tokio::test]
async fn item_exists_distinguishes_absence_from_outage() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items(1)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"d": {"Id": 1}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items(2)"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items(3)"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let service = jobs(&server);
    assert!(service.item_exists(1).await.unwrap());
    assert!(!service.item_exists(2).await.unwrap());

    let err = service.item_exists(3).await.unwrap_err();
    assert_eq!(err.status_code, Some(500));
}

#[tokio::test]
async fn item_count_parses_the_plain_text_body() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server).await;

    Mock::given(method("GET"))
        .and(path("/_api/web/lists/getbytitle('Jobs')/items/$count"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/plain")
                .set_body_string("42"),
        )
        .mount(&server)
        .await;

    let count = jobs(&server).get_item_count(None).await.unwrap();
    assert_eq!(count, 42);
}
