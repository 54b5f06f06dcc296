//! Actor, build and run-creation endpoints against a wiremock server.

use std::time::Duration;

use apify_actor_node::{
    testing::{test_client, test_client_with_app_id},
    Client, Config, Credentials, Error, RetryConfig, RunRequest, RunStatus, StartRunOptions,
};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(value: Value) -> RunRequest {
    match value {
        Value::Object(map) => RunRequest::from(map),
        other => panic!("expected object, got {other}"),
    }
}

fn retrying_client(server: &MockServer) -> Client {
    Client::new(Config {
        base_url: Some(server.uri()),
        credentials: Credentials::api_token("apify_api_test").expect("token"),
        retry: Some(RetryConfig {
            max_attempts: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            retry_post: true,
        }),
        ..Default::default()
    })
    .expect("client")
}

#[tokio::test]
async fn start_run_posts_input_with_integration_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/acts/apify~web-scraper/runs"))
        .and(query_param("waitForFinish", "0"))
        .and(header("authorization", "Bearer apify_api_test"))
        .and(header("x-apify-integration-platform", "n8n"))
        .and(header("x-apify-integration-app-id", "web-scraper-app"))
        .and(body_json(json!({ "categoryUrls": [{ "url": "http://x" }] })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {
                "id": "run_1",
                "actId": "act_1",
                "status": "READY",
                "defaultDatasetId": "ds_1"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client_with_app_id(&server.uri(), "web-scraper-app");
    let run = client
        .actors()
        .start_run(
            "apify/web-scraper",
            &request(json!({ "categoryUrls": [{ "url": "http://x" }] })),
            &StartRunOptions::default(),
        )
        .await
        .expect("run should start");

    assert_eq!(run.id, "run_1");
    assert_eq!(run.status, RunStatus::Ready);
    assert_eq!(run.default_dataset_id.as_deref(), Some("ds_1"));
}

#[tokio::test]
async fn start_run_without_id_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/acts/act_1/runs"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "data": { "status": "READY" } })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .actors()
        .start_run("act_1", &RunRequest::new(), &StartRunOptions::default())
        .await
        .expect_err("missing id must fail");

    match err {
        Error::MissingField { field, context } => {
            assert_eq!(field, "data.id");
            assert!(context.contains("act_1"), "{context}");
        }
        other => panic!("expected missing field error, got {other:?}"),
    }
}

#[tokio::test]
async fn start_run_is_sent_once_even_when_retries_are_enabled() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/acts/act_1/runs"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "type": "internal-error", "message": "boom" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = retrying_client(&server);
    let err = client
        .actors()
        .start_run("act_1", &RunRequest::new(), &StartRunOptions::default())
        .await
        .expect_err("500 must fail");

    assert_eq!(err.status(), Some(500));
    let msg = err.to_string();
    assert!(msg.contains("internal-error"), "{msg}");
    assert!(msg.contains("POST /v2/acts/act_1/runs"), "{msg}");
}

#[tokio::test]
async fn reads_are_retried_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/act_1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/acts/act_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "act_1", "name": "web-scraper" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let actor = retrying_client(&server)
        .actors()
        .get("act_1")
        .await
        .expect("second attempt should succeed");
    assert_eq!(actor.name, "web-scraper");
}

#[tokio::test]
async fn start_options_become_query_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v2/acts/act_1/runs"))
        .and(query_param("waitForFinish", "60"))
        .and(query_param("build", "beta"))
        .and(query_param("timeout", "300"))
        .and(query_param("memory", "1024"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": { "id": "run_2", "status": "SUCCEEDED" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let options = StartRunOptions {
        wait_for_finish: 60,
        build: Some("beta".into()),
        timeout_secs: Some(300),
        memory_mbytes: Some(1024),
    };
    let run = test_client(&server.uri())
        .actors()
        .start_run("act_1", &RunRequest::new(), &options)
        .await
        .expect("run should start");
    assert!(run.status.is_terminal());
}

#[tokio::test]
async fn generator_resolves_default_build_schema() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/apify~web-scraper"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "act_1",
                "name": "web-scraper",
                "taggedBuilds": { "latest": { "buildId": "build_9", "buildNumber": "0.3.1" } }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/actor-builds/build_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "build_9",
                "actorDefinition": {
                    "input": {
                        "title": "Input",
                        "properties": {
                            "startUrls": { "type": "array", "title": "Start URLs", "editor": "requestListSources" }
                        },
                        "required": ["startUrls"]
                    }
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let actor = client.actors().get("apify/web-scraper").await.expect("actor");
    let build_id = actor.default_build_id().expect("build id").to_string();
    let build = client.actors().get_build(&build_id).await.expect("build");
    let mapped = apify_actor_node::map_schema(build.input_schema().expect("schema"));

    assert!(mapped.warnings.is_empty());
    assert_eq!(mapped.fields.len(), 1);
    assert_eq!(mapped.fields[0].name, "startUrls");
    assert!(mapped.fields[0].required);
    assert!(mapped.fields[0].collection().is_some());
}

#[tokio::test]
async fn build_by_tag_without_data_names_the_actor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/act_1/builds/default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let err = test_client(&server.uri())
        .actors()
        .get_build_by_tag("act_1", "default")
        .await
        .expect_err("empty envelope must fail");
    let msg = err.to_string();
    assert!(msg.contains("act_1"), "{msg}");
    assert!(msg.contains("default"), "{msg}");
}

#[tokio::test]
async fn list_all_runs_pages_through_offsets() {
    let server = MockServer::start().await;

    let page = |ids: &[&str], offset: u64| {
        let items: Vec<Value> = ids
            .iter()
            .map(|id| json!({ "id": id, "status": "SUCCEEDED" }))
            .collect();
        json!({ "data": { "total": 3, "offset": offset, "limit": 2, "count": items.len(), "items": items } })
    };

    Mock::given(method("GET"))
        .and(path("/v2/acts/act_1/runs"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["r1", "r2"], 0)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/acts/act_1/runs"))
        .and(query_param("offset", "2"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(&["r3"], 2)))
        .expect(1)
        .mount(&server)
        .await;

    let runs = test_client(&server.uri())
        .actors()
        .list_all_runs("act_1", Some(2))
        .await
        .expect("listing should succeed");
    let ids: Vec<&str> = runs.items.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r1", "r2", "r3"]);
    assert_eq!(runs.total, 3);
    assert_eq!(runs.count, 3);
}

#[tokio::test]
async fn reserved_characters_in_actor_ids_stay_in_the_path() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/acts/team~my%20actor%3Fv%3D1%23top"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "id": "act_7", "name": "my actor" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let actor = test_client(&server.uri())
        .actors()
        .get("team/my actor?v=1#top")
        .await
        .expect("escaped id should resolve");
    assert_eq!(actor.id, "act_7");
}
