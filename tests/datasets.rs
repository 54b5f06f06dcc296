//! Dataset item reads against a wiremock server.

use apify_actor_node::{testing::test_client, ListItemsOptions, OutputMode};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn list_items_passes_query_options() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/datasets/ds_1/items"))
        .and(query_param("format", "json"))
        .and(query_param("offset", "10"))
        .and(query_param("limit", "5"))
        .and(query_param("clean", "true"))
        .and(query_param("fields", "title,url"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "title": "T", "url": "u" }])))
        .expect(1)
        .mount(&server)
        .await;

    let options = ListItemsOptions {
        offset: Some(10),
        limit: Some(5),
        clean: true,
        fields: vec!["title".into(), "url".into()],
    };
    let items = test_client(&server.uri())
        .datasets()
        .list_items("ds_1", &options)
        .await
        .expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].get("title"), Some(&json!("T")));
}

#[tokio::test]
async fn list_all_items_stops_on_short_page() {
    let server = MockServer::start().await;

    let page = |range: std::ops::Range<u32>| -> Value {
        Value::Array(range.map(|n| json!({ "n": n })).collect())
    };

    Mock::given(method("GET"))
        .and(path("/v2/datasets/ds_1/items"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(0..2)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/datasets/ds_1/items"))
        .and(query_param("offset", "2"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(2..4)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/datasets/ds_1/items"))
        .and(query_param("offset", "4"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(4..5)))
        .expect(1)
        .mount(&server)
        .await;

    let items = test_client(&server.uri())
        .datasets()
        .list_all_items("ds_1", Some(2))
        .await
        .expect("items");
    let ns: Vec<&Value> = items.iter().filter_map(|i| i.get("n")).collect();
    assert_eq!(ns, vec![&json!(0), &json!(1), &json!(2), &json!(3), &json!(4)]);
}

#[tokio::test]
async fn default_page_size_is_999() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/datasets/ds_1/items"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "999"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "markdown": "a", "other": 1 }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let items = test_client(&server.uri())
        .datasets()
        .list_all_items("ds_1", None)
        .await
        .expect("items");
    let reduced = OutputMode::markdown().project_all(items);
    assert_eq!(Value::Object(reduced[0].clone()), json!({ "markdown": "a" }));
}
