use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use datalens_navigator::{
    ColumnConfig, ColumnType, DataLens, DataLensLayer, DataSourceCredentials, DatabaseError,
    DatabaseProvider, InMemoryCatalog, RenderedQuery, ResolvedConnection, TableConfig,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// What the stub database saw
#[derive(Default)]
struct Recorded {
    queries: Vec<RenderedQuery>,
    sources: Vec<Option<DataSourceCredentials>>,
}

impl Recorded {
    fn data_queries(&self) -> Vec<&RenderedQuery> {
        self.queries
            .iter()
            .filter(|query| !query.sql.starts_with("SELECT COUNT(*)"))
            .collect()
    }

    fn count_queries(&self) -> Vec<&RenderedQuery> {
        self.queries
            .iter()
            .filter(|query| query.sql.starts_with("SELECT COUNT(*)"))
            .collect()
    }
}

#[derive(Default)]
struct StubDatabase {
    rows: Vec<Value>,
    count: u64,
    failure: Option<String>,
    recorded: Arc<Mutex<Recorded>>,
}

#[async_trait]
impl DatabaseProvider for StubDatabase {
    type Connection = ();

    async fn resolve(
        &self,
        source: Option<&DataSourceCredentials>,
    ) -> Result<ResolvedConnection<()>, DatabaseError> {
        self.recorded.lock().unwrap().sources.push(source.cloned());
        Ok(ResolvedConnection {
            connection: (),
            schema: "public".to_string(),
        })
    }

    async fn fetch_rows(&self, _: &(), query: &RenderedQuery) -> Result<Vec<Value>, DatabaseError> {
        self.recorded.lock().unwrap().queries.push(query.clone());
        match &self.failure {
            Some(message) => Err(DatabaseError::Query(message.clone())),
            None => Ok(self.rows.clone()),
        }
    }

    async fn fetch_count(&self, _: &(), query: &RenderedQuery) -> Result<u64, DatabaseError> {
        self.recorded.lock().unwrap().queries.push(query.clone());
        match &self.failure {
            Some(message) => Err(DatabaseError::Query(message.clone())),
            None => Ok(self.count),
        }
    }

    async fn test_connection(&self, source: &DataSourceCredentials) -> Result<(), DatabaseError> {
        if source.jdbc_url.starts_with("jdbc:postgresql://") {
            Ok(())
        } else {
            Err(DatabaseError::InvalidDataSource(format!("unsupported url {}", source.jdbc_url)))
        }
    }
}

fn orders_table() -> TableConfig {
    TableConfig {
        name: "orders".to_string(),
        sort_column: "id".to_string(),
        key_column: "id".to_string(),
        columns: vec![
            ColumnConfig::new("id", ColumnType::Number),
            ColumnConfig::new("customer", ColumnType::Text),
            ColumnConfig::new("is_paid", ColumnType::Boolean),
            ColumnConfig::new("created_at", ColumnType::Datetime),
        ],
    }
}

/// Keyed by a column the lens does not display
fn events_table() -> TableConfig {
    TableConfig {
        name: "events".to_string(),
        sort_column: "seq".to_string(),
        key_column: "seq".to_string(),
        columns: vec![ColumnConfig::new("label", ColumnType::Text)],
    }
}

fn warehouse() -> DataSourceCredentials {
    DataSourceCredentials {
        jdbc_url: "jdbc:postgresql://warehouse:5432/analytics".to_string(),
        username: "reader".to_string(),
        password: "secret".to_string(),
    }
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_lens(DataLens {
            id: "sales".to_string(),
            datasource_id: None,
            tables: vec![orders_table(), events_table()],
        })
        .with_lens(DataLens {
            id: "warehouse-sales".to_string(),
            datasource_id: Some("warehouse".to_string()),
            tables: vec![orders_table()],
        })
        .with_data_source("warehouse", warehouse())
}

fn app(database: StubDatabase) -> Router {
    DataLensLayer::new("/datalens", database, catalog()).into_router()
}

fn order_rows(ids: &[i64]) -> Vec<Value> {
    ids.iter()
        .map(|id| {
            json!({
                "id": id,
                "customer": format!("customer-{}", id),
                "is_paid": id % 2 == 0,
                "created_at": "2024-03-01T10:00:00.000Z"
            })
        })
        .collect()
}

fn get(path: &str, params: &[(&str, &str)]) -> Request<Body> {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    Request::builder()
        .uri(format!("/datalens/api{}?{}", path, query))
        .body(Body::empty())
        .unwrap()
}

fn post_json(path: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/datalens/api{}", path))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn missing_table_is_a_bad_request() {
    let (status, body) = send(app(StubDatabase::default()), get("/data", &[("datalensId", "sales")])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Table is required" }));
}

#[tokio::test]
async fn missing_lens_id_is_a_bad_request() {
    let (status, body) = send(app(StubDatabase::default()), get("/data", &[("table", "orders")])).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "DataLens ID is required");
}

#[tokio::test]
async fn unknown_lens_and_table_are_not_found() {
    let (status, body) = send(
        app(StubDatabase::default()),
        get("/data", &[("table", "orders"), ("datalensId", "nope")]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "DataLens configuration not found");

    let (status, body) = send(
        app(StubDatabase::default()),
        get("/data", &[("table", "invoices"), ("datalensId", "sales")]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Table not found in DataLens configuration");
}

#[tokio::test]
async fn full_page_reports_more_rows_and_cursor() {
    let database = StubDatabase {
        rows: order_rows(&[1, 2]),
        count: 5,
        ..Default::default()
    };

    let (status, body) = send(
        app(database),
        get("/data", &[("table", "orders"), ("datalensId", "sales"), ("pageSize", "2")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasMore"], true);
    assert_eq!(body["lastKey"], "2");
    assert_eq!(body["totalCount"], 5);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let sql = body["query"]["sql"].as_str().unwrap();
    assert!(sql.starts_with("SELECT id, customer, is_paid, to_char(created_at, "), "{}", sql);
    assert!(sql.contains(" FROM public.orders ORDER BY id::numeric ASC, customer::text ASC"), "{}", sql);
    assert!(sql.ends_with(" LIMIT $1::bigint"), "{}", sql);
    assert_eq!(body["query"]["params"], json!([2]));
}

#[tokio::test]
async fn hidden_sort_column_feeds_the_cursor_but_not_the_rows() {
    let database = StubDatabase {
        rows: vec![json!({ "label": "a", "seq": 1 }), json!({ "label": "b", "seq": 2 })],
        count: 3,
        ..Default::default()
    };

    let (status, body) = send(
        app(database),
        get("/data", &[("table", "events"), ("datalensId", "sales"), ("pageSize", "2")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasMore"], true);
    assert_eq!(body["lastKey"], "2");
    assert_eq!(body["data"], json!([{ "label": "a" }, { "label": "b" }]));
    assert_eq!(
        body["query"]["sql"],
        "SELECT label, seq FROM public.events ORDER BY seq::text ASC, label::text ASC LIMIT $1::bigint"
    );
}

#[tokio::test]
async fn short_page_has_no_more_rows() {
    let database = StubDatabase {
        rows: order_rows(&[7]),
        count: 1,
        ..Default::default()
    };

    let (status, body) = send(
        app(database),
        get("/data", &[("table", "orders"), ("datalensId", "sales"), ("pageSize", "2")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["hasMore"], false);
    assert_eq!(body["lastKey"], "7");
    assert_eq!(body["totalCount"], 1);
}

#[tokio::test]
async fn empty_result_has_no_cursor() {
    let (status, body) = send(
        app(StubDatabase::default()),
        get("/data", &[("table", "orders"), ("datalensId", "sales")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["hasMore"], false);
    assert_eq!(body["lastKey"], Value::Null);
    assert_eq!(body["totalCount"], 0);
}

#[tokio::test]
async fn cursor_narrows_the_page_but_not_the_count() {
    let database = StubDatabase {
        rows: order_rows(&[3, 4]),
        count: 5,
        ..Default::default()
    };
    let recorded = database.recorded.clone();
    let router = app(database);

    let first = get("/data", &[("table", "orders"), ("datalensId", "sales"), ("pageSize", "2")]);
    let (status, _) = send(router.clone(), first).await;
    assert_eq!(status, StatusCode::OK);

    let second = get(
        "/data",
        &[("table", "orders"), ("datalensId", "sales"), ("pageSize", "2"), ("lastKey", "2")],
    );
    let (status, body) = send(router, second).await;
    assert_eq!(status, StatusCode::OK);

    let sql = body["query"]["sql"].as_str().unwrap();
    assert!(sql.contains(" WHERE id::numeric > $1::numeric ORDER BY "), "{}", sql);
    assert!(sql.ends_with(" LIMIT $2::bigint"), "{}", sql);
    assert_eq!(body["query"]["params"], json!([2, 2]));

    let recorded = recorded.lock().unwrap();
    let counts = recorded.count_queries();
    assert_eq!(counts.len(), 2);
    assert_eq!(counts[0], counts[1]);
    assert_eq!(counts[0].sql, "SELECT COUNT(*) as total FROM public.orders");
    assert!(counts[0].params.is_empty());
}

#[tokio::test]
async fn descending_cursor_compares_downwards() {
    let (status, body) = send(
        app(StubDatabase::default()),
        get(
            "/data",
            &[
                ("table", "orders"),
                ("datalensId", "sales"),
                ("sortDirection", "desc"),
                ("lastKey", "10"),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let sql = body["query"]["sql"].as_str().unwrap();
    assert!(sql.contains(" WHERE id::numeric < $1::numeric ORDER BY id::numeric DESC, "), "{}", sql);
}

#[tokio::test]
async fn undefined_cursor_is_ignored() {
    let (status, body) = send(
        app(StubDatabase::default()),
        get("/data", &[("table", "orders"), ("datalensId", "sales"), ("lastKey", "undefined")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!body["query"]["sql"].as_str().unwrap().contains("WHERE"));
    assert_eq!(body["query"]["params"], json!([100]));
}

#[tokio::test]
async fn boolean_filter_binds_a_boolean() {
    let database = StubDatabase::default();
    let recorded = database.recorded.clone();

    let (status, body) = send(
        app(database),
        get(
            "/data",
            &[
                ("table", "orders"),
                ("datalensId", "sales"),
                ("filters", r#"{"is_paid":["true"]}"#),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let sql = body["query"]["sql"].as_str().unwrap();
    assert!(sql.contains(" WHERE CAST(is_paid AS bool) = $1::bool ORDER BY "), "{}", sql);
    assert_eq!(body["query"]["params"], json!([true, 100]));

    let recorded = recorded.lock().unwrap();
    let count = recorded.count_queries()[0];
    assert_eq!(count.sql, "SELECT COUNT(*) as total FROM public.orders WHERE CAST(is_paid AS bool) = $1::bool");
}

#[tokio::test]
async fn filters_on_unconfigured_columns_are_dropped() {
    let (status, body) = send(
        app(StubDatabase::default()),
        get(
            "/data",
            &[
                ("table", "orders"),
                ("datalensId", "sales"),
                ("filters", r#"{"password_hash":["x"],"customer":["acme","globex"]}"#),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let sql = body["query"]["sql"].as_str().unwrap();
    assert!(sql.contains(" WHERE customer IN ($1, $2) ORDER BY "), "{}", sql);
    assert!(!sql.contains("password_hash"));
    assert_eq!(body["query"]["params"], json!(["acme", "globex", 100]));
}

#[tokio::test]
async fn malformed_parameters_are_bad_requests() {
    let cases: [&[(&str, &str)]; 4] = [
        &[("table", "orders"), ("datalensId", "sales"), ("sortDirection", "sideways")],
        &[("table", "orders"), ("datalensId", "sales"), ("filters", "{not json")],
        &[("table", "orders"), ("datalensId", "sales"), ("pageSize", "0")],
        &[("table", "orders"), ("datalensId", "sales"), ("lastKey", "abc")],
    ];

    for params in cases {
        let (status, body) = send(app(StubDatabase::default()), get("/data", params)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{:?}", params);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn database_failures_surface_the_driver_message() {
    let database = StubDatabase {
        failure: Some("relation \"public.orders\" does not exist".to_string()),
        ..Default::default()
    };

    let (status, body) = send(
        app(database),
        get("/data", &[("table", "orders"), ("datalensId", "sales")]),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "relation \"public.orders\" does not exist" }));
}

#[tokio::test]
async fn lens_data_source_is_used_unless_overridden() {
    let database = StubDatabase::default();
    let recorded = database.recorded.clone();
    let router = app(database);

    let (status, _) = send(
        router.clone(),
        get("/data", &[("table", "orders"), ("datalensId", "warehouse-sales")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let override_source = json!({
        "jdbc_url": "jdbc:postgresql://replica:5432/analytics",
        "username": "auditor",
        "password": "pw"
    })
    .to_string();
    let (status, _) = send(
        router.clone(),
        get(
            "/data",
            &[("table", "orders"), ("datalensId", "warehouse-sales"), ("dataSource", override_source.as_str())],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(router, get("/data", &[("table", "orders"), ("datalensId", "sales")])).await;
    assert_eq!(status, StatusCode::OK);

    let recorded = recorded.lock().unwrap();
    assert_eq!(recorded.sources.len(), 3);
    assert_eq!(recorded.sources[0].as_ref().map(|source| source.username.as_str()), Some("reader"));
    assert_eq!(recorded.sources[1].as_ref().map(|source| source.username.as_str()), Some("auditor"));
    assert!(recorded.sources[2].is_none());
}

#[tokio::test]
async fn unknown_data_source_id_is_not_found() {
    let (status, body) = send(
        app(StubDatabase::default()),
        get("/data", &[("table", "orders"), ("datalensId", "sales"), ("dataSourceId", "nope")]),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Data source not found: nope");
}

#[tokio::test]
async fn distinct_values_returns_a_flat_list() {
    let database = StubDatabase {
        rows: vec![json!({ "customer": "acme" }), json!({ "customer": "academy" })],
        ..Default::default()
    };
    let recorded = database.recorded.clone();

    let (status, body) = send(
        app(database),
        get(
            "/distinct-values",
            &[
                ("table", "orders"),
                ("column", "customer"),
                ("datalensId", "sales"),
                ("searchTerm", "ac"),
                ("filters", r#"{"is_paid":["true"]}"#),
            ],
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["acme", "academy"]));

    let recorded = recorded.lock().unwrap();
    let queries = recorded.data_queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(
        queries[0].sql,
        "SELECT DISTINCT customer FROM public.orders \
         WHERE customer::text ILIKE $1 AND CAST(is_paid AS bool) = $2::bool \
         ORDER BY customer ASC LIMIT $3::bigint"
    );
}

#[tokio::test]
async fn distinct_values_rejects_missing_and_unknown_columns() {
    let (status, body) = send(
        app(StubDatabase::default()),
        get("/distinct-values", &[("table", "orders"), ("datalensId", "sales")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Table and column are required");

    let (status, body) = send(
        app(StubDatabase::default()),
        get(
            "/distinct-values",
            &[("table", "orders"), ("column", "password_hash"), ("datalensId", "sales")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Column not found in table");
}

#[tokio::test]
async fn data_lens_configuration_is_served() {
    let router = app(StubDatabase::default());

    let request = Request::builder()
        .uri("/datalens/api/datalenses/warehouse-sales")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(router.clone(), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "warehouse-sales");
    assert_eq!(body["datasourceId"], "warehouse");
    assert_eq!(body["tables"][0]["name"], "orders");
    assert_eq!(body["tables"][0]["sort_column"], "id");
    assert_eq!(body["tables"][0]["columns"][3], json!({ "name": "created_at", "type": "datetime" }));

    let request = Request::builder()
        .uri("/datalens/api/datalenses/unknown")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(router, request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_connection_reports_outcome() {
    let router = app(StubDatabase::default());

    let (status, body) = send(
        router.clone(),
        post_json(
            "/datasources/test-connection",
            json!({ "jdbcUrl": "jdbc:postgresql://db:5432/analytics", "username": "reader", "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "success": true }));

    let (status, body) = send(
        router.clone(),
        post_json(
            "/datasources/test-connection",
            json!({ "jdbcUrl": "jdbc:postgresql://db:5432/analytics", "username": "reader" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");

    let (status, body) = send(
        router,
        post_json(
            "/datasources/test-connection",
            json!({ "jdbcUrl": "jdbc:mysql://db/analytics", "username": "reader", "password": "pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "unsupported url jdbc:mysql://db/analytics");
}
