use std::sync::Arc;

use rotas_graph::test_support::{
    healthy_workbook, test_config, Method, ADD_ROW_SUFFIX, DRIVES_SUFFIX, FILE_SUFFIX, ROWS_SUFFIX,
    SITE_SUFFIX, TABLES_SUFFIX, TOKEN_SUFFIX, WORKSHEETS_SUFFIX,
};
use rotas_graph::{
    GraphClient, GraphError, HttpFailure, ResourceResolver, Stage, PLACEHOLDER_ROW_ID,
};
use rstest::rstest;
use serde_json::json;

fn resolver(transport: Arc<rotas_graph::test_support::ScriptedTransport>) -> ResourceResolver {
    ResourceResolver::new(&test_config(), transport)
}

#[test]
fn healthy_chain_resolves_every_identifier() {
    let transport = Arc::new(healthy_workbook(vec![]));
    let address = resolver(transport.clone()).resolve("bearer").expect("resolve");

    assert_eq!(address.site_id, "site-1");
    assert_eq!(address.drive_id, "drive-1");
    assert_eq!(address.item_id, "item-1");
    assert_eq!(address.worksheet_id, "sheet-1");
    assert_eq!(address.table_id, "table-1");
    assert_eq!(address.table_name, "Aderência");

    let urls: Vec<String> = transport.calls().into_iter().map(|c| c.url).collect();
    assert!(urls[0].ends_with(SITE_SUFFIX));
    assert!(urls[1].ends_with(DRIVES_SUFFIX));
    assert!(urls[2].ends_with(FILE_SUFFIX));
    assert!(urls[3].ends_with(WORKSHEETS_SUFFIX));
    assert!(urls[4].ends_with(TABLES_SUFFIX));
}

#[test]
fn zero_site_matches_fail_at_site_stage() {
    let transport = healthy_workbook(vec![]);
    transport.set(Method::Get, SITE_SUFFIX, Ok(json!({ "value": [] })));
    let transport = Arc::new(transport);

    let err = resolver(transport.clone()).resolve("bearer").unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Site));
    assert!(err.to_string().contains("stage 'site'"));
    // Chain stops at the first failure.
    assert_eq!(transport.calls().len(), 1);
}

#[test]
fn exact_site_name_beats_first_search_hit() {
    let transport = healthy_workbook(vec![]);
    transport.set(
        Method::Get,
        SITE_SUFFIX,
        Ok(json!({ "value": [
            { "id": "site-9", "name": "SST-Arquivo", "displayName": "SST Arquivo" },
            { "id": "site-1", "name": "sst", "displayName": "Segurança" }
        ] })),
    );
    let address = resolver(Arc::new(transport)).resolve("bearer").expect("resolve");
    assert_eq!(address.site_id, "site-1");
}

#[rstest]
#[case(DRIVES_SUFFIX, json!({ "value": [] }), Stage::Drive)]
#[case(WORKSHEETS_SUFFIX, json!({ "value": [{ "id": "s", "name": "Riscos" }] }), Stage::Worksheet)]
#[case(TABLES_SUFFIX, json!({ "value": [{ "id": "t", "name": "Tabela1" }] }), Stage::Table)]
fn empty_or_mismatched_stage_is_tagged(
    #[case] suffix: &str,
    #[case] payload: serde_json::Value,
    #[case] stage: Stage,
) {
    let transport = healthy_workbook(vec![]);
    transport.set(Method::Get, suffix, Ok(payload));
    let err = resolver(Arc::new(transport)).resolve("bearer").unwrap_err();
    assert_eq!(err.stage(), Some(stage), "got {err}");
}

#[test]
fn missing_file_fails_at_file_stage() {
    let transport = healthy_workbook(vec![]);
    transport.set(
        Method::Get,
        FILE_SUFFIX,
        Err(HttpFailure::Status {
            status: 404,
            body: "itemNotFound".into(),
        }),
    );
    let err = resolver(Arc::new(transport)).resolve("bearer").unwrap_err();
    match err {
        GraphError::Resolution { stage, reason, .. } => {
            assert_eq!(stage, Stage::File);
            assert!(reason.contains("/General/ROTAS/Gestão SST.xlsm"));
        }
        other => panic!("expected resolution failure, got {other:?}"),
    }
}

#[test]
fn worksheet_failure_lists_available_sheets() {
    let transport = healthy_workbook(vec![]);
    transport.set(
        Method::Get,
        WORKSHEETS_SUFFIX,
        Ok(json!({ "value": [
            { "id": "a", "name": "Riscos" },
            { "id": "b", "name": "Plano de Ação" }
        ] })),
    );
    let err = resolver(Arc::new(transport)).resolve("bearer").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("Riscos"), "{message}");
    assert!(message.contains("Plano de Ação"), "{message}");
}

#[test]
fn cached_address_is_reused_and_dropped_on_failure() {
    let transport = Arc::new(healthy_workbook(vec![]));
    let resolver = resolver(transport.clone());

    resolver.resolve_cached("bearer").expect("first");
    resolver.resolve_cached("bearer").expect("second");
    assert_eq!(transport.count(Method::Get, SITE_SUFFIX), 1);

    resolver.invalidate();
    transport.set(Method::Get, DRIVES_SUFFIX, Ok(json!({ "value": [] })));
    assert!(resolver.resolve_cached("bearer").is_err());
    assert!(!resolver.is_cached());
}

#[test]
fn row_fetch_failure_is_tagged_rows_and_clears_address() {
    let transport = healthy_workbook(vec![vec![json!("1")]]);
    transport.set(
        Method::Get,
        "/workbook/tables/table-1/rows",
        Err(HttpFailure::Transport("timed out".into())),
    );
    let client = GraphClient::new(&test_config(), Arc::new(transport));

    let session = client.session().expect("session");
    assert!(client.resolver().is_cached());
    let err = client.fetch_rows(&session).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Rows));
    assert!(!client.resolver().is_cached());
}

#[test]
fn unauthorized_graph_call_drops_cached_token() {
    let transport = Arc::new(healthy_workbook(vec![]));
    transport.set(
        Method::Get,
        SITE_SUFFIX,
        Err(HttpFailure::Status {
            status: 401,
            body: "InvalidAuthenticationToken".into(),
        }),
    );
    let client = GraphClient::new(&test_config(), transport.clone());

    let err = client.session().unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Site));
    assert!(err.is_unauthorized());
    assert!(client.tokens().cached().is_none());

    // The next session asks the identity provider again.
    let _ = client.session();
    assert_eq!(transport.count(Method::PostForm, TOKEN_SUFFIX), 2);
}

#[test]
fn unauthorized_row_fetch_drops_cached_token() {
    let transport = Arc::new(healthy_workbook(vec![]));
    let client = GraphClient::new(&test_config(), transport.clone());
    let session = client.session().expect("session");
    transport.set(
        Method::Get,
        ROWS_SUFFIX,
        Err(HttpFailure::Status {
            status: 401,
            body: "token revoked".into(),
        }),
    );

    let err = client.fetch_rows(&session).unwrap_err();
    assert_eq!(err.stage(), Some(Stage::Rows));
    assert!(client.tokens().cached().is_none());
}

#[test]
fn other_stage_failures_keep_the_token() {
    let transport = Arc::new(healthy_workbook(vec![]));
    transport.set(
        Method::Get,
        DRIVES_SUFFIX,
        Err(HttpFailure::Status {
            status: 503,
            body: "busy".into(),
        }),
    );
    let client = GraphClient::new(&test_config(), transport);

    let err = client.session().unwrap_err();
    assert!(!err.is_unauthorized());
    assert!(client.tokens().cached().is_some());
}

#[test]
fn added_row_without_index_reports_placeholder_id() {
    let transport = Arc::new(healthy_workbook(vec![]));
    transport.set(Method::PostJson, ADD_ROW_SUFFIX, Ok(json!({})));
    let client = GraphClient::new(&test_config(), transport);
    let session = client.session().expect("session");

    let row_id = client
        .add_row(&session, &["1".to_string()])
        .expect("row accepted");
    assert_eq!(row_id, PLACEHOLDER_ROW_ID);
}
