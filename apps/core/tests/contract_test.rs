use kestrel_core::contract::{
    ActivateRequest, CoreRequest, CoreResponse, ResultDto, SearchRequest, SearchResponse,
};
use kestrel_core::model::ResultItem;

#[test]
fn requests_use_kind_and_payload_tags() {
    let request = CoreRequest::Search(SearchRequest {
        query: "code".to_string(),
    });
    let encoded = serde_json::to_value(&request).unwrap();
    assert_eq!(
        encoded,
        serde_json::json!({ "kind": "search", "payload": { "query": "code" } })
    );

    let decoded: CoreRequest =
        serde_json::from_str(r#"{"kind":"activate","payload":{"index":3}}"#).unwrap();
    assert_eq!(decoded, CoreRequest::Activate(ActivateRequest { index: 3 }));

    let refresh: CoreRequest = serde_json::from_str(r#"{"kind":"refresh_apps"}"#).unwrap();
    assert_eq!(refresh, CoreRequest::RefreshApps);
}

#[test]
fn result_items_become_dtos_with_provider_tag() {
    let item = ResultItem::new(
        "4",
        "Press Enter to copy to clipboard",
        "accessories-calculator",
        "4",
        "calculator",
    );
    let response = SearchResponse::new("2+2", vec![item]);
    assert_eq!(
        response.results,
        vec![ResultDto {
            title: "4".into(),
            subtitle: "Press Enter to copy to clipboard".into(),
            icon: "accessories-calculator".into(),
            payload: "4".into(),
            provider: "calculator".into(),
        }]
    );
}

#[test]
fn unsolicited_updates_have_their_own_kind() {
    let update = CoreResponse::ResultsUpdated(SearchResponse::new("npm react", Vec::new()));
    let encoded = serde_json::to_value(&update).unwrap();
    assert_eq!(encoded["kind"], "results_updated");
    assert_eq!(encoded["payload"]["query"], "npm react");

    let decoded: CoreResponse = serde_json::from_value(encoded).unwrap();
    assert_eq!(decoded, update);
}

#[test]
fn unknown_kinds_are_rejected() {
    assert!(serde_json::from_str::<CoreRequest>(r#"{"kind":"launch","payload":{}}"#).is_err());
}
