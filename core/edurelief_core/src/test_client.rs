use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::client::CampaignClient;
use crate::directory::CampaignFilter;
use crate::errors::CoreError;
use crate::test_session::{dead_address, spawn};
use crate::types::{Campaign, NewCampaign, Principal, Role, Session};

type Hits = Arc<AtomicUsize>;

fn campaign(id: &str, current: i64, goal: i64) -> Campaign {
    Campaign {
        id: id.into(),
        owner_id: "S1".into(),
        title: "Laptop".into(),
        description: "For coursework".into(),
        goal_amount: goal,
        current_amount: current,
        is_active: current < goal,
        is_verified: true,
    }
}

fn session(id: &str, role: Role) -> Session {
    Session::new(
        format!("tok-{id}"),
        Principal {
            id: id.into(),
            email: format!("{}@example.org", id.to_lowercase()),
            role,
        },
    )
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn mock_list(
    State(hits): State<Hits>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let mut all = vec![campaign("c-1", 10, 100), campaign("c-2", 100, 100)];
    if query.get("include_closed").map(String::as_str) == Some("false") {
        all.retain(|c| c.is_active);
    }
    Json(json!(all))
}

async fn mock_get(State(hits): State<Hits>, Path(id): Path<String>) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);
    match id.as_str() {
        "c-1" => (StatusCode::OK, Json(json!(campaign("c-1", 10, 100)))),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "not_found", "detail": "Campaign not found" })),
        ),
    }
}

async fn mock_create(
    State(hits): State<Hits>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers) != Some("tok-S1") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "detail": "missing bearer token" })),
        );
    }
    let mut created = campaign("c-new", 0, body["goal_amount"].as_i64().unwrap_or(1));
    created.title = body["title"].as_str().unwrap_or_default().into();
    (StatusCode::CREATED, Json(json!(created)))
}

async fn mock_donate(
    State(hits): State<Hits>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    hits.fetch_add(1, Ordering::SeqCst);
    if bearer(&headers) != Some("tok-D1") {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "detail": "Not authenticated" })));
    }
    match id.as_str() {
        "c-race" => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "campaign_closed",
                "detail": "This campaign has reached its goal and is no longer active.",
            })),
        ),
        "c-down" => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({}))),
        _ => {
            let current = 10 + body["amount"].as_i64().unwrap_or(0);
            (
                StatusCode::OK,
                Json(json!({
                    "message": "Donation successful",
                    "current_amount": current,
                    "is_active": current < 100,
                })),
            )
        }
    }
}

async fn campaign_api() -> (CampaignClient, Hits) {
    let hits = Hits::default();
    let router = Router::new()
        .route("/campaigns/", get(mock_list).post(mock_create))
        .route("/campaigns/:id", get(mock_get))
        .route("/campaigns/:id/donate", post(mock_donate))
        .with_state(hits.clone());
    let url = spawn(router).await;
    (CampaignClient::new(Client::new(), url), hits)
}

fn draft() -> NewCampaign {
    NewCampaign {
        title: "Laptop".into(),
        description: "For coursework".into(),
        goal_amount: 800,
    }
}

#[tokio::test]
async fn test_visitor_can_list_but_create_is_denied_before_any_request() {
    let (client, hits) = campaign_api().await;

    let all = client.list(&CampaignFilter::default()).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let err = client.create(None, &draft()).await.unwrap_err();
    assert!(matches!(err, CoreError::Forbidden(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_active_only_listing_is_forwarded() {
    let (client, _) = campaign_api().await;
    let filter = CampaignFilter {
        active_only: true,
        ..CampaignFilter::default()
    };
    let active = client.list(&filter).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "c-1");
}

#[tokio::test]
async fn test_denied_calls_never_reach_the_network() {
    // Nothing listens here; any request would be a Transport error.
    let client = CampaignClient::new(Client::new(), dead_address().await);
    let donor = session("D1", Role::Donor);
    let student = session("S1", Role::Student);

    assert!(matches!(
        client.create(Some(&donor), &draft()).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        client
            .create(Some(&student), &NewCampaign { goal_amount: 0, ..draft() })
            .await,
        Err(CoreError::Validation(_))
    ));
    assert_eq!(
        client.donate(Some(&donor), &campaign("c-2", 100, 100), 5).await,
        Err(CoreError::CampaignClosed("c-2".into()))
    );
    assert!(matches!(
        client.donate(Some(&donor), &campaign("c-1", 0, 100), 0).await,
        Err(CoreError::InvalidAmount(_))
    ));
    assert!(matches!(
        client.donate(Some(&student), &campaign("c-1", 0, 100), 5).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        client
            .delete(Some(&session("S2", Role::Student)), &campaign("c-1", 0, 100))
            .await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(client.mine(Some(&donor)).await, Err(CoreError::Forbidden(_))));
}

#[tokio::test]
async fn test_create_attaches_bearer_token() {
    let (client, _) = campaign_api().await;
    let created = client
        .create(Some(&session("S1", Role::Student)), &draft())
        .await
        .unwrap();
    assert_eq!(created.id, "c-new");
    assert_eq!(created.goal_amount, 800);
    assert!(created.is_active);
}

#[tokio::test]
async fn test_donate_applies_server_totals() {
    let (client, _) = campaign_api().await;
    let before = campaign("c-1", 10, 100);

    let after = client
        .donate(Some(&session("D1", Role::Donor)), &before, 95)
        .await
        .unwrap();
    assert_eq!(after.current_amount, 105);
    assert!(!after.is_active);
    assert_eq!(after.progress_percent(), 100);
    assert_eq!(after.goal_amount, before.goal_amount);
}

#[tokio::test]
async fn test_server_side_errors_keep_their_type() {
    let (client, _) = campaign_api().await;
    let donor = session("D1", Role::Donor);

    assert_eq!(
        client.donate(Some(&donor), &campaign("c-race", 90, 100), 5).await,
        Err(CoreError::CampaignClosed("c-race".into()))
    );
    assert!(matches!(
        client.donate(Some(&donor), &campaign("c-down", 0, 100), 5).await,
        Err(CoreError::Transport(_))
    ));

    // A stale token is reported as unauthorized, not as success.
    let stale = session("D9", Role::Donor);
    assert!(matches!(
        client.donate(Some(&stale), &campaign("c-1", 0, 100), 5).await,
        Err(CoreError::Unauthorized(_))
    ));
}

#[tokio::test]
async fn test_get_missing_campaign_is_none() {
    let (client, _) = campaign_api().await;
    assert_eq!(client.get("c-1").await.unwrap().map(|c| c.id), Some("c-1".into()));
    assert_eq!(client.get("c-404").await.unwrap(), None);
}
