use std::sync::Arc;

use crate::directory::{CampaignDirectory, CampaignFilter, MemoryCampaigns};
use crate::errors::CoreError;
use crate::invariants::{
    assert_accrual_invariant, assert_all_campaign_invariants, assert_forward_only,
    assert_immutable_fields,
};
use crate::lifecycle::CampaignEngine;
use crate::types::{Campaign, NewCampaign, Principal, Role};

fn setup() -> (CampaignEngine, CampaignDirectory, Arc<MemoryCampaigns>) {
    let repo = Arc::new(MemoryCampaigns::new());
    let engine = CampaignEngine::new(repo.clone());
    let directory = CampaignDirectory::new(repo.clone());
    (engine, directory, repo)
}

fn principal(id: &str, role: Role) -> Principal {
    Principal {
        id: id.to_string(),
        email: format!("{}@example.org", id.to_lowercase()),
        role,
    }
}

fn draft(goal: i64) -> NewCampaign {
    NewCampaign {
        title: "Computer Science Tuition".into(),
        description: "Second-year fees".into(),
        goal_amount: goal,
    }
}

async fn create(engine: &CampaignEngine, owner: &Principal, goal: i64) -> Campaign {
    engine
        .create_campaign(Some(owner), draft(goal))
        .await
        .expect("campaign should be created")
}

#[tokio::test]
async fn test_new_campaign_starts_active_at_zero() {
    let (engine, directory, _) = setup();
    let s1 = principal("S1", Role::Student);

    let campaign = create(&engine, &s1, 500).await;

    assert_eq!(campaign.current_amount, 0);
    assert!(campaign.is_active);
    assert!(!campaign.is_verified);
    assert_eq!(campaign.owner_id, "S1");
    assert_all_campaign_invariants(&campaign);
    assert_eq!(directory.by_id(&campaign.id).await.unwrap(), Some(campaign));
}

#[tokio::test]
async fn test_parent_may_create_but_donor_and_anonymous_may_not() {
    let (engine, directory, _) = setup();

    create(&engine, &principal("P1", Role::Parent), 100).await;

    let donor = principal("D1", Role::Donor);
    assert!(matches!(
        engine.create_campaign(Some(&donor), draft(100)).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        engine.create_campaign(None, draft(100)).await,
        Err(CoreError::Forbidden(_))
    ));
    assert_eq!(directory.list(&CampaignFilter::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_drafts_are_rejected_without_side_effects() {
    let (engine, directory, _) = setup();
    let s1 = principal("S1", Role::Student);

    for bad in [
        NewCampaign { title: String::new(), ..draft(100) },
        NewCampaign { description: "   ".into(), ..draft(100) },
        draft(0),
        draft(-50),
    ] {
        assert!(matches!(
            engine.create_campaign(Some(&s1), bad).await,
            Err(CoreError::Validation(_))
        ));
    }
    assert!(directory.by_owner("S1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_student_donor_scenario_reaches_goal_and_closes() {
    let (engine, directory, repo) = setup();
    let s1 = principal("S1", Role::Student);
    let d1 = principal("D1", Role::Donor);

    let created = create(&engine, &s1, 100).await;

    let after_first = engine.record_donation(&created.id, Some(&d1), 60).await.unwrap();
    assert_eq!(after_first.current_amount, 60);
    assert!(after_first.is_active);
    assert_eq!(after_first.progress_percent(), 60);
    assert_accrual_invariant(&created, &after_first, 60);

    let after_second = engine.record_donation(&created.id, Some(&d1), 50).await.unwrap();
    assert_eq!(after_second.current_amount, 110);
    assert!(!after_second.is_active);
    assert_eq!(after_second.progress_percent(), 100);
    assert_forward_only(&after_first, &after_second);
    assert_immutable_fields(&created, &after_second);
    assert_all_campaign_invariants(&after_second);

    let third = engine.record_donation(&created.id, Some(&d1), 10).await;
    assert_eq!(third, Err(CoreError::CampaignClosed(created.id.clone())));

    let stored = directory.by_id(&created.id).await.unwrap().unwrap();
    assert_eq!(stored.current_amount, 110);
    assert!(!stored.is_active);

    let ledger = repo.donations();
    assert_eq!(ledger.len(), 2);
    assert!(ledger.iter().all(|d| d.donor_id.as_deref() == Some("D1")));
}

#[tokio::test]
async fn test_exact_goal_closes_campaign() {
    let (engine, _, _) = setup();
    let campaign = create(&engine, &principal("S1", Role::Student), 100).await;

    let funded = engine
        .record_donation(&campaign.id, Some(&principal("D1", Role::Donor)), 100)
        .await
        .unwrap();
    assert_eq!(funded.current_amount, 100);
    assert!(!funded.is_active);
}

#[tokio::test]
async fn test_invalid_amount_leaves_campaign_unchanged() {
    let (engine, directory, _) = setup();
    let campaign = create(&engine, &principal("S1", Role::Student), 100).await;
    let d1 = principal("D1", Role::Donor);

    for amount in [0, -1] {
        assert!(matches!(
            engine.record_donation(&campaign.id, Some(&d1), amount).await,
            Err(CoreError::InvalidAmount(_))
        ));
    }
    assert_eq!(directory.by_id(&campaign.id).await.unwrap(), Some(campaign));
}

#[tokio::test]
async fn test_only_donors_may_donate() {
    let (engine, _, repo) = setup();
    let s1 = principal("S1", Role::Student);
    let campaign = create(&engine, &s1, 100).await;

    assert!(matches!(
        engine.record_donation(&campaign.id, Some(&s1), 10).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(matches!(
        engine.record_donation(&campaign.id, None, 10).await,
        Err(CoreError::Forbidden(_))
    ));
    assert!(repo.donations().is_empty());
}

#[tokio::test]
async fn test_donation_to_missing_campaign_is_not_found() {
    let (engine, _, _) = setup();
    assert_eq!(
        engine
            .record_donation("missing", Some(&principal("D1", Role::Donor)), 5)
            .await,
        Err(CoreError::NotFound("missing".into()))
    );
}

#[tokio::test]
async fn test_delete_by_non_owner_is_forbidden_and_directory_unchanged() {
    let (engine, directory, _) = setup();
    let s1 = principal("S1", Role::Student);
    let campaign = create(&engine, &s1, 100).await;

    for intruder in [
        Some(principal("S2", Role::Student)),
        Some(principal("D1", Role::Donor)),
        None,
    ] {
        assert!(matches!(
            engine.delete_campaign(&campaign.id, intruder.as_ref()).await,
            Err(CoreError::Forbidden(_))
        ));
    }
    assert_eq!(directory.by_owner("S1").await.unwrap(), vec![campaign]);
}

#[tokio::test]
async fn test_owner_delete_is_visible_immediately() {
    let (engine, directory, _) = setup();
    let s1 = principal("S1", Role::Student);
    let keep = create(&engine, &s1, 100).await;
    let drop = create(&engine, &s1, 200).await;

    // Funded campaigns may still be deleted by their owner.
    engine
        .record_donation(&drop.id, Some(&principal("D1", Role::Donor)), 250)
        .await
        .unwrap();
    engine.delete_campaign(&drop.id, Some(&s1)).await.unwrap();

    assert_eq!(directory.by_owner("S1").await.unwrap(), vec![keep]);
    assert_eq!(
        engine.delete_campaign(&drop.id, Some(&s1)).await,
        Err(CoreError::NotFound(drop.id.clone()))
    );
}

#[tokio::test]
async fn test_concurrent_donations_are_serialized() {
    let (engine, directory, repo) = setup();
    let campaign = create(&engine, &principal("S1", Role::Student), 1_000).await;
    let d1 = principal("D1", Role::Donor);

    let mut handles = Vec::new();
    for _ in 0..50 {
        let engine = engine.clone();
        let donor = d1.clone();
        let id = campaign.id.clone();
        handles.push(tokio::spawn(async move {
            engine.record_donation(&id, Some(&donor), 3).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = directory.by_id(&campaign.id).await.unwrap().unwrap();
    assert_eq!(stored.current_amount, 150);
    assert_eq!(repo.donations().len(), 50);
}

#[tokio::test]
async fn test_concurrent_donations_never_accept_after_funding() {
    let (engine, directory, repo) = setup();
    let campaign = create(&engine, &principal("S1", Role::Student), 10).await;
    let d1 = principal("D1", Role::Donor);

    let mut handles = Vec::new();
    for _ in 0..40 {
        let engine = engine.clone();
        let donor = d1.clone();
        let id = campaign.id.clone();
        handles.push(tokio::spawn(async move {
            engine.record_donation(&id, Some(&donor), 1).await
        }));
    }

    let mut accepted = 0;
    let mut closed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(CoreError::CampaignClosed(_)) => closed += 1,
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }

    assert_eq!(accepted, 10);
    assert_eq!(closed, 30);
    let stored = directory.by_id(&campaign.id).await.unwrap().unwrap();
    assert_eq!(stored.current_amount, 10);
    assert!(!stored.is_active);
    assert_eq!(repo.donations().len(), 10);
}
