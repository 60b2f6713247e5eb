#![allow(dead_code)]

use crate::types::Campaign;

/// INV-1: Campaign goal must always be positive.
pub fn assert_goal_positive(campaign: &Campaign) {
    assert!(
        campaign.goal_amount > 0,
        "INV-1 violated: campaign {} has non-positive goal ({})",
        campaign.id,
        campaign.goal_amount
    );
}

/// INV-2: Accrued amount is never negative.
pub fn assert_amount_non_negative(campaign: &Campaign) {
    assert!(
        campaign.current_amount >= 0,
        "INV-2 violated: campaign {} has negative amount ({})",
        campaign.id,
        campaign.current_amount
    );
}

/// INV-3: `is_active` holds exactly while the goal has not been reached.
pub fn assert_active_flag_consistent(campaign: &Campaign) {
    assert_eq!(
        campaign.is_active,
        campaign.current_amount < campaign.goal_amount,
        "INV-3 violated: campaign {} is_active={} with {}/{}",
        campaign.id,
        campaign.is_active,
        campaign.current_amount,
        campaign.goal_amount
    );
}

/// INV-4: Progress stays within 0..=100.
pub fn assert_progress_bounded(campaign: &Campaign) {
    let progress = campaign.progress_percent();
    assert!(
        progress <= 100,
        "INV-4 violated: campaign {} reports {}% progress",
        campaign.id,
        progress
    );
}

/// INV-5: After an accepted donation of `amount`, the amount grows by exactly
/// `amount`.
pub fn assert_accrual_invariant(before: &Campaign, after: &Campaign, amount: i64) {
    assert_eq!(
        after.current_amount,
        before.current_amount + amount,
        "INV-5 violated: accrual invariant broken: {} + {} != {}",
        before.current_amount,
        amount,
        after.current_amount
    );
}

/// INV-6: Accrual never moves backwards and a funded campaign never reopens.
pub fn assert_forward_only(before: &Campaign, after: &Campaign) {
    assert!(
        after.current_amount >= before.current_amount,
        "INV-6 violated: campaign {} amount decreased from {} to {}",
        before.id,
        before.current_amount,
        after.current_amount
    );
    assert!(
        before.is_active || !after.is_active,
        "INV-6 violated: campaign {} reopened after being funded",
        before.id
    );
}

/// INV-7: Fields fixed at creation never change.
pub fn assert_immutable_fields(original: &Campaign, current: &Campaign) {
    assert_eq!(original.id, current.id, "INV-7 violated: campaign id changed");
    assert_eq!(
        original.owner_id, current.owner_id,
        "INV-7 violated: campaign owner changed"
    );
    assert_eq!(
        original.goal_amount, current.goal_amount,
        "INV-7 violated: campaign goal changed"
    );
    assert_eq!(
        original.title, current.title,
        "INV-7 violated: campaign title changed"
    );
}

/// Run all stateless campaign invariants.
pub fn assert_all_campaign_invariants(campaign: &Campaign) {
    assert_goal_positive(campaign);
    assert_amount_non_negative(campaign);
    assert_active_flag_consistent(campaign);
    assert_progress_bounded(campaign);
}
