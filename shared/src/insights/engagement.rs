use crate::types::PostInsights;

/// Engagement as a percentage of views, capped at 100.
///
/// Views are floored at 1 so a post nobody has viewed yet still gets a rate.
/// A non-finite result becomes 0.
pub fn engagement_rate(insights: &PostInsights) -> f64 {
    let engagements = insights
        .like_count
        .saturating_add(insights.comment_count)
        .saturating_add(insights.share_count) as f64;
    let views = insights.views.max(1) as f64;

    let rate = (engagements / views * 100.0).clamp(0.0, 100.0);
    if rate.is_finite() {
        rate
    } else {
        tracing::error!("Engagement rate for post {} is not finite, resetting", insights.post_id);
        0.0
    }
}

pub fn refresh_engagement_rate(insights: &mut PostInsights) {
    insights.engagement_rate = engagement_rate(insights);
}
