use super::watch::Watch;

/// Notification for one triggered watch, addressed to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub user_id: i64,
    pub message: String,
}

impl Alert {
    pub fn for_watch(watch: &Watch) -> Self {
        Self {
            user_id: watch.user_id,
            message: format!(
                "Notification for asset {} has triggered an alert at price point {:.6}.",
                watch.asset_id, watch.threshold
            ),
        }
    }
}
