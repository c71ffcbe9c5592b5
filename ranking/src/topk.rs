use crate::adsorption::LabelSet;
use socialrank_core::model::{FeedEntry, NodeKind};
use std::cmp::Ordering;

/// Turns post labels into `(user, post, weight)` feed rows.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopKExtractor {
    top_n: Option<usize>,
}

impl TopKExtractor {
    pub fn new(top_n: Option<usize>) -> Self {
        Self { top_n }
    }

    /// Rows are ordered by user, then weight descending, then post id.
    /// With `top_n` set, each user keeps only its first `top_n` rows.
    pub fn extract(&self, labels: &LabelSet) -> Vec<FeedEntry> {
        let mut entries: Vec<FeedEntry> = labels
            .iter()
            .filter(|(node, label)| {
                node.kind() == NodeKind::Post && label.origin.kind() == NodeKind::User
            })
            .map(|(node, label)| {
                FeedEntry::new(label.origin.local_id(), node.local_id(), label.weight)
            })
            .collect();

        entries.sort_by(feed_order);

        if let Some(n) = self.top_n {
            let mut kept = 0usize;
            let mut current_user: Option<String> = None;
            entries.retain(|entry| {
                if current_user.as_deref() != Some(entry.user_id.as_str()) {
                    current_user = Some(entry.user_id.clone());
                    kept = 0;
                }
                kept += 1;
                kept <= n
            });
        }

        entries
    }
}

fn feed_order(a: &FeedEntry, b: &FeedEntry) -> Ordering {
    a.user_id
        .cmp(&b.user_id)
        .then_with(|| b.weight.total_cmp(&a.weight))
        .then_with(|| a.post_id.cmp(&b.post_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_order_breaks_ties_by_post_id() {
        let mut entries = vec![
            FeedEntry::new("u1", "b", 0.5),
            FeedEntry::new("u1", "a", 0.5),
            FeedEntry::new("u1", "c", 0.9),
            FeedEntry::new("u0", "z", 0.1),
        ];
        entries.sort_by(feed_order);
        let order: Vec<(&str, &str)> = entries
            .iter()
            .map(|e| (e.user_id.as_str(), e.post_id.as_str()))
            .collect();
        assert_eq!(order, vec![("u0", "z"), ("u1", "c"), ("u1", "a"), ("u1", "b")]);
    }

    #[test]
    fn test_empty_label_set_yields_nothing() {
        assert!(TopKExtractor::new(Some(3)).extract(&LabelSet::default()).is_empty());
    }
}
