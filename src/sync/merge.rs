//! Merge decision for a one-resource transfer

use serde_json::Value;

use super::client_helper::CategoryBinding;
use super::equivalence::equivalent;

/// What a transfer should do with the source copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// Nothing exists at the source
    Absent,
    /// Both copies are already equivalent
    InSync,
    /// Only the target changed since the last sync
    TargetAhead,
    /// Both copies changed since the last sync and disagree
    Conflict,
    /// The source copy should overwrite the target
    Push,
}

/// Decides between pushing, skipping and flagging a conflict
pub struct MergeBehaviour<'a> {
    binding: &'a CategoryBinding,
}

impl<'a> MergeBehaviour<'a> {
    pub fn new(binding: &'a CategoryBinding) -> Self {
        Self { binding }
    }

    /// Compare normalized copies, using `base` (the last synced copy) when known
    pub fn decide(&self, source: Option<&Value>, target: Option<&Value>, base: Option<&Value>) -> MergeDecision {
        let Some(source) = source.map(|v| self.binding.normalize(v.clone())) else {
            return MergeDecision::Absent;
        };
        let Some(target) = target.map(|v| self.binding.normalize(v.clone())) else {
            return MergeDecision::Push;
        };

        if equivalent(&source, &target) {
            return MergeDecision::InSync;
        }

        let Some(base) = base.map(|v| self.binding.normalize(v.clone())) else {
            return MergeDecision::Push;
        };

        let source_changed = !equivalent(&source, &base);
        let target_changed = !equivalent(&target, &base);
        match (source_changed, target_changed) {
            (true, true) => MergeDecision::Conflict,
            (false, true) => MergeDecision::TargetAhead,
            _ => MergeDecision::Push,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::category::Category;
    use crate::sync::client_helper::{ClientRegistry, REST_CLIENT};
    use serde_json::json;

    fn binding() -> CategoryBinding {
        ClientRegistry::with_defaults()
            .resolve(REST_CLIENT, Category::Patient)
            .unwrap()
    }

    #[test]
    fn test_absent_source() {
        let binding = binding();
        let merge = MergeBehaviour::new(&binding);
        assert_eq!(merge.decide(None, Some(&json!({})), None), MergeDecision::Absent);
    }

    #[test]
    fn test_missing_target_is_pushed() {
        let binding = binding();
        let merge = MergeBehaviour::new(&binding);
        assert_eq!(
            merge.decide(Some(&json!({"uuid": "1"})), None, None),
            MergeDecision::Push
        );
    }

    #[test]
    fn test_normalized_equivalence_is_in_sync() {
        let binding = binding();
        let merge = MergeBehaviour::new(&binding);
        let source = json!({"uuid": "1", "person": {"gender": "F", "preferredName": {"display": "A"}}});
        let target = json!({"uuid": "1", "person": {"gender": "F", "preferredName": {"display": "B"}}, "links": []});
        assert_eq!(
            merge.decide(Some(&source), Some(&target), None),
            MergeDecision::InSync
        );
    }

    #[test]
    fn test_three_way_outcomes() {
        let binding = binding();
        let merge = MergeBehaviour::new(&binding);
        let base = json!({"uuid": "1", "gender": "F"});
        let source_edit = json!({"uuid": "1", "gender": "M"});
        let target_edit = json!({"uuid": "1", "gender": "U"});

        assert_eq!(
            merge.decide(Some(&source_edit), Some(&target_edit), Some(&base)),
            MergeDecision::Conflict
        );
        assert_eq!(
            merge.decide(Some(&base), Some(&target_edit), Some(&base)),
            MergeDecision::TargetAhead
        );
        assert_eq!(
            merge.decide(Some(&source_edit), Some(&base), Some(&base)),
            MergeDecision::Push
        );
    }
}
