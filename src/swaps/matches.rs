use std::collections::BTreeSet;

use serde::Serialize;

/// Skills two members could trade, from the viewer's side. Advisory only:
/// a swap request may still name any offered skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Matches {
    pub viewer_can_teach: BTreeSet<String>,
    pub viewer_can_learn: BTreeSet<String>,
}

impl Matches {
    pub fn is_empty(&self) -> bool {
        self.viewer_can_teach.is_empty() && self.viewer_can_learn.is_empty()
    }
}

pub fn compute_matches(
    viewer_offered: &BTreeSet<String>,
    viewer_wanted: &BTreeSet<String>,
    target_offered: &BTreeSet<String>,
    target_wanted: &BTreeSet<String>,
) -> Matches {
    Matches {
        viewer_can_teach: viewer_offered.intersection(target_wanted).cloned().collect(),
        viewer_can_learn: target_offered.intersection(viewer_wanted).cloned().collect(),
    }
}
