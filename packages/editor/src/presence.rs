//! Remote collaborator cursors

use scribing_flow::FlowSelection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub user: String,
    pub client: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<FlowSelection>,
}

type PresenceMap<'a> = BTreeMap<&'a str, BTreeMap<&'a str, Option<&'a FlowSelection>>>;

fn presence_map(presence: &[Presence]) -> PresenceMap<'_> {
    let mut map = PresenceMap::new();
    for entry in presence {
        map.entry(entry.user.as_str())
            .or_default()
            .insert(entry.client.as_str(), entry.selection.as_ref());
    }
    map
}

/// Compare presence lists as `user -> client -> selection` maps, ignoring
/// order
pub fn same_presence(a: &[Presence], b: &[Presence]) -> bool {
    presence_map(a) == presence_map(b)
}
