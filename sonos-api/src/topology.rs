//! Household topology
//!
//! `GetZoneGroupState` returns every group in the household. The dashboard
//! only needs the display name of each group and the coordinator's address,
//! since transport commands must go to the coordinator.

use serde::Deserialize;

use crate::error::{ApiError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename = "ZoneGroupState")]
struct ZoneGroupStateDocument {
    #[serde(rename = "ZoneGroups")]
    zone_groups: ZoneGroupList,
}

/// Older firmware returns `<ZoneGroups>` as the root element.
#[derive(Debug, Default, Deserialize)]
struct ZoneGroupList {
    #[serde(rename = "ZoneGroup", default)]
    groups: Vec<RawZoneGroup>,
}

#[derive(Debug, Deserialize)]
struct RawZoneGroup {
    #[serde(rename = "@Coordinator")]
    coordinator: String,
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "ZoneGroupMember", default)]
    members: Vec<RawMember>,
}

#[derive(Debug, Deserialize)]
struct RawMember {
    #[serde(rename = "@UUID")]
    uuid: String,
    #[serde(rename = "@Location")]
    location: String,
    #[serde(rename = "@ZoneName")]
    zone_name: String,
    /// Set on home theater satellites and subs
    #[serde(rename = "@Invisible", default)]
    invisible: Option<String>,
}

/// A group of speakers playing in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneGroup {
    pub id: String,
    /// Coordinator room name, plus ` + N` when N other rooms are grouped in
    pub name: String,
    pub coordinator_uuid: String,
    /// Coordinator address as `ip:port`
    pub host: String,
    /// Room names of the visible members, coordinator first
    pub members: Vec<String>,
}

/// Decode an (already unescaped) `ZoneGroupState` document.
///
/// Groups whose coordinator is missing from the member list are skipped.
pub fn parse_zone_groups(xml: &str) -> Result<Vec<ZoneGroup>> {
    let list = match quick_xml::de::from_str::<ZoneGroupStateDocument>(xml) {
        Ok(document) => document.zone_groups,
        Err(_) => quick_xml::de::from_str::<ZoneGroupList>(xml)
            .map_err(|e| ApiError::ParseError(format!("invalid ZoneGroupState: {e}")))?,
    };

    Ok(list.groups.into_iter().filter_map(into_group).collect())
}

fn into_group(raw: RawZoneGroup) -> Option<ZoneGroup> {
    let visible: Vec<&RawMember> = raw
        .members
        .iter()
        .filter(|m| m.invisible.as_deref() != Some("1"))
        .collect();
    let coordinator = raw.members.iter().find(|m| m.uuid == raw.coordinator)?;
    let host = location_host(&coordinator.location)?;

    let mut members = vec![coordinator.zone_name.clone()];
    members.extend(
        visible
            .iter()
            .filter(|m| m.uuid != raw.coordinator)
            .map(|m| m.zone_name.clone()),
    );

    let name = match members.len() {
        1 => coordinator.zone_name.clone(),
        n => format!("{} + {}", coordinator.zone_name, n - 1),
    };

    Some(ZoneGroup {
        id: raw.id,
        name,
        coordinator_uuid: raw.coordinator,
        host,
        members,
    })
}

fn location_host(location: &str) -> Option<String> {
    let authority = location.split("//").nth(1)?.split('/').next()?;
    (!authority.is_empty()).then(|| authority.to_string())
}

/// First group whose display name starts with `prefix`.
pub fn find_group<'a>(groups: &'a [ZoneGroup], prefix: &str) -> Option<&'a ZoneGroup> {
    groups.iter().find(|g| g.name.starts_with(prefix))
}
