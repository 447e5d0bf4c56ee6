//! Wire data model for the three synchronized collections.
//!
//! Field names follow the backend's camelCase JSON. Display-only fields are
//! optional so partially populated payloads still decode.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// Placeholder code seeded by the client before the server assigns one.
pub const NEW_CODE_PLACEHOLDER: &str = "NEW";

/// Opaque session identifier scoping one editor's traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uid(String);

impl Uid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three synchronized collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Packages,
    Grants,
    Codes,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 3] = [Self::Packages, Self::Grants, Self::Codes];

    /// Path segment used by the per-resource REST endpoints.
    pub fn path_segment(self) -> &'static str {
        match self {
            Self::Packages => "vip",
            Self::Grants => "active",
            Self::Codes => "code",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Packages => "VIP packages",
            Self::Grants => "active grants",
            Self::Codes => "codes",
        })
    }
}

/// Identity of an item within its collection.
pub trait Keyed {
    type Key: Clone + Eq + Hash + fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// A purchasable VIP rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VipPackage {
    pub name: String,
    /// May embed `&x` / `§x` color markup
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub priority: i64,
    /// Seconds; 0 means permanent
    #[serde(default)]
    pub duration: i64,
    /// Epoch milliseconds
    #[serde(default)]
    pub created_at: i64,
}

impl VipPackage {
    /// Display name with color markup removed, falling back to the name.
    pub fn plain_display_name(&self) -> String {
        let plain = strip_color_codes(&self.display_name);
        if plain.trim().is_empty() {
            self.name.clone()
        } else {
            plain
        }
    }
}

impl Keyed for VipPackage {
    type Key = String;

    fn key(&self) -> String {
        self.name.clone()
    }
}

/// Composite identity of an active grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrantKey {
    pub player_unique_id: String,
    pub package_name: String,
}

impl GrantKey {
    pub fn new(player_unique_id: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            player_unique_id: player_unique_id.into(),
            package_name: package_name.into(),
        }
    }

    /// Single path segment identifying the grant in DELETE requests.
    pub fn to_path_key(&self) -> String {
        format!("{}:{}", self.player_unique_id, self.package_name)
    }
}

/// A VIP package currently held by a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveGrant {
    pub player_unique_id: String,
    /// Display only; identity is the unique id
    #[serde(default)]
    pub player_name: String,
    /// May reference a package that no longer exists
    pub package_name: String,
    /// Seconds remaining
    #[serde(default)]
    pub duration: i64,
}

impl ActiveGrant {
    /// Grants with one second or less remaining are treated as expired.
    pub fn is_expired(&self) -> bool {
        self.duration <= 1
    }
}

impl Keyed for ActiveGrant {
    type Key = GrantKey;

    fn key(&self) -> GrantKey {
        GrantKey::new(&self.player_unique_id, &self.package_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodeType {
    Vip,
    Kit,
}

impl fmt::Display for CodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Vip => "VIP",
            Self::Kit => "KIT",
        })
    }
}

/// A redemption code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Code {
    pub code: String,
    #[serde(rename = "type")]
    pub code_type: CodeType,
    /// Package name for VIP codes, kit name for KIT codes
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Code {
    /// A fresh code awaiting a server-generated value.
    pub fn draft(code_type: CodeType, identifier: impl Into<String>) -> Self {
        Self {
            code: NEW_CODE_PLACEHOLDER.to_string(),
            code_type,
            identifier: identifier.into(),
            used: false,
            used_by: None,
            used_at: None,
            email: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.code == NEW_CODE_PLACEHOLDER
    }
}

impl Keyed for Code {
    type Key = String;

    fn key(&self) -> String {
        self.code.clone()
    }
}

/// Initial payload of `GET /v1/pcv/data/{uid}`. Codes are loaded on demand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSnapshot {
    #[serde(default)]
    pub vip_packages: Vec<VipPackage>,
    #[serde(default)]
    pub active_packages: Vec<ActiveGrant>,
}

/// Removes Minecraft-style `&x` and `§x` color/format codes.
pub fn strip_color_codes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if (c == '&' || c == '§')
            && chars
                .peek()
                .is_some_and(|next| next.is_ascii_hexdigit() || "klmnorKLMNOR".contains(*next))
        {
            chars.next();
            continue;
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_snapshot_payload() {
        let json = r#"{
            "vipPackages": [
                {"name": "gold", "displayName": "&6Gold", "group": "vip", "priority": 5, "duration": 2592000, "createdAt": 1700000000000}
            ],
            "activePackages": [
                {"playerUniqueId": "u-1", "playerName": "Steve", "packageName": "gold", "duration": 3600}
            ]
        }"#;
        let snapshot: EditorSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.vip_packages[0].priority, 5);
        assert_eq!(snapshot.vip_packages[0].plain_display_name(), "Gold");
        assert_eq!(
            snapshot.active_packages[0].key(),
            GrantKey::new("u-1", "gold")
        );
    }

    #[test]
    fn code_type_uses_uppercase_wire_names() {
        let code: Code =
            serde_json::from_str(r#"{"code": "ABC", "type": "KIT", "identifier": "starter"}"#).unwrap();
        assert_eq!(code.code_type, CodeType::Kit);
        assert!(!code.used);

        let draft = serde_json::to_value(Code::draft(CodeType::Vip, "gold")).unwrap();
        assert_eq!(draft["type"], "VIP");
        assert_eq!(draft["code"], NEW_CODE_PLACEHOLDER);
        assert!(draft.get("usedBy").is_none());
    }

    #[test]
    fn strips_color_markup() {
        assert_eq!(strip_color_codes("&6&lGold §cVIP"), "Gold VIP");
        assert_eq!(strip_color_codes("Fish & Chips"), "Fish & Chips");
        assert_eq!(strip_color_codes("trailing &"), "trailing &");
    }

    #[test]
    fn expiry_threshold_is_one_second() {
        let mut grant = ActiveGrant {
            player_unique_id: "u".into(),
            player_name: "p".into(),
            package_name: "gold".into(),
            duration: 1,
        };
        assert!(grant.is_expired());
        grant.duration = 2;
        assert!(!grant.is_expired());
    }
}
