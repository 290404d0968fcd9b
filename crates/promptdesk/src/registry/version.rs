//! Semantic versions, bump kinds and the immutable prompt lineage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DeskError;

// ── BumpKind ───────────────────────────────────────────────────────

/// How significant a change is, as asserted by the author. No
/// compatibility checking is performed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BumpKind {
    Major,
    #[default]
    Minor,
    Patch,
}

impl BumpKind {
    /// Selection order in the commit form.
    pub const ALL: [BumpKind; 3] = [BumpKind::Major, BumpKind::Minor, BumpKind::Patch];

    /// Lowercase name, also accepted by the CLI.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
        }
    }

    /// When to pick this kind.
    pub fn description(self) -> &'static str {
        match self {
            Self::Major => {
                "Use quando fizer mudanças significativas ou incompatíveis no comportamento do agente"
            }
            Self::Minor => {
                "Use quando adicionar funcionalidades ou melhorias que não quebram o comportamento atual"
            }
            Self::Patch => "Use para pequenos ajustes, correções ou refinamentos",
        }
    }

    /// Sample transition shown next to the option.
    pub fn example(self) -> &'static str {
        match self {
            Self::Major => "Ex: Mudança completa na personalidade ou objetivo do agente",
            Self::Minor => "Ex: Adicionar novas instruções ou melhorar respostas",
            Self::Patch => "Ex: Correção de erros gramaticais ou pequenos ajustes de tom",
        }
    }
}

impl fmt::Display for BumpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpKind {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            other => Err(DeskError::Invalid(format!("unknown bump kind '{other}'"))),
        }
    }
}

// ── SemVer ─────────────────────────────────────────────────────────

/// `major.minor.patch` version number of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemVer {
    /// Version given to the first entry of every lineage.
    pub const INITIAL: SemVer = SemVer::new(1, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Next version for the given kind of change. Fails when the bumped
    /// component is already `u32::MAX`.
    ///
    /// ```
    /// use promptdesk::registry::{BumpKind, SemVer};
    ///
    /// let next = SemVer::new(2, 1, 3).bump(BumpKind::Minor).unwrap();
    /// assert_eq!(next, SemVer::new(2, 2, 0));
    /// ```
    pub fn bump(self, kind: BumpKind) -> Result<Self, DeskError> {
        let overflow = || DeskError::Invalid(format!("cannot bump {kind} of version {self}"));
        Ok(match kind {
            BumpKind::Major => Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
            BumpKind::Minor => {
                Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0)
            }
            BumpKind::Patch => Self::new(
                self.major,
                self.minor,
                self.patch.checked_add(1).ok_or_else(overflow)?,
            ),
        })
    }
}

impl Default for SemVer {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Accepts `2.1.0`, `v2.1.0` and the short form `2.1`.
impl FromStr for SemVer {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed.strip_prefix(['v', 'V']).unwrap_or(trimmed);
        let parts: Vec<&str> = body.split('.').collect();
        if !(2..=3).contains(&parts.len()) {
            return Err(DeskError::Invalid(format!("malformed version '{s}'")));
        }
        let mut nums = [0u32; 3];
        for (slot, part) in nums.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| DeskError::Invalid(format!("malformed version '{s}'")))?;
        }
        Ok(Self::new(nums[0], nums[1], nums[2]))
    }
}

impl Serialize for SemVer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── PromptVersion / Prompt ─────────────────────────────────────────

/// An immutable snapshot of a system prompt.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PromptVersion {
    pub version: SemVer,
    pub bump: BumpKind,
    /// Free-text change notes.
    pub notes: String,
    /// Full system-prompt text.
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub author: String,
}

/// A prompt lineage: a title plus an append-only chain of versions.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Prompt {
    pub id: String,
    pub title: String,
    /// Pointer into `versions`.
    pub current_version: SemVer,
    /// Stored oldest first. Never edited in place.
    versions: Vec<PromptVersion>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prompt {
    pub(crate) fn new(id: String, title: String, first: PromptVersion) -> Self {
        let created_at = first.created_at;
        Self {
            id,
            title,
            current_version: first.version,
            versions: vec![first],
            created_at,
            updated_at: created_at,
        }
    }

    /// The version the current-version pointer names. `None` only for a
    /// lineage loaded from a hand-edited snapshot with no versions.
    pub fn current(&self) -> Option<&PromptVersion> {
        self.version(self.current_version)
            .or_else(|| self.versions.last())
    }

    /// Look up a stored version.
    pub fn version(&self, version: SemVer) -> Option<&PromptVersion> {
        self.versions.iter().find(|v| v.version == version)
    }

    /// The highest version in the lineage; new versions bump from here.
    pub fn latest(&self) -> Option<&PromptVersion> {
        self.versions.iter().max_by_key(|v| v.version)
    }

    /// Versions newest first.
    pub fn history(&self) -> impl Iterator<Item = &PromptVersion> {
        self.versions.iter().rev()
    }

    /// Number of stored versions.
    pub fn version_count(&self) -> usize {
        self.versions.len()
    }

    /// Append a version and move the pointer to it.
    pub(crate) fn push(&mut self, version: PromptVersion) {
        self.current_version = version.version;
        self.updated_at = version.created_at;
        self.versions.push(version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_resets_lower_components() {
        let v = SemVer::new(2, 1, 3);
        assert_eq!(v.bump(BumpKind::Major).unwrap(), SemVer::new(3, 0, 0));
        assert_eq!(v.bump(BumpKind::Minor).unwrap(), SemVer::new(2, 2, 0));
        assert_eq!(v.bump(BumpKind::Patch).unwrap(), SemVer::new(2, 1, 4));
    }

    #[test]
    fn bump_at_component_max_is_an_error() {
        let top = SemVer::new(u32::MAX, u32::MAX, u32::MAX);
        for kind in BumpKind::ALL {
            assert!(matches!(top.bump(kind), Err(DeskError::Invalid(_))));
        }
        assert_eq!(
            SemVer::new(u32::MAX, 0, 0).bump(BumpKind::Patch).unwrap(),
            SemVer::new(u32::MAX, 0, 1)
        );
    }

    #[test]
    fn parse_accepts_prefix_and_short_form() {
        assert_eq!("v2.1".parse::<SemVer>().unwrap(), SemVer::new(2, 1, 0));
        assert_eq!("1.5.0".parse::<SemVer>().unwrap(), SemVer::new(1, 5, 0));
        assert!("1".parse::<SemVer>().is_err());
        assert!("1.x.0".parse::<SemVer>().is_err());
        assert!("1.2.3.4".parse::<SemVer>().is_err());
    }

    #[test]
    fn semver_serializes_as_string() {
        let json = serde_json::to_string(&SemVer::new(1, 2, 3)).unwrap();
        assert_eq!(json, "\"1.2.3\"");
        let back: SemVer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SemVer::new(1, 2, 3));
    }

    #[test]
    fn bump_kind_defaults_to_minor() {
        assert_eq!(BumpKind::default(), BumpKind::Minor);
        assert_eq!("PATCH".parse::<BumpKind>().unwrap(), BumpKind::Patch);
        assert!("huge".parse::<BumpKind>().is_err());
    }

    fn version(v: SemVer, text: &str) -> PromptVersion {
        PromptVersion {
            version: v,
            bump: BumpKind::Minor,
            notes: String::new(),
            text: text.into(),
            created_at: Utc::now(),
            author: "tester".into(),
        }
    }

    #[test]
    fn history_is_newest_first_and_pointer_follows_push() {
        let mut prompt = Prompt::new("pr-1".into(), "t".into(), version(SemVer::INITIAL, "a"));
        prompt.push(version(SemVer::new(1, 1, 0), "b"));
        let order: Vec<String> = prompt.history().map(|v| v.version.to_string()).collect();
        assert_eq!(order, vec!["1.1.0", "1.0.0"]);
        assert_eq!(prompt.current().unwrap().text, "b");
        assert_eq!(prompt.latest().unwrap().version, SemVer::new(1, 1, 0));
    }
}
