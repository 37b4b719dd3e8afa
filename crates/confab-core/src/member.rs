//! Conversation membership tracking.
//!
//! The [`MemberRegistry`] assigns monotonically increasing member numbers,
//! keeps removed members as tombstones, and answers the two delta queries
//! clients poll with: "who joined after N" and "who left after M".
//! Sequence numbers rather than timestamps make those queries exact and
//! independent of clock skew.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};

/// A participant in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    /// Unique among the *active* members of one registry.
    pub username: String,
    /// Assigned by the registry at add time. Never reused, even after the
    /// member is removed.
    pub member_number: u64,
}

/// A removed member, retained so delta queries can report the removal
/// after the fact. Tombstones are never purged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tombstone {
    /// Position in the registry's deletion sequence (1-based, gapless).
    pub deleted_number: u64,
    pub member: Member,
}

/// The membership set of one conversation.
///
/// Every mutating and delta-query call takes an `acting_username` and
/// fails with [`CoreError::NotMember`] unless that user is currently
/// active. This gate is the conversation's only access-control primitive:
/// only participants can change or inspect membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberRegistry {
    active: BTreeMap<u64, Member>,
    tombstones: BTreeMap<u64, Member>,
    last_member_number: u64,
    last_deleted_number: u64,
}

impl MemberRegistry {
    /// Create a registry from a non-empty initial member list.
    ///
    /// Initial members receive numbers `1..=n` in list order.
    pub fn new<I, S>(initial: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self {
            active: BTreeMap::new(),
            tombstones: BTreeMap::new(),
            last_member_number: 0,
            last_deleted_number: 0,
        };

        for username in initial {
            let username = username.into();
            validate_username(&username)?;
            if registry.is_active(&username) {
                return Err(CoreError::DuplicateMember(username));
            }
            registry.insert_next(username);
        }

        if registry.active.is_empty() {
            return Err(CoreError::InvalidArgument(
                "a conversation needs at least one member".into(),
            ));
        }

        Ok(registry)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Whether `username` is currently an active member.
    pub fn is_active(&self, username: &str) -> bool {
        self.active.values().any(|m| m.username == username)
    }

    /// Look up an active member by username.
    pub fn member_by_username(&self, username: &str) -> Option<&Member> {
        self.active.values().find(|m| m.username == username)
    }

    /// Active members in member-number order.
    pub fn active_members(&self) -> impl Iterator<Item = &Member> {
        self.active.values()
    }

    /// Number of active members.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Highest member number ever assigned.
    pub fn last_member_number(&self) -> u64 {
        self.last_member_number
    }

    /// Highest deletion sequence number ever assigned.
    pub fn last_deleted_number(&self) -> u64 {
        self.last_deleted_number
    }

    /// All tombstones in deletion order.
    pub fn tombstones(&self) -> impl Iterator<Item = Tombstone> + '_ {
        self.tombstones.iter().map(|(seq, member)| Tombstone {
            deleted_number: *seq,
            member: member.clone(),
        })
    }

    pub(crate) fn require_active(&self, acting_username: &str) -> Result<()> {
        if self.is_active(acting_username) {
            Ok(())
        } else {
            Err(CoreError::NotMember(acting_username.to_string()))
        }
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Add a single member.
    ///
    /// Fails with [`CoreError::NotMember`] if `acting_username` is not
    /// active and [`CoreError::DuplicateMember`] if `username` already is.
    pub fn add_member(&mut self, username: &str, acting_username: &str) -> Result<&Member> {
        validate_username(username)?;
        self.require_active(acting_username)?;
        if self.is_active(username) {
            return Err(CoreError::DuplicateMember(username.to_string()));
        }

        let number = self.insert_next(username.to_string());
        debug!(username, number, "member added");
        Ok(&self.active[&number])
    }

    /// Remove a single member, moving them to the tombstone map under the
    /// next deletion sequence number.
    pub fn remove_member(&mut self, username: &str, acting_username: &str) -> Result<()> {
        validate_username(username)?;
        self.require_active(acting_username)?;

        let number = self
            .member_by_username(username)
            .map(|m| m.member_number)
            .ok_or_else(|| CoreError::MemberNotFound(username.to_string()))?;

        let member = self
            .active
            .remove(&number)
            .ok_or_else(|| CoreError::MemberNotFound(username.to_string()))?;

        self.last_deleted_number += 1;
        debug!(
            username,
            deleted_number = self.last_deleted_number,
            "member removed"
        );
        self.tombstones.insert(self.last_deleted_number, member);
        Ok(())
    }

    /// Add a batch of members, all or nothing.
    ///
    /// If any username is already active (or occurs twice in the batch)
    /// the whole batch is rejected with [`CoreError::CouldNotAddMember`]
    /// and the registry is left untouched.
    pub fn add_all_members<S: AsRef<str>>(
        &mut self,
        usernames: &[S],
        acting_username: &str,
    ) -> Result<()> {
        self.require_active(acting_username)?;
        if usernames.is_empty() {
            return Err(CoreError::InvalidArgument("empty member batch".into()));
        }

        // Full pre-check before the first insert keeps the batch atomic.
        let mut pending: Vec<&str> = Vec::with_capacity(usernames.len());
        for username in usernames {
            let username = username.as_ref();
            validate_username(username)?;
            if self.is_active(username) || pending.contains(&username) {
                return Err(CoreError::CouldNotAddMember(username.to_string()));
            }
            pending.push(username);
        }

        for username in pending {
            self.insert_next(username.to_string());
        }
        Ok(())
    }

    /// Remove a batch of members, all or nothing.
    ///
    /// If any username is absent (or occurs twice in the batch) the whole
    /// batch is rejected with [`CoreError::CouldNotRemoveMember`] and the
    /// registry is left untouched.
    pub fn remove_all_members<S: AsRef<str>>(
        &mut self,
        usernames: &[S],
        acting_username: &str,
    ) -> Result<()> {
        self.require_active(acting_username)?;
        if usernames.is_empty() {
            return Err(CoreError::InvalidArgument("empty member batch".into()));
        }

        let mut pending: Vec<&str> = Vec::with_capacity(usernames.len());
        for username in usernames {
            let username = username.as_ref();
            validate_username(username)?;
            if !self.is_active(username) || pending.contains(&username) {
                return Err(CoreError::CouldNotRemoveMember(username.to_string()));
            }
            pending.push(username);
        }

        for username in pending {
            let number = self
                .member_by_username(username)
                .map(|m| m.member_number)
                .ok_or_else(|| CoreError::MemberNotFound(username.to_string()))?;
            let member = self
                .active
                .remove(&number)
                .ok_or_else(|| CoreError::MemberNotFound(username.to_string()))?;
            self.last_deleted_number += 1;
            self.tombstones.insert(self.last_deleted_number, member);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delta queries
    // ------------------------------------------------------------------

    /// Active members whose number is strictly greater than `last_seen`,
    /// in ascending member-number order.
    pub fn check_for_new_members(&self, last_seen: u64, acting_username: &str) -> Result<Vec<Member>> {
        self.require_active(acting_username)?;
        Ok(self
            .active
            .range(last_seen + 1..)
            .map(|(_, m)| m.clone())
            .collect())
    }

    /// Tombstones with a deletion sequence strictly greater than
    /// `last_seen_deleted` -- a contiguous scan from `last_seen_deleted + 1`
    /// to the current deletion sequence.
    pub fn check_for_deleted_members(
        &self,
        last_seen_deleted: u64,
        acting_username: &str,
    ) -> Result<Vec<Tombstone>> {
        self.require_active(acting_username)?;
        Ok(self
            .tombstones
            .range(last_seen_deleted + 1..)
            .map(|(seq, member)| Tombstone {
                deleted_number: *seq,
                member: member.clone(),
            })
            .collect())
    }

    fn insert_next(&mut self, username: String) -> u64 {
        self.last_member_number += 1;
        let number = self.last_member_number;
        self.active.insert(
            number,
            Member {
                username,
                member_number: number,
            },
        );
        number
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.trim().is_empty() {
        return Err(CoreError::InvalidArgument("empty username".into()));
    }
    Ok(())
}
