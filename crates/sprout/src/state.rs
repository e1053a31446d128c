//! Authenticated player snapshot.

use parking_lot::RwLock;

use crate::proto::BasicInfo;

/// Copy of the account fields the schedulers read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub gid: i64,
    pub name: String,
    pub level: i64,
    pub gold: i64,
    pub exp: i64,
}

/// What changed when a basic-info push was applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountDelta {
    pub level_from: i64,
    pub level_to: i64,
    pub gold_gained: i64,
}

impl AccountDelta {
    pub fn leveled_up(&self) -> bool {
        self.level_to > self.level_from
    }
}

/// Shared account state. Written by login and push handlers, read by
/// every scheduler tick.
#[derive(Debug, Default)]
pub struct UserState {
    inner: RwLock<Account>,
}

impl UserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, account: Account) {
        *self.inner.write() = account;
    }

    pub fn snapshot(&self) -> Account {
        self.inner.read().clone()
    }

    pub fn gid(&self) -> i64 {
        self.inner.read().gid
    }

    pub fn level(&self) -> i64 {
        self.inner.read().level
    }

    pub fn gold(&self) -> i64 {
        self.inner.read().gold
    }

    pub fn exp(&self) -> i64 {
        self.inner.read().exp
    }

    /// True once a login has assigned a player id.
    pub fn is_valid(&self) -> bool {
        self.inner.read().gid > 0
    }

    /// Applies a basic-info push. Only positive fields overwrite, since the
    /// server sends partial records with zeroed gaps.
    pub fn apply_basic(&self, basic: &BasicInfo) -> AccountDelta {
        let mut account = self.inner.write();
        let mut delta = AccountDelta {
            level_from: account.level,
            level_to: account.level,
            gold_gained: 0,
        };

        if basic.level > 0 {
            account.level = basic.level;
            delta.level_to = basic.level;
        }
        if basic.gold > 0 {
            delta.gold_gained = basic.gold - account.gold;
            account.gold = basic.gold;
        }
        if basic.exp > 0 {
            account.exp = basic.exp;
        }
        if !basic.name.is_empty() {
            account.name = basic.name.clone();
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> UserState {
        let state = UserState::new();
        state.set(Account {
            gid: 7,
            name: "farmer".into(),
            level: 10,
            gold: 500,
            exp: 1200,
        });
        state
    }

    #[test]
    fn test_zero_fields_do_not_overwrite() {
        let state = seeded();
        let delta = state.apply_basic(&BasicInfo {
            gold: 800,
            ..Default::default()
        });

        let account = state.snapshot();
        assert_eq!(account.level, 10);
        assert_eq!(account.exp, 1200);
        assert_eq!(account.gold, 800);
        assert_eq!(delta.gold_gained, 300);
        assert!(!delta.leveled_up());
    }

    #[test]
    fn test_level_up_is_reported() {
        let state = seeded();
        let delta = state.apply_basic(&BasicInfo {
            level: 11,
            exp: 1500,
            ..Default::default()
        });

        assert!(delta.leveled_up());
        assert_eq!(state.level(), 11);
        assert_eq!(state.exp(), 1500);
    }

    #[test]
    fn test_validity_follows_gid() {
        assert!(!UserState::new().is_valid());
        assert!(seeded().is_valid());
    }
}
