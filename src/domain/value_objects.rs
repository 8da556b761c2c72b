use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 貸出ID - 貸出ライフサイクルの集約ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanId(Uuid);

impl LoanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for LoanId {
    fn default() -> Self {
        Self::new()
    }
}

/// 書籍ID - 蔵書台帳への参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookId(Uuid);

impl BookId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for BookId {
    fn default() -> Self {
        Self::new()
    }
}

/// 利用者ID - 利用者ディレクトリへの参照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// 延長回数エラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// 延長回数の上限を超えた
    LimitExceeded,
}

/// 延長回数
///
/// 上限は貸出ポリシーで決まるため、増加時に上限を受け取って検証する。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtensionCount(u8);

impl ExtensionCount {
    /// 新規作成（0回）
    pub fn new() -> Self {
        Self(0)
    }

    /// 永続化された値から復元する
    pub fn from_value(value: u8) -> Self {
        Self(value)
    }

    /// 延長回数を増やす
    ///
    /// # エラー
    /// 既に`max`回延長済みの場合は`ExtensionError::LimitExceeded`を返す
    pub fn increment(self, max: u8) -> Result<Self, ExtensionError> {
        if !self.can_extend(max) {
            return Err(ExtensionError::LimitExceeded);
        }
        Ok(Self(self.0 + 1))
    }

    /// 現在の回数
    pub fn value(&self) -> u8 {
        self.0
    }

    /// まだ延長可能か
    pub fn can_extend(&self, max: u8) -> bool {
        self.0 < max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_count_new() {
        let count = ExtensionCount::new();
        assert_eq!(count.value(), 0);
        assert!(count.can_extend(2));
    }

    #[test]
    fn test_extension_count_increment_up_to_max() {
        let count = ExtensionCount::new().increment(2).unwrap();
        assert_eq!(count.value(), 1);

        let count = count.increment(2).unwrap();
        assert_eq!(count.value(), 2);
        assert!(!count.can_extend(2));
    }

    #[test]
    fn test_extension_count_increment_fails_at_max() {
        let count = ExtensionCount::from_value(2);
        let result = count.increment(2);
        assert_eq!(result.unwrap_err(), ExtensionError::LimitExceeded);
    }

    #[test]
    fn test_extension_count_zero_max_never_extends() {
        assert!(!ExtensionCount::new().can_extend(0));
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(LoanId::new(), LoanId::new());
        assert_ne!(BookId::new(), BookId::new());
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn test_id_from_uuid_round_trips_value() {
        let uuid = Uuid::new_v4();
        assert_eq!(LoanId::from_uuid(uuid).value(), uuid);
        assert_eq!(BookId::from_uuid(uuid).value(), uuid);
        assert_eq!(UserId::from_uuid(uuid).value(), uuid);
    }
}
