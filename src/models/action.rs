use serde::Deserialize;

/// 二要素認証の再確認（ステップアップ）対象となり得る操作の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Purchase,
    Settings,
    Withdraw,
    Other,
}

impl ActionKind {
    /// 2FA 有効アカウントでコードの再入力が必要か
    pub fn requires_step_up(self) -> bool {
        matches!(self, Self::Purchase | Self::Settings | Self::Withdraw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_step_up() {
        assert!(ActionKind::Purchase.requires_step_up());
        assert!(ActionKind::Settings.requires_step_up());
        assert!(ActionKind::Withdraw.requires_step_up());
        assert!(!ActionKind::Other.requires_step_up());
    }

    #[test]
    fn test_deserialize() {
        let kind: ActionKind = serde_json::from_str("\"withdraw\"").unwrap();
        assert_eq!(kind, ActionKind::Withdraw);
        assert!(serde_json::from_str::<ActionKind>("\"refund\"").is_err());
    }
}
