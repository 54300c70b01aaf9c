#[cfg(test)]
mod tests {
    use crate::amx::{EXEC_CONT, EXEC_MAIN, ExecIndex};

    #[test]
    fn test_special_indices() {
        assert_eq!(ExecIndex::decode(EXEC_MAIN), ExecIndex::Main);
        assert_eq!(ExecIndex::decode(EXEC_CONT), ExecIndex::Continue);
        assert_eq!(ExecIndex::decode(0), ExecIndex::Public(0));
        assert_eq!(ExecIndex::decode(41), ExecIndex::Public(41));
    }

    #[test]
    fn test_synthetic_callback_folding() {
        // -3 - id
        assert_eq!(ExecIndex::decode(-3), ExecIndex::Synthetic(0));
        assert_eq!(ExecIndex::decode(-10), ExecIndex::Synthetic(7));
        assert_eq!(ExecIndex::Synthetic(7).encode(), Some(-10));
        assert_eq!(ExecIndex::decode(i32::MIN), ExecIndex::Synthetic(2_147_483_645));
        assert_eq!(ExecIndex::Synthetic(2_147_483_645).encode(), Some(i32::MIN));
    }

    #[test]
    fn test_unrepresentable_payloads() {
        assert_eq!(ExecIndex::Synthetic(u32::MAX).encode(), None);
        assert_eq!(ExecIndex::Synthetic(2_147_483_646).encode(), None);
        assert_eq!(ExecIndex::Public(u32::MAX).encode(), None);
    }
}
