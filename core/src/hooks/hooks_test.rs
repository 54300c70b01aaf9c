#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::{Arc, Weak};

    use crate::amx::{Export, ExportTable, reference};
    use crate::hooks::HookTable;
    use crate::subsystem::HookState;

    fn table() -> (Arc<ExportTable>, HookTable) {
        let exports = Arc::new(reference::exports());
        let hooks = HookTable::new(&exports, Weak::<HookState>::new());
        (exports, hooks)
    }

    fn slot_is_detour(exports: &ExportTable, hooks: &HookTable) -> bool {
        Arc::ptr_eq(&*exports.get_addr_slot().read(), &hooks.get_addr.detour)
    }

    #[test]
    fn test_install_twice_is_noop() {
        let (exports, hooks) = table();
        assert!(hooks.get_addr.install());
        assert!(!hooks.get_addr.install());
        assert!(slot_is_detour(&exports, &hooks));
        assert_eq!(hooks.install(), 3);
        assert_eq!(hooks.install(), 0);
    }

    #[test]
    fn test_remove_twice_does_not_fail() {
        let (exports, hooks) = table();
        assert_eq!(hooks.remove(), 0);
        hooks.install();
        assert_eq!(hooks.remove(), 4);
        assert_eq!(hooks.remove(), 0);
        assert!(Arc::ptr_eq(&*exports.get_addr_slot().read(), &hooks.get_addr.original));
    }

    #[test]
    fn test_toggle_single_entry() {
        let (_exports, hooks) = table();
        assert!(hooks.toggle(Export::StrLen, true));
        assert!(hooks.is_installed(Export::StrLen));
        assert!(!hooks.is_installed(Export::Exec));
        assert!(hooks.toggle(Export::StrLen, false));
        assert!(!hooks.toggle(Export::StrLen, false));
    }

    #[test]
    fn test_original_call_reinstalls_only_if_installed() {
        let (exports, hooks) = table();
        hooks.get_addr.install();
        {
            let _original = hooks.get_addr.original_call();
            assert!(!hooks.get_addr.is_installed());
            assert!(!slot_is_detour(&exports, &hooks));
        }
        assert!(hooks.get_addr.is_installed());
        assert!(slot_is_detour(&exports, &hooks));

        hooks.get_addr.remove();
        drop(hooks.get_addr.original_call());
        assert!(!hooks.get_addr.is_installed());
    }

    #[test]
    fn test_remove_during_original_call_sticks() {
        let (exports, hooks) = table();
        hooks.get_addr.install();
        {
            let _original = hooks.get_addr.original_call();
            assert!(hooks.get_addr.is_wanted());
            assert!(hooks.get_addr.remove());
            assert!(!hooks.get_addr.remove());
        }
        assert!(!hooks.get_addr.is_installed());
        assert!(!hooks.get_addr.is_wanted());
        assert!(!slot_is_detour(&exports, &hooks));
        assert!(!hooks.get_addr.reattach());
    }

    #[test]
    fn test_install_during_original_call_takes_effect_at_once() {
        let (exports, hooks) = table();
        {
            let _original = hooks.get_addr.original_call();
            assert!(hooks.get_addr.install());
            assert!(slot_is_detour(&exports, &hooks));
        }
        assert!(hooks.get_addr.is_installed());
    }

    #[test]
    fn test_original_call_reinstalls_on_unwind() {
        let (exports, hooks) = table();
        hooks.get_addr.install();
        let result = catch_unwind(AssertUnwindSafe(|| {
            let _original = hooks.get_addr.original_call();
            panic!("original entry failed");
        }));
        assert!(result.is_err());
        assert!(hooks.get_addr.is_installed());
        assert!(slot_is_detour(&exports, &hooks));
    }

    #[test]
    fn test_dead_state_falls_back_to_original() {
        let (exports, hooks) = table();
        hooks.install();
        let mut amx = crate::amx::Amx::new(Arc::clone(&exports), 16);
        amx.add_public("main", |_amx| Ok(3));
        assert_eq!(amx.exec_public("main"), Ok(3));
        assert!(amx.get_addr(0x4000_0010).is_err());
    }
}
