#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use vmhook_core::Subsystem;
    use vmhook_core::amx::{Amx, Cell, EXEC_MAIN, VmError, reference};
    use vmhook_core::config::HookConfig;
    use vmhook_core::dispatch::Collaborators;
    use vmhook_core::strings::{CreateMode, NULL_ADDRESS};

    use crate::NativeModule;
    use crate::string::{INVALID_CHAR, StringNatives};

    fn setup() -> (Arc<Subsystem>, Amx) {
        let exports = Arc::new(reference::exports());
        let subsystem = Arc::new(Subsystem::new(
            Arc::clone(&exports),
            HookConfig::default(),
            Collaborators::default(),
        ));
        subsystem.install();
        let mut amx = Amx::new(exports, 512);
        StringNatives::new(Arc::clone(subsystem.pool())).register(&mut amx);
        (subsystem, amx)
    }

    fn cells(text: &str) -> Vec<Cell> {
        text.chars().map(|c| c as Cell).collect()
    }

    #[test]
    fn test_new_len_and_get() -> Result<()> {
        let (_subsystem, mut amx) = setup();
        let src = amx.alloc_string("Hello")?;
        let id = amx.call_native("str_new", &[src])?;
        assert_eq!(amx.call_native("str_len", &[id])?, 5);

        let buf = amx.allot(4)?;
        assert_eq!(amx.call_native("str_get", &[id, buf, 4])?, 3);
        assert_eq!(amx.read_string(buf)?, cells("Hel"));

        assert_eq!(amx.call_native("str_get", &[id, buf, 4, 3])?, 2);
        assert_eq!(amx.read_string(buf)?, cells("lo"));
        Ok(())
    }

    #[test]
    fn test_address_reads_current_contents() -> Result<()> {
        let (_subsystem, mut amx) = setup();
        let src = amx.alloc_string("ab")?;
        let id = amx.call_native("str_new", &[src])?;
        let addr = amx.call_native("str_addr", &[id])?;
        assert_eq!(amx.read_string(addr)?, cells("ab"));

        let tail = amx.alloc_string("cdefgh")?;
        let other = amx.call_native("str_new", &[tail])?;
        assert_eq!(amx.call_native("str_append", &[id, other])?, id);
        assert_eq!(amx.read_string(addr)?, cells("abcdefgh"));

        let record = amx.call_native("str_buf_addr", &[id])?;
        assert_eq!(amx.read_cells(record, 2)?, vec![8, Cell::from(b'a')]);

        // a pooled address is as good as a heap one for other natives
        let copy = amx.call_native("str_new", &[addr])?;
        assert_eq!(amx.call_native("str_len", &[copy])?, 8);
        Ok(())
    }

    #[test]
    fn test_null_string_handling() -> Result<()> {
        let (_subsystem, mut amx) = setup();
        assert_eq!(amx.call_native("str_addr", &[0])?, NULL_ADDRESS);
        assert_eq!(amx.call_native("str_len", &[0])?, 0);
        assert_eq!(amx.call_native("str_valid", &[0])?, 0);

        let src = amx.alloc_string("x")?;
        let id = amx.call_native("str_new", &[src])?;
        let joined = amx.call_native("str_cat", &[0, id])?;
        assert_ne!(joined, id);
        assert_eq!(amx.call_native("str_len", &[joined])?, 1);

        let empty = amx.call_native("str_to_upper", &[0])?;
        assert_eq!(amx.call_native("str_len", &[empty])?, 0);
        Ok(())
    }

    #[test]
    fn test_invalid_ids_are_logic_errors() -> Result<()> {
        let (_subsystem, mut amx) = setup();
        assert_eq!(amx.call_native("str_len", &[99]), Err(VmError::Native));
        assert_eq!(amx.error, Some(VmError::Native));
        assert_eq!(amx.call_native("str_acquire", &[0]), Err(VmError::Native));
        assert_eq!(amx.call_native("str_addr", &[-4]), Err(VmError::Native));
        assert_eq!(amx.call_native("str_len", &[]), Err(VmError::Native));

        let src = amx.alloc_string("gone")?;
        let id = amx.call_native("str_new", &[src])?;
        assert_eq!(amx.call_native("str_delete", &[id])?, 1);
        assert_eq!(amx.call_native("str_delete", &[id]), Err(VmError::Native));
        assert_eq!(amx.call_native("str_valid", &[id])?, 0);
        Ok(())
    }

    #[test]
    fn test_char_access() -> Result<()> {
        let (_subsystem, mut amx) = setup();
        let src = amx.alloc_string("cat")?;
        let id = amx.call_native("str_new", &[src])?;

        assert_eq!(amx.call_native("str_getc", &[id, 1])?, Cell::from(b'a'));
        assert_eq!(amx.call_native("str_setc", &[id, 0, Cell::from(b'b')])?, Cell::from(b'c'));
        assert_eq!(amx.call_native("str_getc", &[id, 0])?, Cell::from(b'b'));

        assert_eq!(amx.call_native("str_getc", &[id, 3])?, INVALID_CHAR);
        assert_eq!(amx.call_native("str_getc", &[id, -1])?, INVALID_CHAR);
        assert_eq!(amx.call_native("str_setc", &[77, 0, 0])?, INVALID_CHAR);
        Ok(())
    }

    #[test]
    fn test_creation_modes_and_buffers() -> Result<()> {
        let (_subsystem, mut amx) = setup();
        let arr = amx.alloc_cells(&[0x141, 0, Cell::from(b'z')])?;
        let flags = CreateMode::TRUNCATE | CreateMode::NO_NULLS;
        let id = amx.call_native("str_new_arr", &[arr, 3, flags])?;
        assert_eq!(amx.call_native("str_len", &[id])?, 3);
        assert_eq!(amx.call_native("str_getc", &[id, 0])?, 0x41);
        assert_eq!(amx.call_native("str_getc", &[id, 1])?, CreateMode::NULL_REPLACEMENT);

        let buf = amx.call_native("str_new_buf", &[5])?;
        assert_eq!(amx.call_native("str_len", &[buf])?, 4);
        assert_eq!(amx.call_native("str_new_buf", &[0]), Err(VmError::Native));
        Ok(())
    }

    #[test]
    fn test_edits() -> Result<()> {
        let (_subsystem, mut amx) = setup();
        let src = amx.alloc_string("MiXed")?;
        let id = amx.call_native("str_new", &[src])?;

        let upper = amx.call_native("str_to_upper", &[id])?;
        let lower = amx.call_native("str_to_lower", &[id])?;
        let upper_addr = amx.call_native("str_addr", &[upper])?;
        let lower_addr = amx.call_native("str_addr", &[lower])?;
        assert_eq!(amx.read_string(upper_addr)?, cells("MIXED"));
        assert_eq!(amx.read_string(lower_addr)?, cells("mixed"));

        let clone = amx.call_native("str_clone", &[id])?;
        amx.call_native("str_resize", &[clone, 7, Cell::from(b'!')])?;
        let clone_addr = amx.call_native("str_addr", &[clone])?;
        assert_eq!(amx.read_string(clone_addr)?, cells("MiXed!!"));
        assert_eq!(amx.call_native("str_resize", &[clone, -1]), Err(VmError::Native));

        amx.call_native("str_clear", &[id])?;
        assert_eq!(amx.call_native("str_len", &[id])?, 0);
        Ok(())
    }

    #[test]
    fn test_acquired_strings_outlive_execution() -> Result<()> {
        let (subsystem, mut amx) = setup();
        amx.add_public("main", |amx| {
            let src = amx.alloc_string("kept")?;
            let kept = amx.call_native("str_new", &[src])?;
            amx.call_native("str_acquire", &[kept])?;
            amx.call_native("str_new", &[src])?;
            Ok(kept)
        });

        let kept = amx.exec(EXEC_MAIN)?;
        assert_eq!(subsystem.pool().len(), 1);
        assert_eq!(amx.call_native("str_valid", &[kept])?, 1);

        amx.call_native("str_release", &[kept])?;
        assert_eq!(amx.call_native("str_valid", &[kept])?, 0);
        assert!(subsystem.pool().is_empty());
        Ok(())
    }
}
