#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::amx::{Amx, CELL_BYTES, EXEC_MAIN, VmError, reference};

    fn machine() -> Amx {
        Amx::new(Arc::new(reference::exports()), 256)
    }

    #[test]
    fn test_heap_strings_resolve_and_measure() {
        let mut amx = machine();
        let addr = amx.alloc_string("hello").unwrap();
        assert_eq!(addr, 0);
        assert_eq!(amx.regs.hea, 6 * CELL_BYTES);

        let text = amx.read_string(addr).unwrap();
        assert_eq!(text, "hello".chars().map(|c| c as i32).collect::<Vec<_>>());
    }

    #[test]
    fn test_resolver_rejects_unmapped_addresses() {
        let mut amx = machine();
        amx.alloc_string("x").unwrap();
        // between heap top and stack bottom
        assert_eq!(amx.get_addr(64 * CELL_BYTES), Err(VmError::MemAccess));
        assert_eq!(amx.get_addr(-CELL_BYTES), Err(VmError::MemAccess));
        assert_eq!(amx.get_addr(1), Err(VmError::MemAccess));
        assert!(amx.get_addr(0).is_ok());
    }

    #[test]
    fn test_release_rolls_heap_back() {
        let mut amx = machine();
        let mark = amx.regs.hea;
        let addr = amx.alloc_string("temp").unwrap();
        amx.release(mark);
        assert_eq!(amx.get_addr(addr), Err(VmError::MemAccess));
    }

    #[test]
    fn test_allot_collides_with_stack() {
        let mut amx = machine();
        assert_eq!(amx.allot(300), Err(VmError::StackErr));
        assert_eq!(amx.error, Some(VmError::StackErr));
    }

    #[test]
    fn test_write_string_truncates_to_capacity() {
        let mut amx = machine();
        let buf = amx.allot(4).unwrap();
        let written = amx.write_string(buf, &[1, 2, 3, 4, 5], 4).unwrap();
        assert_eq!(written, 3);
        assert_eq!(amx.read_string(buf).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_exec_runs_main_and_natives() {
        let mut amx = machine();
        amx.register_native("add", |_amx, params| Ok(params.iter().sum()));
        amx.add_public("main", |amx| amx.call_native("add", &[2, 3, 4]));
        assert_eq!(amx.exec(EXEC_MAIN), Ok(9));
        assert_eq!(amx.exec_public("main"), Ok(9));
    }

    #[test]
    fn test_exec_failures_are_recorded() {
        let mut amx = machine();
        assert_eq!(amx.exec(EXEC_MAIN), Err(VmError::Index));
        assert_eq!(amx.exec_public("missing"), Err(VmError::NotFound));

        amx.add_public("main", |amx| amx.call_native("missing", &[]));
        assert_eq!(amx.exec(EXEC_MAIN), Err(VmError::NotFound));
        assert_eq!(amx.error, Some(VmError::NotFound));
    }

    #[test]
    fn test_read_cells_copies_embedded_zeros() {
        let mut amx = machine();
        let addr = amx.alloc_cells(&[7, 0, 9]).unwrap();
        assert_eq!(amx.read_cells(addr, 3).unwrap(), vec![7, 0, 9]);
        assert!(amx.read_cells(addr, 0).unwrap().is_empty());
        assert_eq!(amx.read_cells(1, 2), Err(VmError::MemAccess));
    }

    #[test]
    fn test_resume_token_is_instance_bound() {
        let mut first = machine();
        let mut second = machine();
        first.regs.cip = 128;
        let token = first.resume_token();
        first.regs.cip = 0;

        assert_eq!(second.restore(&token), Err(VmError::InvalidState));
        assert_eq!(first.restore(&token), Ok(()));
        assert_eq!(first.regs.cip, 128);
    }

    #[test]
    fn test_status_codes_round_trip() {
        for err in [VmError::MemAccess, VmError::Callback, VmError::Sleep, VmError::InvalidState] {
            assert_eq!(VmError::from_code(err.code()), Some(err));
        }
        assert_eq!(VmError::from_code(0), None);
        assert_eq!(VmError::from_code(99), Some(VmError::General));
    }
}
