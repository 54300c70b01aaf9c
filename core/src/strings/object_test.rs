#[cfg(test)]
mod tests {
    use crate::strings::{CreateMode, StringObject};

    fn cells(text: &str) -> Vec<i32> {
        text.chars().map(|c| c as i32).collect()
    }

    #[test]
    fn test_buffer_layout_tracks_edits() {
        let mut s = StringObject::from("ab");
        assert_eq!(s.as_record(), &[2, 'a' as i32, 'b' as i32, 0]);

        s.push('c' as i32);
        s.extend_from_slice(&cells("de"));
        assert_eq!(s.to_string_lossy(), "abcde");
        assert_eq!(s.as_record()[0], 5);
        assert_eq!(s.as_record().last(), Some(&0));

        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.as_record(), &[0, 0]);
    }

    #[test]
    fn test_insert_erase_and_substring() {
        let mut s = StringObject::from("hello world");
        assert!(s.insert(5, &cells(",")));
        assert_eq!(s.to_string_lossy(), "hello, world");
        assert!(!s.insert(100, &cells("x")));

        s.erase(5, 1);
        assert_eq!(s.to_string_lossy(), "hello world");
        s.erase(5, 100);
        assert_eq!(s.to_string_lossy(), "hello");

        assert_eq!(s.substring(1, 3).to_string_lossy(), "ell");
        assert_eq!(s.substring(3, 50).to_string_lossy(), "lo");
        assert!(s.substring(10, 2).is_empty());
    }

    #[test]
    fn test_resize_pads_and_truncates() {
        let mut s = StringObject::from("abc");
        s.resize(5, '.' as i32);
        assert_eq!(s.to_string_lossy(), "abc..");
        assert_eq!(s.as_record()[0], 5);

        s.resize(1, 0);
        assert_eq!(s.to_string_lossy(), "a");
        assert_eq!(s.as_record(), &[1, 'a' as i32, 0]);
    }

    #[test]
    fn test_set_and_case_conversion() {
        let mut s = StringObject::from("MiXeD 42");
        assert!(s.set(0, 'm' as i32));
        assert!(!s.set(8, 'x' as i32));
        assert_eq!(s.get(0), Some('m' as i32));
        assert_eq!(s.get(8), None);

        s.to_upper();
        assert_eq!(s.to_string_lossy(), "MIXED 42");
        s.to_lower();
        assert_eq!(s.to_string_lossy(), "mixed 42");
    }

    #[test]
    fn test_ordering_ignores_header() {
        let short = StringObject::from("b");
        let long = StringObject::from("abc");
        assert!(long < short);
        assert_eq!(StringObject::from("abc"), long);
    }

    #[test]
    fn test_create_modes() {
        let raw = [0x141, 0, 'z' as i32];

        let plain = StringObject::from_vm(&raw, CreateMode::default());
        assert_eq!(plain.as_cells(), &raw);

        let truncated = StringObject::from_vm(&raw, CreateMode::from_flags(CreateMode::TRUNCATE));
        assert_eq!(truncated.as_cells(), &[0x41, 0, 'z' as i32]);

        let both = StringObject::from_vm(&raw, CreateMode::from_flags(CreateMode::TRUNCATE | CreateMode::NO_NULLS));
        assert_eq!(both.as_cells(), &[0x41, CreateMode::NULL_REPLACEMENT, 'z' as i32]);
    }
}
