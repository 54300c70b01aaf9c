#[cfg(test)]
mod tests {
    use crate::amx::{InstanceId, VmError};
    use crate::context::{ContextRegistry, PauseReason, ReclaimMarker, TaskId};

    #[test]
    fn test_push_pop_balanced() {
        let contexts = ContextRegistry::new();
        let id = InstanceId::next();

        assert_eq!(contexts.push(id), 1);
        assert_eq!(contexts.push(id), 2);
        assert_eq!(contexts.depth(id), 2);

        assert!(contexts.pop(id).is_some());
        assert!(contexts.pop(id).is_some());
        assert_eq!(contexts.depth(id), 0);
        assert!(contexts.pop(id).is_none());
    }

    #[test]
    fn test_inner_request_leaves_outer_frame_untouched() {
        let contexts = ContextRegistry::new();
        let id = InstanceId::next();

        contexts.push(id);
        assert_eq!(contexts.request_detach(id, ReclaimMarker(7), 1), VmError::Sleep);

        contexts.push(id);
        assert_eq!(contexts.request_await(id, TaskId(3), 9), VmError::Sleep);
        let inner = contexts.pop(id).expect("inner frame");
        assert_eq!(inner.reason, PauseReason::Await);
        assert_eq!(inner.awaiting, Some(TaskId(3)));
        assert_eq!(inner.result, 9);

        let outer = contexts.top(id).expect("outer frame");
        assert_eq!(outer.reason, PauseReason::Detach);
        assert_eq!(outer.reclaim, ReclaimMarker(7));
        assert_eq!(outer.awaiting, None);
    }

    #[test]
    fn test_request_outside_execution_is_invalid() {
        let contexts = ContextRegistry::new();
        let id = InstanceId::next();

        assert_eq!(contexts.request_await(id, TaskId(1), 0), VmError::InvalidState);
        assert_eq!(contexts.request_detach(id, ReclaimMarker(0), 0), VmError::InvalidState);
    }

    #[test]
    fn test_contexts_are_per_instance() {
        let contexts = ContextRegistry::new();
        let a = InstanceId::next();
        let b = InstanceId::next();

        contexts.push(a);
        contexts.push(b);
        contexts.request_await(a, TaskId(5), 0);

        assert_eq!(contexts.top(b).map(|frame| frame.reason), Some(PauseReason::None));
        assert!(contexts.remove(a));
        assert!(!contexts.remove(a));
        assert_eq!(contexts.len(), 1);
    }
}
