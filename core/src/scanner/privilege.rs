/// Whether raw sockets can be opened. Checked once per target, before any I/O.
pub trait PrivilegeCheck: Send + Sync {
    fn has_raw_socket_privilege(&self) -> bool;
}

/// Effective-uid check.
pub struct RootPrivilege;

impl PrivilegeCheck for RootPrivilege {
    fn has_raw_socket_privilege(&self) -> bool {
        is_root::is_root()
    }
}

/// Fixed answer, for callers that already know.
pub struct StaticPrivilege(pub bool);

impl PrivilegeCheck for StaticPrivilege {
    fn has_raw_socket_privilege(&self) -> bool {
        self.0
    }
}
