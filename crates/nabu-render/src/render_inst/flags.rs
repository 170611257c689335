use bitflags::bitflags;

bitflags! {
    /// Per-instance state bits.
    ///
    /// An empty set means the pool slot is free. Every live instance carries
    /// `ALLOCATED`, so hiding an instance never makes it look free.
    #[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
    pub struct InstanceFlags: u32 {
        const ALLOCATED    = 1 << 0;
        /// Submitted by `execute_and_reset`.
        const VISIBLE      = 1 << 1;
        /// Inheritance source pushed with `push_template`.
        const TEMPLATE     = 1 << 2;
        const DRAW_INDEXED = 1 << 3;
    }
}
