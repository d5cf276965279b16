//! Utilities to debug simulation.
//!
//! The key type here is [`BreakpointTable`], a mapping from addresses to [`BreakpointInfo`].
//! The debugger keeps two of them: one for persistent breakpoints
//! and one for temporary breakpoints (which are removed as soon as they are hit).
use std::collections::BTreeMap;

/// The state of one breakpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointInfo {
    /// Whether this breakpoint can stop execution.
    pub enabled: bool,
    /// The number of times this breakpoint stopped execution.
    pub hit_count: u64
}
impl Default for BreakpointInfo {
    fn default() -> Self {
        Self { enabled: true, hit_count: 0 }
    }
}

/// A set of breakpoints, keyed by address.
///
/// ```
/// use chip8_dbg::sim::debug::BreakpointTable;
///
/// let mut table = BreakpointTable::new();
/// table.insert(0x200);
/// assert!(table.hit(0x200));
/// assert!(!table.hit(0x202));
///
/// table.set_enabled(0x200, false);
/// assert!(!table.hit(0x200));
/// assert_eq!(table.get(0x200).map(|bp| bp.hit_count), Some(1));
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BreakpointTable(BTreeMap<u16, BreakpointInfo>);

impl BreakpointTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Default::default()
    }

    /// Adds an enabled breakpoint at the given address.
    ///
    /// If one already exists there, it is enabled and its hit count is kept.
    pub fn insert(&mut self, addr: u16) {
        self.0.entry(addr).or_default().enabled = true;
    }

    /// Removes the breakpoint at the given address, returning it if it existed.
    pub fn remove(&mut self, addr: u16) -> Option<BreakpointInfo> {
        self.0.remove(&addr)
    }

    /// Enables or disables the breakpoint at the given address.
    ///
    /// This returns false if there is no breakpoint there.
    pub fn set_enabled(&mut self, addr: u16, enabled: bool) -> bool {
        match self.0.get_mut(&addr) {
            Some(bp) => {
                bp.enabled = enabled;
                true
            },
            None => false,
        }
    }

    /// Gets the breakpoint at the given address.
    pub fn get(&self, addr: u16) -> Option<&BreakpointInfo> {
        self.0.get(&addr)
    }

    /// Whether there is a breakpoint (enabled or not) at the given address.
    pub fn contains(&self, addr: u16) -> bool {
        self.0.contains_key(&addr)
    }

    /// Checks whether an enabled breakpoint sits at the given address,
    /// counting the hit if so.
    pub fn hit(&mut self, addr: u16) -> bool {
        match self.0.get_mut(&addr) {
            Some(bp) if bp.enabled => {
                bp.hit_count += 1;
                true
            },
            _ => false,
        }
    }

    /// Iterates over every breakpoint in address order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, &BreakpointInfo)> + '_ {
        self.0.iter().map(|(&addr, bp)| (addr, bp))
    }

    /// The number of breakpoints in the table.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
