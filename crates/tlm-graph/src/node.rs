//! Shared node data: one physical connection point between component ports.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::error::{GraphError, GraphResult};
use crate::port::{PortKind, PortRef};

/// Role of a data slot, used by result consumers to group variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariableCategory {
    #[default]
    Default,
    /// Potential-like quantity (pressure, force, voltage).
    Intensity,
    /// Flow-like quantity (flow, velocity, current).
    Flow,
    /// Wave variable or characteristic impedance.
    Tlm,
    /// Start-up or bookkeeping value, not shown by default.
    Hidden,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataDescription {
    pub id: usize,
    pub name: String,
    pub short_name: String,
    pub unit: String,
    pub category: VariableCategory,
}

/// Domain hook run after [`Node::copy_node_data_values_to`], receiving the
/// source and the target node.
pub type TlmFixup = fn(&Node, &Node);

/// Result of [`Node::pre_allocate_log_space`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogAllocation {
    Allocated { slots: usize },
    /// Allocation failed; logging was switched off for this node.
    Disabled { reason: String },
    NotLogging,
}

#[derive(Debug, Default)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    fn store(&self, v: f64) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }
}

#[derive(Debug, Default)]
struct NodeLog {
    rows: Vec<f64>,
    slots: usize,
}

/// A typed bundle of named scalar values shared by every port bound to it.
///
/// Values live in relaxed atomics: the C and Q stages write disjoint slots
/// and are separated by the scheduler's barriers, so no lock is taken on
/// the per-step path. The log is only written by the logging thread.
#[derive(Debug)]
pub struct Node {
    node_type: String,
    descriptions: Vec<DataDescription>,
    values: Box<[AtomicF64]>,
    fixup: Option<TlmFixup>,
    logging: AtomicBool,
    log: Mutex<NodeLog>,
    connections: Mutex<Vec<PortRef>>,
}

impl Node {
    /// A node with `data_length` zeroed slots. Logging starts disabled.
    pub fn new(node_type: impl Into<String>, data_length: usize) -> Self {
        Self {
            node_type: node_type.into(),
            descriptions: (0..data_length)
                .map(|id| DataDescription {
                    id,
                    ..DataDescription::default()
                })
                .collect(),
            values: (0..data_length).map(|_| AtomicF64::new(0.0)).collect(),
            fixup: None,
            logging: AtomicBool::new(false),
            log: Mutex::new(NodeLog::default()),
            connections: Mutex::new(Vec::new()),
        }
    }

    pub fn set_data_characteristics(
        &mut self,
        id: usize,
        name: impl Into<String>,
        short_name: impl Into<String>,
        unit: impl Into<String>,
        category: VariableCategory,
    ) -> GraphResult<()> {
        let len = self.descriptions.len();
        let desc = self
            .descriptions
            .get_mut(id)
            .ok_or(GraphError::DataIdOutOfRange { id, len })?;
        desc.name = name.into();
        desc.short_name = short_name.into();
        desc.unit = unit.into();
        desc.category = category;
        Ok(())
    }

    pub fn set_tlm_fixup(&mut self, fixup: TlmFixup) {
        self.fixup = Some(fixup);
    }

    pub fn node_type(&self) -> &str {
        &self.node_type
    }

    pub fn data_length(&self) -> usize {
        self.values.len()
    }

    pub fn descriptions(&self) -> &[DataDescription] {
        &self.descriptions
    }

    pub fn description(&self, id: usize) -> Option<&DataDescription> {
        self.descriptions.get(id)
    }

    /// Current value of slot `id`.
    ///
    /// # Panics
    /// If `id >= data_length()`. Component code uses the fixed slot
    /// constants of its node type; use [`Node::try_data_value`] for ids
    /// coming from outside.
    #[inline]
    pub fn data_value(&self, id: usize) -> f64 {
        self.values[id].load()
    }

    /// See [`Node::data_value`] for the panic condition.
    #[inline]
    pub fn set_data_value(&self, id: usize, value: f64) {
        self.values[id].store(value);
    }

    pub fn try_data_value(&self, id: usize) -> GraphResult<f64> {
        self.values
            .get(id)
            .map(AtomicF64::load)
            .ok_or(GraphError::DataIdOutOfRange {
                id,
                len: self.values.len(),
            })
    }

    pub fn try_set_data_value(&self, id: usize, value: f64) -> GraphResult<()> {
        let len = self.values.len();
        self.values
            .get(id)
            .ok_or(GraphError::DataIdOutOfRange { id, len })?
            .store(value);
        Ok(())
    }

    /// Slot id for a variable name or short name; `None` when absent.
    pub fn data_id_from_name(&self, name: &str) -> Option<usize> {
        self.descriptions
            .iter()
            .find(|d| d.name == name || (!d.short_name.is_empty() && d.short_name == name))
            .map(|d| d.id)
    }

    /// Snapshot of all current values.
    pub fn values(&self) -> Vec<f64> {
        self.values.iter().map(AtomicF64::load).collect()
    }

    pub fn set_logging_enabled(&self, enabled: bool) {
        self.logging.store(enabled, Ordering::Relaxed);
    }

    pub fn is_logging_enabled(&self) -> bool {
        self.logging.load(Ordering::Relaxed)
    }

    /// Reserve exactly `n_slots` log rows.
    ///
    /// A node whose buffer cannot be allocated stops logging instead of
    /// failing the run; the caller reports the returned reason.
    pub fn pre_allocate_log_space(&self, n_slots: usize) -> LogAllocation {
        let mut log = self.lock_log();
        log.rows = Vec::new();
        log.slots = 0;
        if !self.is_logging_enabled() {
            return LogAllocation::NotLogging;
        }

        let Some(total) = n_slots.checked_mul(self.values.len()) else {
            self.set_logging_enabled(false);
            return LogAllocation::Disabled {
                reason: format!("{} log slots overflow the address space", n_slots),
            };
        };
        let mut rows = Vec::new();
        if let Err(e) = rows.try_reserve_exact(total) {
            self.set_logging_enabled(false);
            return LogAllocation::Disabled {
                reason: format!("could not allocate {} log slots: {}", n_slots, e),
            };
        }
        rows.resize(total, 0.0);
        log.rows = rows;
        log.slots = n_slots;
        LogAllocation::Allocated { slots: n_slots }
    }

    /// Number of rows the log can hold.
    pub fn log_slots(&self) -> usize {
        self.lock_log().slots
    }

    /// Copy the current values into log row `slot`. Rows beyond the
    /// allocated space are ignored and reported with `false`.
    pub fn log_data(&self, slot: usize) -> bool {
        if !self.is_logging_enabled() {
            return false;
        }
        let mut log = self.lock_log();
        if slot >= log.slots {
            return false;
        }
        let width = self.values.len();
        let row = &mut log.rows[slot * width..(slot + 1) * width];
        for (dst, src) in row.iter_mut().zip(self.values.iter()) {
            *dst = src.load();
        }
        true
    }

    /// The first `n_rows` logged values of slot `id`.
    pub fn logged_column(&self, id: usize, n_rows: usize) -> GraphResult<Vec<f64>> {
        let width = self.values.len();
        if id >= width {
            return Err(GraphError::DataIdOutOfRange { id, len: width });
        }
        let log = self.lock_log();
        let n = n_rows.min(log.slots);
        Ok((0..n).map(|row| log.rows[row * width + id]).collect())
    }

    /// Copy every value into `other`, then let the node type fix up
    /// start-up variables on the target (e.g. wave variable from pressure).
    pub fn copy_node_data_values_to(&self, other: &Node) -> GraphResult<()> {
        if self.node_type != other.node_type || self.values.len() != other.values.len() {
            return Err(GraphError::CopyTypeMismatch {
                from: self.node_type.clone(),
                to: other.node_type.clone(),
            });
        }
        for (dst, src) in other.values.iter().zip(self.values.iter()) {
            dst.store(src.load());
        }
        if let Some(fixup) = self.fixup {
            fixup(self, other);
        }
        Ok(())
    }

    pub fn add_connection(&self, port: PortRef) {
        let mut conns = self.lock_connections();
        if !conns.contains(&port) {
            conns.push(port);
        }
    }

    pub fn remove_connection(&self, port: &PortRef) -> bool {
        let mut conns = self.lock_connections();
        let before = conns.len();
        conns.retain(|p| p != port);
        conns.len() != before
    }

    pub fn connected_ports(&self) -> Vec<PortRef> {
        self.lock_connections().clone()
    }

    pub fn num_connected_ports(&self) -> usize {
        self.lock_connections().len()
    }

    /// The port that drives this node, if the connection has one.
    pub fn write_port(&self) -> Option<PortRef> {
        self.lock_connections()
            .iter()
            .find(|p| p.kind == PortKind::Write)
            .cloned()
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, NodeLog> {
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_connections(&self) -> std::sync::MutexGuard<'_, Vec<PortRef>> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_slot() -> Node {
        let mut n = Node::new("NodeTest", 2);
        n.set_data_characteristics(0, "Pressure", "p", "Pa", VariableCategory::Intensity)
            .unwrap();
        n.set_data_characteristics(1, "Flow", "q", "m^3/s", VariableCategory::Flow)
            .unwrap();
        n
    }

    #[test]
    fn values_and_lookup() {
        let n = two_slot();
        n.set_data_value(1, 2.5);
        assert_eq!(n.data_value(1), 2.5);
        assert_eq!(n.data_id_from_name("Flow"), Some(1));
        assert_eq!(n.data_id_from_name("p"), Some(0));
        assert_eq!(n.data_id_from_name("Temperature"), None);
        assert!(n.try_data_value(5).is_err());
    }

    #[test]
    fn characteristics_out_of_range() {
        let mut n = Node::new("NodeTest", 1);
        let err = n
            .set_data_characteristics(3, "x", "", "", VariableCategory::Default)
            .unwrap_err();
        assert_eq!(err, GraphError::DataIdOutOfRange { id: 3, len: 1 });
    }

    #[test]
    fn logging_respects_capacity() {
        let n = two_slot();
        n.set_logging_enabled(true);
        assert_eq!(
            n.pre_allocate_log_space(3),
            LogAllocation::Allocated { slots: 3 }
        );
        for slot in 0..3 {
            n.set_data_value(0, slot as f64);
            assert!(n.log_data(slot));
        }
        assert!(!n.log_data(3), "one past the end is ignored");
        assert_eq!(n.logged_column(0, 10).unwrap(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn disabled_logging_allocates_nothing() {
        let n = two_slot();
        assert_eq!(n.pre_allocate_log_space(100), LogAllocation::NotLogging);
        assert!(!n.log_data(0));
        assert_eq!(n.log_slots(), 0);
    }

    #[test]
    fn impossible_allocation_disables_logging() {
        let n = two_slot();
        n.set_logging_enabled(true);
        let res = n.pre_allocate_log_space(usize::MAX / 2);
        assert!(matches!(res, LogAllocation::Disabled { .. }), "got {res:?}");
        assert!(!n.is_logging_enabled());
        assert!(!n.log_data(0));
    }

    #[test]
    fn copy_requires_same_type_and_runs_fixup() {
        fn fixup(src: &Node, dst: &Node) {
            dst.set_data_value(1, src.data_value(0) * 10.0);
        }
        let mut a = two_slot();
        a.set_tlm_fixup(fixup);
        let b = two_slot();
        a.set_data_value(0, 3.0);
        a.copy_node_data_values_to(&b).unwrap();
        assert_eq!(b.data_value(0), 3.0);
        assert_eq!(b.data_value(1), 30.0);

        let other = Node::new("NodeOther", 2);
        assert!(a.copy_node_data_values_to(&other).is_err());
    }

    #[test]
    fn connection_bookkeeping() {
        let n = two_slot();
        let w = PortRef::new("source", "out", PortKind::Write);
        let r = PortRef::new("gain", "in", PortKind::Read);
        n.add_connection(w.clone());
        n.add_connection(r.clone());
        n.add_connection(r.clone());
        assert_eq!(n.num_connected_ports(), 2);
        assert_eq!(n.write_port(), Some(w.clone()));
        assert!(n.remove_connection(&w));
        assert_eq!(n.write_port(), None);
    }
}
