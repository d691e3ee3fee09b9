//! Integration tests for tlm-graph.

use std::sync::Arc;
use std::thread;

use tlm_graph::node_types::{self, hydraulic, mechanic};
use tlm_graph::{GraphError, LogAllocation, NodeFactory, Port, PortKind, PortRef, PortTable};

#[test]
fn two_ports_share_one_node() {
    let factory = NodeFactory::with_builtin();
    let node = Arc::new(factory.create(node_types::HYDRAULIC).unwrap());

    let mut volume = Port::new("P1", node_types::HYDRAULIC).multi();
    let mut orifice = Port::new("P1", node_types::HYDRAULIC);
    volume.set_node(&node).unwrap();
    orifice.set_node(&node).unwrap();
    node.add_connection(PortRef::new("volume", "P1", PortKind::Power));
    node.add_connection(PortRef::new("orifice", "P1", PortKind::Power));

    // C side writes the wave, Q side reads it through its own port
    volume
        .node()
        .unwrap()
        .set_data_value(hydraulic::WAVE_VARIABLE, 4.2e6);
    assert_eq!(
        orifice.node().unwrap().data_value(hydraulic::WAVE_VARIABLE),
        4.2e6
    );
    assert_eq!(node.num_connected_ports(), 2);
}

#[test]
fn invalid_binding_does_not_mutate_port_table() {
    let factory = NodeFactory::with_builtin();
    let mut table = PortTable::new();
    table
        .add_port(Port::new("P1", node_types::MECHANIC), None)
        .unwrap();
    let hyd = Arc::new(factory.create(node_types::HYDRAULIC).unwrap());

    let err = table.port_mut("P1").unwrap().set_node(&hyd).unwrap_err();
    assert!(matches!(err, GraphError::NodeTypeMismatch { .. }));
    assert!(!table.port("P1").unwrap().is_connected());
    assert!(matches!(
        table.port_mut("WrongPort"),
        Err(GraphError::UnknownPort { .. })
    ));
    assert_eq!(table.names(), vec!["P1".to_string()]);
}

#[test]
fn log_round_trip_through_named_lookup() {
    let factory = NodeFactory::with_builtin();
    let node = factory.create(node_types::MECHANIC).unwrap();
    node.set_logging_enabled(true);
    assert_eq!(
        node.pre_allocate_log_space(10),
        LogAllocation::Allocated { slots: 10 }
    );
    for row in 0..10 {
        node.set_data_value(mechanic::VELOCITY, row as f64 * 0.5);
        assert!(node.log_data(row));
    }
    assert!(!node.log_data(10), "row past the allocation must be ignored");

    let id = node.data_id_from_name("Velocity").unwrap();
    let col = node.logged_column(id, 10).unwrap();
    assert_eq!(col.len(), 10);
    assert_eq!(col[9], 4.5);
}

#[test]
fn node_values_are_visible_across_threads() {
    let factory = NodeFactory::with_builtin();
    let node = Arc::new(factory.create(node_types::HYDRAULIC).unwrap());
    let writer = Arc::clone(&node);
    thread::spawn(move || writer.set_data_value(hydraulic::FLOW, 1e-3))
        .join()
        .unwrap();
    assert_eq!(node.data_value(hydraulic::FLOW), 1e-3);
}
