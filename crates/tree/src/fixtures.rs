//! A small network-device model and matching instance data, shared by unit
//! tests, integration tests and benchmarks across the workspace.

use crate::data::DataTree;
use crate::schema::SchemaTree;
use std::sync::Arc;

pub const SCHEMA_JSON: &str = r#"[
  {
    "name": "example",
    "namespace": "urn:example",
    "prefix": "ex",
    "identities": [
      { "name": "iface-type" },
      { "name": "ethernet", "bases": ["iface-type"] },
      { "name": "fast-ethernet", "bases": ["ethernet"] },
      { "name": "loopback", "bases": ["ex:iface-type"] }
    ],
    "nodes": [
      {
        "kind": "container", "name": "interfaces",
        "children": [
          {
            "kind": "list", "name": "interface", "key": ["name"],
            "children": [
              { "kind": "leaf", "name": "name", "type": { "base": "string" } },
              { "kind": "leaf", "name": "type", "type": { "base": "identityref", "bases": ["iface-type"] } },
              { "kind": "leaf", "name": "enabled", "type": { "base": "boolean" } },
              {
                "kind": "leaf", "name": "mtu", "type": { "base": "integer" },
                "must": [{ "condition": ". >= 68", "error-message": "MTU too small" }]
              },
              { "kind": "leaf-list", "name": "address", "type": { "base": "string" } },
              { "kind": "leaf", "name": "flags", "type": { "base": "bits", "bits": ["up", "broadcast", "loopback"] } },
              {
                "kind": "leaf", "name": "oper-status", "config": false,
                "type": {
                  "base": "enumeration",
                  "enums": [
                    { "name": "up", "value": 1 },
                    { "name": "down" },
                    { "name": "testing", "value": 10 },
                    { "name": "unknown" }
                  ]
                }
              }
            ]
          }
        ]
      },
      {
        "kind": "container", "name": "routing",
        "children": [
          {
            "kind": "leaf", "name": "default-interface",
            "type": { "base": "leafref", "path": "/ex:interfaces/ex:interface/ex:name" }
          },
          { "kind": "leaf", "name": "next-hop", "type": { "base": "instance-identifier" } },
          {
            "kind": "choice", "name": "mode",
            "children": [
              { "kind": "case", "name": "static", "children": [
                { "kind": "leaf", "name": "static-route", "type": { "base": "string" } }
              ] },
              { "kind": "case", "name": "dynamic", "children": [
                { "kind": "leaf", "name": "protocol", "type": { "base": "string" } }
              ] }
            ]
          }
        ]
      },
      {
        "kind": "container", "name": "system",
        "must": [{ "condition": "count(../interfaces/interface) > 0", "error-message": "no interfaces" }],
        "children": [
          { "kind": "leaf", "name": "hostname", "type": { "base": "string" },
            "when": "../../interfaces/interface[name = 'eth0']" },
          { "kind": "leaf", "name": "contact", "type": { "base": "string" } }
        ]
      },
      {
        "kind": "uses", "name": "extras-grouping", "when": "ex:system/ex:hostname",
        "children": [
          { "kind": "container", "name": "extras", "children": [
            { "kind": "leaf", "name": "note", "type": { "base": "string" } }
          ] }
        ]
      },
      {
        "kind": "rpc", "name": "reset",
        "children": [
          { "kind": "input", "children": [
            { "kind": "leaf", "name": "delay", "type": { "base": "integer" } }
          ] },
          { "kind": "output", "children": [
            { "kind": "leaf", "name": "status", "type": { "base": "string" } }
          ] }
        ]
      }
    ]
  },
  {
    "name": "ext",
    "namespace": "urn:ext",
    "prefix": "ext",
    "augments": [
      {
        "target": "/ex:interfaces/ex:interface",
        "when": "derived-from(ex:type, 'ex:ethernet')",
        "children": [
          { "kind": "leaf", "name": "speed", "type": { "base": "integer" } }
        ]
      }
    ]
  }
]"#;

pub const DATA_JSON: &str = r#"{
  "example:interfaces": {
    "interface": [
      {
        "@": { "ietf-origin:origin": "intended" },
        "name": "eth0",
        "type": "example:ethernet",
        "enabled": true,
        "mtu": 1500,
        "@mtu": { "ietf-origin:origin": "system" },
        "address": ["10.0.0.1", "10.0.0.2"],
        "flags": "up broadcast",
        "oper-status": "up"
      },
      {
        "name": "eth1",
        "type": "example:fast-ethernet",
        "enabled": false,
        "mtu": 9000,
        "address": ["10.0.1.1"],
        "oper-status": "down",
        "ext:speed": 100
      }
    ]
  },
  "example:routing": {
    "default-interface": "eth1",
    "next-hop": "/example:interfaces/example:interface[example:name='eth0']/example:mtu",
    "static-route": "10.0.0.0/8"
  },
  "example:system": {
    "hostname": "r1"
  }
}"#;

pub fn schema() -> Arc<SchemaTree> {
    Arc::new(SchemaTree::from_json(SCHEMA_JSON).expect("fixture schema is valid"))
}

pub fn data() -> DataTree {
    DataTree::from_json(schema(), DATA_JSON).expect("fixture data is valid")
}

pub fn data_with(schema: Arc<SchemaTree>) -> DataTree {
    DataTree::from_json(schema, DATA_JSON).expect("fixture data is valid")
}
