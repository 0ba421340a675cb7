//! Service Termination Points and the port/network/link/path graph (spec §3).

use crate::label::Label;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Ingress,
    Egress,
}

/// `(network_id, port_id, labels)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stp {
    pub network_id: String,
    pub port_id: String,
    pub labels: Vec<Label>,
}

impl Stp {
    pub fn new(network_id: impl Into<String>, port_id: impl Into<String>, labels: Vec<Label>) -> Self {
        Stp {
            network_id: network_id.into(),
            port_id: port_id.into(),
            labels,
        }
    }

    /// `urn:ogf:network:<network-name>:<port-id>` per §6's URN
    /// conventions for topology objects. These are persisted and placed
    /// on the wire verbatim; never synthesize a different form.
    pub fn urn(&self) -> String {
        format!("urn:ogf:network:{}:{}", self.network_id, self.port_id)
    }

    /// The single label exactly one label is present (the current
    /// contract per §4.6 step 1); returns `None` otherwise.
    pub fn single_label(&self) -> Option<&Label> {
        match self.labels.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// A unidirectional port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub name: String,
    pub labels: Vec<Label>,
    pub remote_network_id: Option<String>,
    pub remote_port_id: Option<String>,
    pub orientation: Orientation,
    /// Link capacity in Mbps; `None` means unmetered/unlimited. Used by
    /// pathfinding to prune candidates that cannot meet a requested
    /// bandwidth (spec §4.1, scenario 3).
    pub capacity_mbps: Option<u64>,
}

impl Port {
    /// The `(network_id, port_id)` of the peer port at the other end of
    /// the administrative boundary, if this port has one.
    pub fn remote(&self) -> Option<(&str, &str)> {
        match (&self.remote_network_id, &self.remote_port_id) {
            (Some(network_id), Some(port_id)) => Some((network_id.as_str(), port_id.as_str())),
            _ => None,
        }
    }

    /// True iff this port can carry `bandwidth` Mbps; a port with no
    /// declared capacity is treated as unconstrained.
    pub fn has_capacity(&self, bandwidth: Option<u64>) -> bool {
        match (self.capacity_mbps, bandwidth) {
            (Some(capacity), Some(requested)) => capacity >= requested,
            _ => true,
        }
    }
}

/// A bidirectional port, naming its inbound/outbound unidirectional pair.
/// Its effective labels are the intersection of the pair's labels.
#[derive(Debug, Clone)]
pub struct BidirectionalPort {
    pub id: String,
    pub inbound: Port,
    pub outbound: Port,
}

impl BidirectionalPort {
    /// The bidirectional port's usable capacity: the smaller of its two
    /// unidirectional legs, `None` if either leg is unmetered.
    pub fn capacity_mbps(&self) -> Option<u64> {
        match (self.inbound.capacity_mbps, self.outbound.capacity_mbps) {
            (Some(a), Some(b)) => Some(a.min(b)),
            _ => None,
        }
    }

    pub fn has_capacity(&self, bandwidth: Option<u64>) -> bool {
        match (self.capacity_mbps(), bandwidth) {
            (Some(capacity), Some(requested)) => capacity >= requested,
            _ => true,
        }
    }

    /// Intersect inbound/outbound labels by matching label type; types
    /// present on only one side are dropped (they cannot be offered
    /// bidirectionally).
    pub fn effective_labels(&self) -> Vec<Label> {
        let mut out = Vec::new();
        for in_label in &self.inbound.labels {
            if let Some(out_label) = self
                .outbound
                .labels
                .iter()
                .find(|l| l.label_type() == in_label.label_type())
            {
                if let Ok(intersected) = in_label.intersect(out_label) {
                    out.push(intersected);
                }
            }
        }
        out
    }
}

/// `(id, name, ports[], managing_nsa)`. `swappable_label_types` records
/// which label types this network can rewrite on capable switches — the
/// pivot of pathfinding (spec §4.1).
#[derive(Debug, Clone)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub ports: Vec<Port>,
    pub bidirectional_ports: Vec<BidirectionalPort>,
    pub managing_nsa: String,
    pub swappable_label_types: std::collections::HashSet<String>,
}

impl Network {
    pub fn can_swap(&self, label_type: &str) -> bool {
        self.swappable_label_types.contains(label_type)
    }

    pub fn get_port(&self, port_id: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.id == port_id)
    }

    pub fn get_bidirectional_port(&self, port_id: &str) -> Option<&BidirectionalPort> {
        self.bidirectional_ports.iter().find(|p| p.id == port_id)
    }
}

/// Intra-network path element: `(network_id, src_port, dst_port,
/// src_labels, dst_labels)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub network_id: String,
    pub src_port: String,
    pub dst_port: String,
    pub src_labels: Vec<Label>,
    pub dst_labels: Vec<Label>,
}

impl Link {
    pub fn source_stp(&self) -> Stp {
        Stp::new(self.network_id.clone(), self.src_port.clone(), self.src_labels.clone())
    }

    pub fn dest_stp(&self) -> Stp {
        Stp::new(self.network_id.clone(), self.dst_port.clone(), self.dst_labels.clone())
    }
}

/// Ordered sequence of links connecting a source STP to a destination
/// STP, traversing each network at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub links: Vec<Link>,
}

impl Path {
    pub fn source_stp(&self) -> Option<Stp> {
        self.links.first().map(Link::source_stp)
    }

    pub fn dest_stp(&self) -> Option<Stp> {
        self.links.last().map(Link::dest_stp)
    }

    pub fn hop_count(&self) -> usize {
        self.links.len()
    }
}

/// `urn:ogf:network:<network-name>:nsa` for agents (spec §6).
pub fn nsa_urn(network_name: &str) -> String {
    format!("urn:ogf:network:{network_name}:nsa")
}
