//! Network/port graph and label-swap-aware path search (spec §4.1).

use nsa_types::{Link, Network, NsaError, Path, Stp};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// Holds `network_id -> Network`. Updates replace the whole map so a
/// reader never observes a partially-applied reload.
pub struct Topology {
    networks: RwLock<HashMap<String, Network>>,
}

impl Default for Topology {
    fn default() -> Self {
        Topology {
            networks: RwLock::new(HashMap::new()),
        }
    }
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_networks(networks: Vec<Network>) -> Self {
        let topo = Self::new();
        topo.replace_all(networks);
        topo
    }

    /// Atomically replaces the entire set of known networks. Built from
    /// a fresh map before the lock is taken, so a panic while assembling
    /// `networks` never leaves the topology half-updated.
    pub fn replace_all(&self, networks: Vec<Network>) {
        let map = networks.into_iter().map(|n| (n.id.clone(), n)).collect();
        *self.networks.write() = map;
    }

    pub fn get_network(&self, network_id: &str) -> Result<Network, NsaError> {
        self.networks
            .read()
            .get(network_id)
            .cloned()
            .ok_or_else(|| NsaError::Topology(format!("no network named {network_id}")))
    }

    pub fn get_port(&self, network_id: &str, port_id: &str) -> Result<nsa_types::Port, NsaError> {
        let network = self.get_network(network_id)?;
        network
            .get_port(port_id)
            .cloned()
            .ok_or_else(|| NsaError::Topology(format!("no port named {port_id} on network {network_id}")))
    }

    /// Given a bidirectional port, returns the `(network_id, port_id)` of
    /// the peer port at the other end of the administrative boundary.
    /// Inbound and outbound must point to the same remote network;
    /// otherwise the topology is corrupt and `None` is returned rather
    /// than guessing.
    pub fn find_demarcation(&self, network_id: &str, bidi_port_id: &str) -> Option<(String, String)> {
        let network = self.get_network(network_id).ok()?;
        let bidi = network.get_bidirectional_port(bidi_port_id)?;

        let inbound_remote = bidi.inbound.remote()?;
        let outbound_remote = bidi.outbound.remote()?;

        if inbound_remote.0 != outbound_remote.0 {
            tracing::warn!(
                network_id,
                bidi_port_id,
                inbound_network = inbound_remote.0,
                outbound_network = outbound_remote.0,
                "bidirectional port's inbound/outbound disagree on remote network; topology is corrupt"
            );
            return None;
        }

        Some((inbound_remote.0.to_string(), outbound_remote.1.to_string()))
    }

    /// Returns candidate Paths from `source_stp` to `dest_stp`, ordered
    /// by hop count ascending. An empty result means "no path found",
    /// which is not itself an error.
    pub fn find_paths(&self, source_stp: &Stp, dest_stp: &Stp, bandwidth: Option<u64>) -> Result<Vec<Path>, NsaError> {
        let src_network = self.get_network(&source_stp.network_id)?;
        let dst_network = self.get_network(&dest_stp.network_id)?;

        let _ = src_network
            .get_port(&source_stp.port_id)
            .ok_or_else(|| NsaError::Topology(format!("no port named {} on network {}", source_stp.port_id, source_stp.network_id)))?;
        let _ = dst_network
            .get_port(&dest_stp.port_id)
            .ok_or_else(|| NsaError::Topology(format!("no port named {} on network {}", dest_stp.port_id, dest_stp.network_id)))?;

        let mut visited = HashSet::new();
        visited.insert(source_stp.network_id.clone());

        let mut paths = self.search(source_stp, dest_stp, &visited, bandwidth)?;
        paths.sort_by_key(Path::hop_count);
        Ok(paths)
    }

    fn search(&self, source_stp: &Stp, dest_stp: &Stp, visited: &HashSet<String>, bandwidth: Option<u64>) -> Result<Vec<Path>, NsaError> {
        let network = self.get_network(&source_stp.network_id)?;

        if source_stp.network_id == dest_stp.network_id {
            return Ok(self
                .direct_link(&network, source_stp, dest_stp, bandwidth)?
                .into_iter()
                .map(|link| Path { links: vec![link] })
                .collect());
        }

        let mut paths = Vec::new();

        for bidi in &network.bidirectional_ports {
            if bidi.id == source_stp.port_id {
                continue;
            }
            let Some((remote_network, remote_port)) = self.find_demarcation(&network.id, &bidi.id) else {
                continue;
            };
            if visited.contains(&remote_network) {
                continue;
            }
            if !Self::has_bandwidth(bidi, bandwidth) {
                continue;
            }

            let via_stp = Stp::new(network.id.clone(), bidi.outbound.id.clone(), bidi.effective_labels());
            let Some(local_link) = self.direct_link(&network, source_stp, &via_stp, bandwidth)? else {
                continue;
            };

            let remote_stp = Stp::new(remote_network.clone(), remote_port, local_link.dst_labels.clone());
            let mut nested_visited = visited.clone();
            nested_visited.insert(remote_network);

            let sub_paths = self.search(&remote_stp, dest_stp, &nested_visited, bandwidth)?;
            for mut sub_path in sub_paths {
                let mut links = vec![local_link.clone()];
                links.append(&mut sub_path.links);
                paths.push(Path { links });
            }
        }

        Ok(paths)
    }

    /// Computes the (at most one) direct link within a single network
    /// between `source_stp` and `dest_stp`, applying the label-swap rule
    /// from spec §4.1 step 2. Returns `None` on empty label intersection
    /// rather than erroring — that's "no path", not a fault.
    fn direct_link(&self, network: &Network, source_stp: &Stp, dest_stp: &Stp, bandwidth: Option<u64>) -> Result<Option<Link>, NsaError> {
        let src_port = network
            .get_port(&source_stp.port_id)
            .ok_or_else(|| NsaError::Topology(format!("no port named {} on network {}", source_stp.port_id, network.id)))?;
        let dst_port = network
            .get_port(&dest_stp.port_id)
            .ok_or_else(|| NsaError::Topology(format!("no port named {} on network {}", dest_stp.port_id, network.id)))?;

        if !Self::port_has_bandwidth(src_port, bandwidth) || !Self::port_has_bandwidth(dst_port, bandwidth) {
            return Ok(None);
        }

        let swappable = source_stp
            .labels
            .iter()
            .any(|l| network.can_swap(l.label_type()))
            || dest_stp.labels.iter().any(|l| network.can_swap(l.label_type()));

        let (src_labels, dst_labels) = if swappable {
            let src_labels = Self::intersect_all(&src_port.labels, &source_stp.labels);
            let dst_labels = Self::intersect_all(&dst_port.labels, &dest_stp.labels);
            (src_labels, dst_labels)
        } else {
            let shared = Self::intersect_all(&src_port.labels, &dst_port.labels);
            let shared = Self::intersect_labels(&shared, &source_stp.labels);
            let shared = Self::intersect_labels(&shared, &dest_stp.labels);
            (shared.clone(), shared)
        };

        if src_labels.is_empty() || dst_labels.is_empty() {
            return Ok(None);
        }

        Ok(Some(Link {
            network_id: network.id.clone(),
            src_port: src_port.id.clone(),
            dst_port: dst_port.id.clone(),
            src_labels,
            dst_labels,
        }))
    }

    /// Intersects every label in `a` against its type-match in `b`,
    /// keeping only label types present (and compatible) in both.
    fn intersect_all(a: &[nsa_types::Label], b: &[nsa_types::Label]) -> Vec<nsa_types::Label> {
        Self::intersect_labels(a, b)
    }

    fn intersect_labels(a: &[nsa_types::Label], b: &[nsa_types::Label]) -> Vec<nsa_types::Label> {
        let mut out = Vec::new();
        for la in a {
            if let Some(lb) = b.iter().find(|l| l.label_type() == la.label_type()) {
                if let Ok(intersected) = la.intersect(lb) {
                    out.push(intersected);
                }
            }
        }
        out
    }

    fn has_bandwidth(bidi: &nsa_types::BidirectionalPort, bandwidth: Option<u64>) -> bool {
        bidi.has_capacity(bandwidth)
    }

    fn port_has_bandwidth(port: &nsa_types::Port, bandwidth: Option<u64>) -> bool {
        port.has_capacity(bandwidth)
    }
}
