use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use super::node::Node;
use crate::packets::ArtPollReply;

/// Result of recording a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Upsert {
    Discovered(Node),
    Updated(Node),
}

/// Nodes keyed by the IP carried in their replies.
///
/// Readers (queries from any task) and the writer (the receive task) share
/// one `RwLock`; no lock is held while listeners run.
#[derive(Debug, Default)]
pub(crate) struct NodeRegistry {
    nodes: RwLock<HashMap<Ipv4Addr, Node>>,
}

impl NodeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn upsert(&self, reply: &ArtPollReply, now: Instant) -> Upsert {
        let mut nodes = self.nodes.write();
        match nodes.get_mut(&reply.ip_address()) {
            Some(node) => {
                node.update(reply, now);
                Upsert::Updated(node.clone())
            }
            None => {
                let node = Node::from_reply(reply, now);
                nodes.insert(node.ip, node.clone());
                Upsert::Discovered(node)
            }
        }
    }

    pub(crate) fn get(&self, ip: Ipv4Addr) -> Option<Node> {
        self.nodes.read().get(&ip).cloned()
    }

    /// Every entry, stale or not, ordered by IP.
    pub(crate) fn all(&self) -> Vec<Node> {
        sorted(self.nodes.read().values().cloned().collect())
    }

    pub(crate) fn active(&self, now: Instant, timeout: Duration) -> Vec<Node> {
        sorted(
            self.nodes
                .read()
                .values()
                .filter(|node| !node.is_stale(now, timeout))
                .cloned()
                .collect(),
        )
    }

    /// Removes and returns the stale entries.
    pub(crate) fn reap(&self, now: Instant, timeout: Duration) -> Vec<Node> {
        let mut nodes = self.nodes.write();
        let stale: Vec<Ipv4Addr> = nodes
            .values()
            .filter(|node| node.is_stale(now, timeout))
            .map(|node| node.ip)
            .collect();
        sorted(stale.iter().filter_map(|ip| nodes.remove(ip)).collect())
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.read().len()
    }
}

fn sorted(mut nodes: Vec<Node>) -> Vec<Node> {
    nodes.sort_by_key(|node| node.ip);
    nodes
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;
    use std::time::{Duration, Instant};

    use super::{NodeRegistry, Upsert};
    use crate::packets::ArtPollReply;

    fn reply(ip: Ipv4Addr, name: &str) -> ArtPollReply {
        let mut reply = ArtPollReply::new();
        reply.set_ip_address(ip).unwrap();
        reply.set_short_name(name).unwrap();
        reply
    }

    #[test]
    fn replies_from_same_ip_update_one_entry() {
        let registry = NodeRegistry::new();
        let ip = Ipv4Addr::new(2, 0, 0, 1);
        let t0 = Instant::now();

        assert!(matches!(
            registry.upsert(&reply(ip, "first"), t0),
            Upsert::Discovered(_)
        ));
        let later = t0 + Duration::from_millis(500);
        match registry.upsert(&reply(ip, "renamed"), later) {
            Upsert::Updated(node) => {
                assert_eq!(node.short_name, "renamed");
                assert_eq!(node.last_seen, later);
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(ip).unwrap().short_name, "renamed");
    }

    #[test]
    fn stale_entries_leave_the_active_view_and_are_reaped() {
        let registry = NodeRegistry::new();
        let timeout = Duration::from_millis(3000);
        let t0 = Instant::now();
        registry.upsert(&reply(Ipv4Addr::new(2, 0, 0, 1), "old"), t0);
        registry.upsert(
            &reply(Ipv4Addr::new(2, 0, 0, 2), "fresh"),
            t0 + Duration::from_millis(2500),
        );

        let now = t0 + Duration::from_millis(3500);
        let active = registry.active(now, timeout);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].short_name, "fresh");
        assert_eq!(registry.all().len(), 2);

        let reaped = registry.reap(now, timeout);
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].ip, Ipv4Addr::new(2, 0, 0, 1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn fresh_reply_resets_the_timeout() {
        let registry = NodeRegistry::new();
        let timeout = Duration::from_millis(3000);
        let ip = Ipv4Addr::new(2, 0, 0, 9);
        let t0 = Instant::now();
        registry.upsert(&reply(ip, "node"), t0);
        registry.upsert(&reply(ip, "node"), t0 + Duration::from_millis(2000));

        let now = t0 + Duration::from_millis(4000);
        assert_eq!(registry.active(now, timeout).len(), 1);
        assert!(registry.reap(now, timeout).is_empty());
    }

    #[test]
    fn all_is_ordered_by_ip() {
        let registry = NodeRegistry::new();
        let now = Instant::now();
        registry.upsert(&reply(Ipv4Addr::new(10, 0, 0, 3), "c"), now);
        registry.upsert(&reply(Ipv4Addr::new(10, 0, 0, 1), "a"), now);
        let names: Vec<_> = registry.all().into_iter().map(|n| n.short_name).collect();
        assert_eq!(names, ["a", "c"]);
    }
}
