//! Line-oriented TCP client for HAProxy's runtime API.
//!
//! The managed instances run with `stats socket ipv4@0.0.0.0:9000 level
//! admin` and a single backend `nodes` of 1024 pre-declared, disabled
//! server-template slots. Backend membership is changed by re-pointing a
//! free slot at an address and flipping its state, never by reloading the
//! configuration.

use crate::error::{HaproxyError, Result};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// Admin-level runtime socket of managed instances
pub const RUNTIME_PORT: u16 = 9000;

/// The single backend all managed instances expose
pub const BACKEND: &str = "nodes";

/// Slots pre-declared by the load-balancer recipe's server-template
pub const MAX_SLOTS: usize = 1024;

const IO_TIMEOUT: Duration = Duration::from_secs(10);

// `show servers state` format version this client understands. The field
// encoding below is only valid for this version, so anything else is a
// protocol error rather than a guess.
const STATE_VERSION: &str = "1";
const STATE_FIELDS: usize = 19;

// Positional fields of a version-1 state line
const FIELD_SRV_NAME: usize = 3;
const FIELD_SRV_ADDR: usize = 4;
const FIELD_OP_STATE: usize = 5;
const FIELD_ADMIN_STATE: usize = 6;

// A slot is active iff it is operationally running and admin-ready; any
// other combination marks it free for reuse.
const OP_STATE_RUNNING: &str = "2";
const ADMIN_STATE_READY: &str = "4";

/// Per-reconcile projection of the backend's server-template slots.
///
/// Active slots bucket by bound address; free slot names queue in template
/// order. Writers mutate the free list in place so two adds within one
/// reconcile cannot hand out the same slot.
#[derive(Debug, Clone, Default)]
pub struct SlotTable {
    bound: HashMap<String, Vec<String>>,
    free: VecDeque<String>,
}

impl SlotTable {
    /// Parse the blank/comment-stripped output of `show servers state`
    pub fn parse(lines: &[String]) -> Result<Self> {
        let version = lines
            .first()
            .ok_or_else(|| HaproxyError::protocol("empty state output"))?;
        if version != STATE_VERSION {
            return Err(HaproxyError::protocol(format!(
                "unsupported state format version {}",
                version
            )));
        }

        let mut table = Self::default();
        for line in &lines[1..] {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != STATE_FIELDS {
                return Err(HaproxyError::protocol(format!(
                    "expected {} fields, got {}: {}",
                    STATE_FIELDS,
                    fields.len(),
                    line
                )));
            }
            let name = fields[FIELD_SRV_NAME].to_string();
            let address = fields[FIELD_SRV_ADDR].to_string();
            let active = fields[FIELD_OP_STATE] == OP_STATE_RUNNING
                && fields[FIELD_ADMIN_STATE] == ADMIN_STATE_READY;
            if active {
                table.bound.entry(address).or_default().push(name);
            } else {
                table.free.push_back(name);
            }
        }
        Ok(table)
    }

    /// Addresses currently bound to a ready slot
    pub fn members(&self) -> HashSet<String> {
        self.bound.keys().cloned().collect()
    }

    pub fn free_slots(&self) -> usize {
        self.free.len()
    }

    pub fn is_member(&self, address: &str) -> bool {
        self.bound.contains_key(address)
    }

    fn take_free(&mut self) -> Option<String> {
        self.free.pop_front()
    }

    fn bind(&mut self, address: &str, slot: String) {
        self.bound.entry(address.to_string()).or_default().push(slot);
    }

    fn release(&mut self, address: &str) -> Vec<String> {
        let slots = self.bound.remove(address).unwrap_or_default();
        for slot in &slots {
            self.free.push_back(slot.clone());
        }
        slots
    }
}

/// Control client for one HAProxy instance
#[derive(Debug)]
pub struct HaproxyClient {
    host: String,
    port: u16,
    slots: Option<SlotTable>,
}

impl HaproxyClient {
    pub fn new(host: &str) -> Self {
        Self::with_port(host, RUNTIME_PORT)
    }

    /// Connect to a non-standard runtime port
    pub fn with_port(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            slots: None,
        }
    }

    /// Send one command, read lines until EOF, strip blanks and comments
    pub async fn exec(&self, command: &str) -> Result<Vec<String>> {
        let io = async {
            let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
            stream.write_all(command.as_bytes()).await?;
            stream.write_all(b"\n").await?;

            let mut output = String::new();
            stream.read_to_string(&mut output).await?;
            Ok::<String, std::io::Error>(output)
        };
        let output = tokio::time::timeout(IO_TIMEOUT, io)
            .await
            .map_err(|_| HaproxyError::protocol(format!("timeout executing {:?}", command)))??;

        debug!("haproxy {:?} -> {} bytes", command, output.len());
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }

    /// Read the slot table once; later writes mutate the cached copy
    pub async fn refresh_slots(&mut self) -> Result<&SlotTable> {
        let lines = self.exec(&format!("show servers state {}", BACKEND)).await?;
        let table = SlotTable::parse(&lines)?;
        Ok(self.slots.insert(table))
    }

    fn table_mut(&mut self) -> Result<&mut SlotTable> {
        self.slots
            .as_mut()
            .ok_or_else(|| HaproxyError::protocol("slot table not read yet"))
    }

    /// Addresses currently serving the backend
    pub fn get_members(&self) -> HashSet<String> {
        self.slots
            .as_ref()
            .map(SlotTable::members)
            .unwrap_or_default()
    }

    /// Point a free slot at `address` and mark it ready
    pub async fn add_member(&mut self, address: &str) -> Result<()> {
        let slot = self.table_mut()?.take_free().ok_or_else(|| {
            HaproxyError::NoFreeSlot {
                backend: BACKEND.to_string(),
            }
        })?;

        self.exec(&format!("set server {}/{} addr {}", BACKEND, slot, address))
            .await?;
        self.exec(&format!("set server {}/{} state ready", BACKEND, slot))
            .await?;

        self.table_mut()?.bind(address, slot);
        Ok(())
    }

    /// Put every slot bound to `address` into maintenance
    pub async fn remove_member(&mut self, address: &str) -> Result<()> {
        let slots = self.table_mut()?.release(address);
        for slot in slots {
            self.exec(&format!("set server {}/{} state maint", BACKEND, slot))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_line(name: &str, addr: &str, op: &str, admin: &str) -> String {
        // be_id be_name srv_id srv_name srv_addr srv_op_state
        // srv_admin_state + 12 trailing fields the parser ignores
        format!(
            "3 nodes 1 {} {} {} {} 1 1 0 6 3 4 6 0 0 0 - 80",
            name, addr, op, admin
        )
    }

    #[test]
    fn test_parse_buckets_active_and_free_slots() {
        let lines = vec![
            "1".to_string(),
            state_line("member1", "10.0.0.5", "2", "4"),
            state_line("member2", "127.0.0.1", "0", "5"),
            state_line("member3", "127.0.0.1", "2", "5"),
        ];
        let table = SlotTable::parse(&lines).unwrap();
        assert_eq!(table.members(), HashSet::from(["10.0.0.5".to_string()]));
        assert_eq!(table.free_slots(), 2);
    }

    #[test]
    fn test_parse_rejects_unknown_version() {
        let lines = vec!["2".to_string()];
        assert!(matches!(
            SlotTable::parse(&lines),
            Err(HaproxyError::Protocol(_))
        ));
    }

    #[test]
    fn test_parse_rejects_short_records() {
        let lines = vec!["1".to_string(), "3 nodes 1 member1".to_string()];
        assert!(SlotTable::parse(&lines).is_err());
    }

    #[test]
    fn test_take_free_hands_out_each_slot_once() {
        let lines = vec![
            "1".to_string(),
            state_line("member1", "127.0.0.1", "0", "5"),
            state_line("member2", "127.0.0.1", "0", "5"),
        ];
        let mut table = SlotTable::parse(&lines).unwrap();
        assert_eq!(table.take_free(), Some("member1".to_string()));
        assert_eq!(table.take_free(), Some("member2".to_string()));
        assert_eq!(table.take_free(), None);
    }

    #[test]
    fn test_release_returns_slots_to_free_pool() {
        let lines = vec![
            "1".to_string(),
            state_line("member1", "10.0.0.5", "2", "4"),
        ];
        let mut table = SlotTable::parse(&lines).unwrap();
        assert!(table.is_member("10.0.0.5"));

        let released = table.release("10.0.0.5");
        assert_eq!(released, vec!["member1".to_string()]);
        assert!(!table.is_member("10.0.0.5"));
        assert_eq!(table.free_slots(), 1);
    }
}
