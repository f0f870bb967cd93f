//! Socket inode index, rebuilt from `/proc/net/tcp` every interval.
//!
//! Nodes live in an [`Arena`] and are chained per bucket through absolute
//! addresses, so a growth of the arena means walking every chain and shifting
//! each link by the relocation delta.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::{ProcRoots, SocketRecord, TcpState};
use crate::arena::{Arena, Handle};
use crate::error::{MetricsError, Result};

pub const TABLE_SIZE: usize = 256;

// next:8 inode:8 uid:4 state:4 family:4 lport:4 rport:4 laddr:16 raddr:16
const NODE_SIZE: usize = 68;
const NULL: u64 = 0;

pub fn inode_hash(inode: u64) -> usize {
    (((inode >> 24) ^ (inode >> 16) ^ (inode >> 8) ^ inode) % TABLE_SIZE as u64) as usize
}

/// Reads a whole pseudo-file into one buffer. When the buffer fills before EOF
/// the read is thrown away, the buffer doubled and the file read again from the
/// start, so a table is never assembled from two different kernel snapshots.
pub struct TableReader {
    buf: Vec<u8>,
    capacity: usize,
}

impl TableReader {
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            buf: Vec::new(),
            capacity: initial_capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn read(&mut self, path: &Path) -> io::Result<Cow<'_, str>> {
        loop {
            let mut file = File::open(path)?;
            self.buf.clear();
            self.buf.resize(self.capacity, 0);
            let mut filled = 0;
            let truncated = loop {
                if filled == self.capacity {
                    let mut probe = [0u8; 1];
                    break read_retrying(&mut file, &mut probe)? != 0;
                }
                let n = read_retrying(&mut file, &mut self.buf[filled..])?;
                if n == 0 {
                    break false;
                }
                filled += n;
            };
            if !truncated {
                self.buf.truncate(filled);
                return Ok(String::from_utf8_lossy(&self.buf));
            }
            self.capacity *= 2;
            trace!(path = %path.display(), capacity = self.capacity, "socket table larger than buffer; rereading");
        }
    }
}

fn read_retrying(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        match file.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

fn parse_endpoint(field: &str) -> Option<SocketAddr> {
    let (addr, port) = field.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;
    let ip = match addr.len() {
        8 => {
            let raw = u32::from_str_radix(addr, 16).ok()?;
            IpAddr::V4(Ipv4Addr::from(raw.to_ne_bytes()))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in octets.chunks_mut(4).enumerate() {
                let word = u32::from_str_radix(addr.get(i * 8..i * 8 + 8)?, 16).ok()?;
                chunk.copy_from_slice(&word.to_ne_bytes());
            }
            IpAddr::V6(Ipv6Addr::from(octets))
        }
        _ => return None,
    };
    Some(SocketAddr::new(ip, port))
}

/// Parses one data line of `/proc/net/tcp{,6}`:
/// `sl local rem st tx:rx tr:when retrnsmt uid timeout inode ...`.
pub fn parse_socket_line(line: &str) -> Option<SocketRecord> {
    let mut fields = line.split_whitespace();
    fields.next()?;
    let local = parse_endpoint(fields.next()?)?;
    let remote = parse_endpoint(fields.next()?)?;
    let state = u8::from_str_radix(fields.next()?, 16).ok()?;
    let uid = fields.nth(3)?.parse().ok()?;
    let inode = fields.nth(1)?.parse().ok()?;
    Some(SocketRecord {
        inode,
        uid,
        local,
        remote,
        state: TcpState::from_code(state),
    })
}

fn encode_ip(ip: IpAddr) -> (u32, [u8; 16]) {
    match ip {
        IpAddr::V4(v4) => {
            let mut out = [0u8; 16];
            out[..4].copy_from_slice(&v4.octets());
            (4, out)
        }
        IpAddr::V6(v6) => (6, v6.octets()),
    }
}

fn decode_ip(family: u32, raw: &[u8]) -> IpAddr {
    if family == 4 {
        IpAddr::V4(Ipv4Addr::new(raw[0], raw[1], raw[2], raw[3]))
    } else {
        let mut octets = [0u8; 16];
        octets.copy_from_slice(&raw[..16]);
        IpAddr::V6(Ipv6Addr::from(octets))
    }
}

fn u32_at(b: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&b[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn u64_at(b: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&b[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn encode_node(b: &mut [u8], next: u64, rec: &SocketRecord) {
    let (lfam, laddr) = encode_ip(rec.local.ip());
    let (_, raddr) = encode_ip(rec.remote.ip());
    b[0..8].copy_from_slice(&next.to_le_bytes());
    b[8..16].copy_from_slice(&rec.inode.to_le_bytes());
    b[16..20].copy_from_slice(&rec.uid.to_le_bytes());
    b[20..24].copy_from_slice(&u32::from(rec.state.code()).to_le_bytes());
    b[24..28].copy_from_slice(&lfam.to_le_bytes());
    b[28..32].copy_from_slice(&u32::from(rec.local.port()).to_le_bytes());
    b[32..36].copy_from_slice(&u32::from(rec.remote.port()).to_le_bytes());
    b[36..52].copy_from_slice(&laddr);
    b[52..68].copy_from_slice(&raddr);
}

fn decode_node(b: &[u8]) -> SocketRecord {
    let family = u32_at(b, 24);
    SocketRecord {
        inode: u64_at(b, 8),
        uid: u32_at(b, 16),
        state: TcpState::from_code(u32_at(b, 20) as u8),
        local: SocketAddr::new(decode_ip(family, &b[36..52]), u32_at(b, 28) as u16),
        remote: SocketAddr::new(decode_ip(family, &b[52..68]), u32_at(b, 32) as u16),
    }
}

/// Inode → socket record table for one snapshot.
///
/// Creating the index rewinds the arena; dropping it rewinds the arena again,
/// so nothing survives into the next interval.
pub struct SocketIndex<'a> {
    arena: &'a mut Arena,
    buckets: [u64; TABLE_SIZE],
    len: usize,
}

impl<'a> SocketIndex<'a> {
    pub fn new(arena: &'a mut Arena) -> Self {
        arena.reset();
        Self {
            arena,
            buckets: [NULL; TABLE_SIZE],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn arena_growths(&self) -> u32 {
        self.arena.growths()
    }

    /// Inserts a record. Inode 0 (no owning process) is skipped and reported as `false`.
    pub fn insert(&mut self, rec: &SocketRecord) -> Result<bool> {
        if rec.inode == 0 {
            return Ok(false);
        }
        let handle = self.alloc_node()?;
        let bucket = inode_hash(rec.inode);
        let head = self.buckets[bucket];
        encode_node(self.arena.bytes_mut(handle), head, rec);
        self.buckets[bucket] = self.arena.address_of(handle) as u64;
        self.len += 1;
        Ok(true)
    }

    fn alloc_node(&mut self) -> Result<Handle> {
        loop {
            match self.arena.alloc(NODE_SIZE) {
                Ok(handle) => return Ok(handle),
                Err(exhausted) => {
                    let delta = self.arena.grow()?;
                    debug!(
                        available = exhausted.available,
                        capacity = self.arena.capacity(),
                        delta,
                        "socket arena grown"
                    );
                    self.relocate(delta);
                }
            }
        }
    }

    /// Shifts every stored link by `delta` after the arena moved.
    fn relocate(&mut self, delta: isize) {
        if delta == 0 {
            return;
        }
        let delta = delta as i64;
        for b in 0..TABLE_SIZE {
            if self.buckets[b] == NULL {
                continue;
            }
            self.buckets[b] = self.buckets[b].wrapping_add_signed(delta);
            let mut cursor = self.buckets[b];
            while let Some(handle) = self.arena.handle_at(cursor as usize, NODE_SIZE) {
                let node = self.arena.bytes_mut(handle);
                let next = u64_at(node, 0);
                if next == NULL {
                    break;
                }
                let moved = next.wrapping_add_signed(delta);
                node[0..8].copy_from_slice(&moved.to_le_bytes());
                cursor = moved;
            }
        }
    }

    pub fn find(&self, inode: u64) -> Option<SocketRecord> {
        if inode == 0 {
            return None;
        }
        let mut cursor = self.buckets[inode_hash(inode)];
        while cursor != NULL {
            let handle = self.arena.handle_at(cursor as usize, NODE_SIZE)?;
            let node = self.arena.bytes(handle);
            if u64_at(node, 8) == inode {
                return Some(decode_node(node));
            }
            cursor = u64_at(node, 0);
        }
        None
    }

    /// Loads every data line of a socket table (the first line is the header).
    /// Returns the number of records inserted; unparsable lines are skipped.
    pub fn load_table(&mut self, text: &str) -> Result<usize> {
        let mut inserted = 0;
        let mut malformed = 0;
        for line in text.lines().skip(1) {
            if line.trim().is_empty() {
                continue;
            }
            match parse_socket_line(line) {
                Some(rec) => {
                    if self.insert(&rec)? {
                        inserted += 1;
                    }
                }
                None => malformed += 1,
            }
        }
        if malformed > 0 {
            trace!(malformed, "skipped unparsable socket table lines");
        }
        Ok(inserted)
    }
}

impl Drop for SocketIndex<'_> {
    fn drop(&mut self) {
        self.arena.reset();
    }
}

/// The kernel socket tables and the reusable read buffer.
pub struct SocketSource {
    tcp: PathBuf,
    tcp6: Option<PathBuf>,
    reader: TableReader,
}

impl SocketSource {
    pub fn new(roots: &ProcRoots, read_buffer_bytes: usize) -> Self {
        Self {
            tcp: roots.tcp.clone(),
            tcp6: roots.tcp6.clone(),
            reader: TableReader::new(read_buffer_bytes),
        }
    }

    /// Reads the tables and builds a fresh index in `arena`. The IPv4 table is
    /// mandatory; a missing IPv6 table is skipped.
    pub fn build_index<'a>(&mut self, arena: &'a mut Arena) -> Result<SocketIndex<'a>> {
        let mut index = SocketIndex::new(arena);
        {
            let text = self
                .reader
                .read(&self.tcp)
                .map_err(|source| MetricsError::SocketTable {
                    path: self.tcp.clone(),
                    source,
                })?;
            index.load_table(&text)?;
        }
        if let Some(tcp6) = &self.tcp6 {
            match self.reader.read(tcp6) {
                Ok(text) => {
                    index.load_table(&text)?;
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!(path = %tcp6.display(), "no IPv6 socket table");
                }
                Err(source) => {
                    return Err(MetricsError::SocketTable {
                        path: tcp6.clone(),
                        source,
                    })
                }
            }
        }
        Ok(index)
    }
}
