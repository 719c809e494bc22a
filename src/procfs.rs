//! The slices of `/proc` needed by the process and AMQP checks.
//!
//! Only two questions are answered here: "is a process with this name
//! running?" and "does it hold an established TCP connection to a given
//! remote port?". The process table changes while we read it, so processes
//! that vanish mid-scan are skipped.

use std::fs;
use std::io;
use std::path::Path;

use thiserror::Error;

/// The port an OpenStack service's messaging connection points at.
pub const AMQP_PORT: u16 = 5672;

#[derive(Debug, Error)]
pub enum ProcFsError {
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("unparseable line in {file}: {line}")]
    Malformed { file: &'static str, line: String },
}

pub type Result<T> = std::result::Result<T, ProcFsError>;

/// One running process, as much of it as the checks care about.
#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub pid: i32,
    /// The (possibly truncated) name from `/proc/<pid>/comm`.
    pub comm: String,
    pub cmdline: Vec<String>,
}

impl Process {
    /// Match by exact process name, or by the basename of the first two
    /// command line words: the kernel truncates `comm`, and services started
    /// as `python /usr/bin/nova-api` carry their name in argv[1].
    pub fn matches_name(&self, name: &str) -> bool {
        if self.comm == name {
            return true;
        }
        self.cmdline.iter().take(2).any(|arg| {
            Path::new(arg)
                .file_name()
                .map_or(false, |base| base == name)
        })
    }

    /// The inodes of every socket this process has open.
    pub fn socket_inodes(&self) -> Result<Vec<u64>> {
        let mut inodes = Vec::new();
        for entry in fs::read_dir(format!("/proc/{}/fd", self.pid))? {
            let entry = entry?;
            let target = match fs::read_link(entry.path()) {
                Ok(target) => target,
                // closed between readdir and readlink
                Err(_) => continue,
            };
            if let Some(inode) = socket_inode(&target.to_string_lossy()) {
                inodes.push(inode);
            }
        }
        Ok(inodes)
    }
}

fn socket_inode(link_target: &str) -> Option<u64> {
    link_target
        .strip_prefix("socket:[")?
        .strip_suffix(']')?
        .parse()
        .ok()
}

/// Every process currently visible in `/proc`.
///
/// Individual processes that disappear mid-scan or that we may not read are
/// silently skipped; only a missing `/proc` itself is an error.
pub fn running_processes() -> Result<Vec<Process>> {
    let mut processes = Vec::new();
    for entry in fs::read_dir("/proc")? {
        let entry = entry?;
        let name = entry.file_name();
        let pid: i32 = match name.to_string_lossy().parse() {
            Ok(pid) => pid,
            Err(_) => continue,
        };
        let comm = match fs::read_to_string(format!("/proc/{}/comm", pid)) {
            Ok(comm) => comm.trim_end().to_string(),
            Err(_) => continue,
        };
        let cmdline = match fs::read_to_string(format!("/proc/{}/cmdline", pid)) {
            Ok(raw) => parse_cmdline(&raw),
            Err(_) => continue,
        };
        processes.push(Process { pid, comm, cmdline });
    }
    Ok(processes)
}

fn parse_cmdline(raw: &str) -> Vec<String> {
    raw.split('\0')
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .collect()
}

/// One row of `/proc/net/tcp` or `/proc/net/tcp6`.
#[derive(Debug, Clone, PartialEq)]
pub struct TcpConnection {
    pub local_port: u16,
    pub remote_port: u16,
    pub established: bool,
    pub inode: u64,
}

/// All TCP connections on the host, v4 and v6.
pub fn tcp_connections() -> Result<Vec<TcpConnection>> {
    let mut connections = Vec::new();
    for path in &["/proc/net/tcp", "/proc/net/tcp6"] {
        // tcp6 may be absent on v4-only kernels
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        connections.extend(parse_tcp_table(&content, *path)?);
    }
    Ok(connections)
}

// state 01 is TCP_ESTABLISHED
const TCP_ESTABLISHED: u8 = 1;

fn parse_tcp_table(content: &str, file: &'static str) -> Result<Vec<TcpConnection>> {
    let mut connections = Vec::new();
    for line in content.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        connections.push(parse_tcp_line(line, file)?);
    }
    Ok(connections)
}

fn parse_tcp_line(line: &str, file: &'static str) -> Result<TcpConnection> {
    let malformed = || ProcFsError::Malformed {
        file,
        line: line.to_string(),
    };
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return Err(malformed());
    }
    let local_port = hex_port(fields[1]).ok_or_else(malformed)?;
    let remote_port = hex_port(fields[2]).ok_or_else(malformed)?;
    let state = u8::from_str_radix(fields[3], 16).map_err(|_| malformed())?;
    let inode = fields[9].parse().map_err(|_| malformed())?;
    Ok(TcpConnection {
        local_port,
        remote_port,
        established: state == TCP_ESTABLISHED,
        inode,
    })
}

fn hex_port(address: &str) -> Option<u16> {
    let port = address.rsplit(':').next()?;
    u16::from_str_radix(port, 16).ok()
}

#[cfg(test)]
mod test {
    use super::*;

    fn process(comm: &str, cmdline: &[&str]) -> Process {
        Process {
            pid: 42,
            comm: comm.to_string(),
            cmdline: cmdline.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn matches_exact_comm() {
        assert!(process("nova-api", &["/usr/bin/nova-api"]).matches_name("nova-api"));
        assert!(!process("nova-api", &["/usr/bin/nova-api"]).matches_name("nova-compute"));
    }

    #[test]
    fn matches_interpreter_invoked_scripts() {
        let p = process("python", &["/usr/bin/python", "/usr/bin/cinder-volume", "--debug"]);
        assert!(p.matches_name("cinder-volume"));
        // only argv[0] and argv[1] are considered
        assert!(!p.matches_name("--debug"));
    }

    #[test]
    fn matches_truncated_comm_through_argv0() {
        let p = process("neutron-openvsw", &["/usr/bin/neutron-openvswitch-agent"]);
        assert!(p.matches_name("neutron-openvswitch-agent"));
    }

    #[test]
    fn cmdline_splits_on_nul() {
        assert_eq!(
            parse_cmdline("/usr/bin/python\0/usr/bin/nova-api\0"),
            vec!["/usr/bin/python", "/usr/bin/nova-api"]
        );
        assert!(parse_cmdline("").is_empty());
    }

    #[test]
    fn socket_inode_parses_link_targets() {
        assert_eq!(socket_inode("socket:[12345]"), Some(12345));
        assert_eq!(socket_inode("pipe:[12345]"), None);
        assert_eq!(socket_inode("/dev/null"), None);
    }

    #[test]
    fn parses_a_tcp_table() {
        let table = "\
  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 34143 1 ffff8800b93610c0 100 0 0 10 0
   1: 0A0A0A0A:D431 0B0B0B0B:1628 01 00000000:00000000 00:00000000 00000000   107        0 39217 1 ffff8800b9360000 20 4 30 10 -1
";
        let connections = parse_tcp_table(table, "/proc/net/tcp").unwrap();
        assert_eq!(connections.len(), 2);
        assert!(!connections[0].established);
        assert_eq!(connections[0].local_port, 0x1F90);
        assert!(connections[1].established);
        // 0x1628 is 5672, the AMQP port
        assert_eq!(connections[1].remote_port, AMQP_PORT);
        assert_eq!(connections[1].inode, 39217);
    }

    #[test]
    fn rejects_malformed_tcp_lines() {
        assert!(parse_tcp_table("header\ngarbage line\n", "/proc/net/tcp").is_err());
    }
}
