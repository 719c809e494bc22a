//! Parsing of `pcs status` / `crm_mon -1` output for the pacemaker
//! resource-location check.
//!
//! The parser only understands what the check needs: simple resource lines
//! (`<name> (<agent>): <status> [host]`) and the bracketed host lists that
//! Clone, Master/Slave and Docker container sets print.

use regex::Regex;

/// Where a pacemaker resource currently runs, from this host's viewpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceLocation {
    /// Started, on this host.
    LocalStarted,
    /// Started somewhere else; the payload names the host(s).
    RemoteStarted(String),
    /// Present but not `Started`; the payload is the reported status.
    NotStarted(String),
    /// No line mentioned the resource at all.
    Absent,
}

/// Find `resource` in cluster status text and decide where it runs.
///
/// `local_hostname` must be the short hostname (`hostname -s`).
pub fn locate_resource(output: &str, resource: &str, local_hostname: &str) -> ResourceLocation {
    // pcs indents wrapped lines with five spaces; fold them back first
    let folded = output.replace("\n     ", " ");
    for raw_line in folded.lines() {
        let line = raw_line.split_whitespace().collect::<Vec<_>>().join(" ");
        if line.is_empty() {
            continue;
        }
        let (first, remaining) = match line.split_once(' ') {
            Some(pair) => pair,
            None => continue,
        };
        if first == resource {
            return locate_simple(remaining, local_hostname);
        }
        let set_word = match first {
            "Clone" | "Docker" => "Started:",
            "Master/Slave" => "Masters:",
            _ => continue,
        };
        if let Some(location) = locate_in_set(remaining, resource, set_word, local_hostname) {
            return location;
        }
    }
    ResourceLocation::Absent
}

/// `[(<agent>):] <status> [host]` after the resource name was split off.
/// The agent column is absent from some status renderings, so it is only
/// dropped when it actually looks like one.
fn locate_simple(remaining: &str, local_hostname: &str) -> ResourceLocation {
    let mut rest = remaining;
    if let Some((first, tail)) = rest.split_once(' ') {
        if first.starts_with('(') || first.ends_with(':') {
            rest = tail;
        }
    }
    let (status, host) = match rest.split_once(' ') {
        Some((status, host)) => (status, host),
        None => (rest, ""),
    };
    if status != "Started" {
        return ResourceLocation::NotStarted(status.to_string());
    }
    if host != local_hostname {
        return ResourceLocation::RemoteStarted(host.to_string());
    }
    ResourceLocation::LocalStarted
}

/// Clone / Master/Slave / Docker set lines carry the resource name inside a
/// `Set: ...` segment and the started hosts in a bracketed list.
fn locate_in_set(
    remaining: &str,
    resource: &str,
    set_word: &str,
    local_hostname: &str,
) -> Option<ResourceLocation> {
    let resource = regex::escape(resource);
    let pattern = format!(
        r"Set: ({} \[.*\]|.* \[{}\]) {} (\[.*?\])",
        resource, resource, set_word
    );
    let engine = Regex::new(&pattern).ok()?;
    let captures = engine.captures(remaining)?;
    let host_list = captures.get(2)?.as_str();
    let hosts: Vec<&str> = host_list
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split_whitespace()
        .collect();
    if hosts.iter().any(|host| *host == local_hostname) {
        Some(ResourceLocation::LocalStarted)
    } else {
        Some(ResourceLocation::RemoteStarted(host_list.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const PCS_STATUS: &str = "\
Cluster name: openstack
Stack: corosync
Current DC: node-a (version 1.1.16) - partition with quorum

Online: [ node-a node-b node-c ]

Full list of resources:

 vip__public\t(ocf::fuel:ns_IPaddr2):\tStarted node-a
 vip__management\t(ocf::fuel:ns_IPaddr2):\tStarted node-b
 stopped__thing\t(ocf::heartbeat:Dummy):\tStopped
 Clone Set: clone_p_haproxy [p_haproxy] Started: [ node-a node-b ]
 Master/Slave Set: master_rabbit [p_rabbitmq-server] Masters: [ node-b ]
";

    #[test]
    fn started_on_this_node() {
        assert_eq!(
            locate_resource(PCS_STATUS, "vip__public", "node-a"),
            ResourceLocation::LocalStarted
        );
    }

    #[test]
    fn started_somewhere_else() {
        assert_eq!(
            locate_resource(PCS_STATUS, "vip__public", "node-b"),
            ResourceLocation::RemoteStarted("node-a".to_string())
        );
    }

    #[test]
    fn stopped_resources_report_their_status() {
        assert_eq!(
            locate_resource(PCS_STATUS, "stopped__thing", "node-a"),
            ResourceLocation::NotStarted("Stopped".to_string())
        );
    }

    #[test]
    fn unlisted_resources_are_absent() {
        assert_eq!(
            locate_resource(PCS_STATUS, "no_such_resource", "node-a"),
            ResourceLocation::Absent
        );
    }

    #[test]
    fn clone_sets_search_the_started_host_list() {
        assert_eq!(
            locate_resource(PCS_STATUS, "p_haproxy", "node-b"),
            ResourceLocation::LocalStarted
        );
        assert_eq!(
            locate_resource(PCS_STATUS, "p_haproxy", "node-c"),
            ResourceLocation::RemoteStarted("[ node-a node-b ]".to_string())
        );
    }

    #[test]
    fn master_slave_sets_search_the_masters_list() {
        assert_eq!(
            locate_resource(PCS_STATUS, "p_rabbitmq-server", "node-b"),
            ResourceLocation::LocalStarted
        );
        assert_eq!(
            locate_resource(PCS_STATUS, "master_rabbit", "node-a"),
            ResourceLocation::RemoteStarted("[ node-b ]".to_string())
        );
    }

    #[test]
    fn lines_without_an_agent_column_still_parse() {
        let text = "myres Started node-a\n";
        assert_eq!(
            locate_resource(text, "myres", "node-a"),
            ResourceLocation::LocalStarted
        );
        assert_eq!(
            locate_resource(text, "myres", "node-b"),
            ResourceLocation::RemoteStarted("node-a".to_string())
        );
        assert_eq!(
            locate_resource("myres Stopped node-a\n", "myres", "node-a"),
            ResourceLocation::NotStarted("Stopped".to_string())
        );
    }

    #[test]
    fn wrapped_lines_are_folded_before_parsing() {
        let wrapped = " Clone Set: clone_p_haproxy [p_haproxy]\n     Started: [ node-a node-b ]\n";
        assert_eq!(
            locate_resource(wrapped, "p_haproxy", "node-a"),
            ResourceLocation::LocalStarted
        );
    }
}
