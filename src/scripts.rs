//! Documentation about the various checks contained herein
//!
//! Every check prints exactly one line, `<SEVERITY>: <message>` optionally
//! followed by `|key=value` perfdata, and exits 0 (OK), 1 (WARNING),
//! 2 (CRITICAL) or 3 (UNKNOWN). The API checks all take the usual `OS_*`
//! environment variables or the matching `--os-*` flags.
//!
//! # API latency checks
//!
//! - `check-cinder-api`: times a quota-set read against Cinder.
//! - `check-nova-api`: times a flavor list against Nova.
//! - `check-neutron-api`: times a network list against Neutron.
//! - `check-glance-api`: times an image list against Glance.
//! - `check-keystone-api`: times issuing a token against Keystone.
//!
//! Each takes `-w`/`-c` thresholds in seconds (defaults 5/10; Keystone only
//! warns, default 10) and reports `response_time` perfdata:
//!
//! ```plain
//! $ check-nova-api -w 5 -c 10
//! OK: Get flavors, nova API is working: list 7 flavors in 2 seconds.|response_time=2
//! ```
//!
//! # Resource lifecycle checks
//!
//! - `check-cinder-volume`: creates a small test volume, waits for
//!   `available`, deletes it and waits until it is gone.
//! - `check-nova-instance`: same dance for an instance, waiting for
//!   `ACTIVE`; the image, flavor and network are resolved by name first.
//! - `check-neutron-floating-ip`: allocates a floating IP in the external
//!   network and releases it (floating IPs need no ready/gone waits).
//!
//! All three abort with CRITICAL when a leftover resource with the test
//! name (or, for floating IPs, matching the `--floating_ip` regex) already
//! exists, unless `--force_delete` is given, in which case leftovers are
//! deleted asynchronously and only noted in the output. `--timeout` bounds
//! each wait phase; `--endpoint_url` re-points the check at a specific API
//! host while keeping the catalog's path:
//!
//! ```plain
//! $ check-cinder-volume --volume_name monitoring_test --timeout 120
//! OK: Volume created and deleted in 14 seconds (volume_creation_time=1439563523)|time=14
//! ```
//!
//! # Local host checks
//!
//! - `check-process <name>`: CRITICAL unless a process with that name (or
//!   with a first/second argv word whose basename matches, for interpreter
//!   scripts) is running.
//! - `check-amqp <name>`: additionally requires the process to hold an
//!   established TCP connection to port 5672.
//! - `check-pacemaker-resource -r <resource> [-s <script>] [--crm]`: parses
//!   `pcs status` (or `crm_mon -1`) and reports whether the resource is
//!   started on this node; when it is and `-s` is given, the script replaces
//!   the check process.
//!
//! # Capacity and freshness checks
//!
//! - `check-ceilometer-freshness -w <minutes> -c <minutes> [--meter cpu]`:
//!   alerts when the newest sample of a meter is too old, UNKNOWN when the
//!   meter has no samples at all.
//! - `check-ip-pool -w <percent> -c <percent>`: computes how much of the
//!   external network's address space is used by floating IPs and router
//!   gateways.
//! - `check-glance-image-exists [--req_count N] [--req_images name ...]`:
//!   verifies a minimum image count and/or that specific images resolve.
