//! Per-router routing daemon configuration.
//!
//! Each image kind has one renderer turning a blueprint router into the
//! configuration file the daemon reads at startup. Originated networks are
//! announced as /24s.

use crate::topology::{ImageKind, Router};

/// Prefix length originated networks are announced with
pub const NETWORK_PREFIX_LEN: u8 = 24;

/// Render the configuration of `router` for `image`.
pub fn render(image: ImageKind, router: &Router) -> String {
    match image {
        ImageKind::Frr => render_frr(router),
        ImageKind::Bird => render_bird(router),
        ImageKind::Crpd => render_crpd(router),
    }
}

/// File name of a router's configuration inside the topology directory
pub fn config_file_name(idx: u32) -> String {
    format!("node_{idx}.conf")
}

pub fn render_frr(router: &Router) -> String {
    let mut networks = String::new();
    for network in &router.networks {
        networks.push_str(&format!("network {network}/{NETWORK_PREFIX_LEN}\n"));
    }

    let mut neighbors = String::new();
    let mut activate = String::new();
    for neigh in &router.neighbors {
        let ip = neigh.neighbor_ip;
        neighbors.push_str(&format!("neighbor {ip} remote-as {}\n", neigh.remote_as));
        neighbors.push_str(&format!("neighbor {ip} timers 0 0\n"));
        neighbors.push_str(&format!("neighbor {ip} timers connect 240\n"));
        activate.push_str(&format!("neighbor {ip} activate\n"));
    }

    format!(
        "log file /var/log/real/frr.log debugging

router bgp {bgp_as}
bgp router-id {router_id}
no bgp ebgp-requires-policy
no bgp network import-check

{networks}

{neighbors}
bgp bestpath as-path multipath-relax
address-family ipv4 unicast
{activate}
maximum-paths 64
exit-address-family
",
        bgp_as = router.bgp_as,
        router_id = router.bgpid,
    )
}

pub fn render_bird(router: &Router) -> String {
    let mut networks = String::new();
    for (i, network) in router.networks.iter().enumerate() {
        networks.push_str(&format!(
            "protocol static static{n} {{
    ipv4;
    route {network}/{NETWORK_PREFIX_LEN} blackhole;
}}
",
            n = i + 1
        ));
    }

    let mut neighbors = String::new();
    for (i, neigh) in router.neighbors.iter().enumerate() {
        neighbors.push_str(&format!(
            "protocol bgp bgp{n} {{
    local as {local_as};
    neighbor {ip} as {remote_as};
    ipv4 {{
        import all;
        export all;
    }};
    hold time 0;
    startup hold time 65535;
    connect delay time 2;
}}
",
            n = i + 1,
            local_as = router.bgp_as,
            ip = neigh.neighbor_ip,
            remote_as = neigh.remote_as,
        ));
    }

    format!(
        "log \"/var/log/real/bird.log\" all;
router id {router_id};
protocol device {{ scan time 65535; }}

# network config
{networks}
# neighbor config
{neighbors}
",
        router_id = router.bgpid,
    )
}

pub fn render_crpd(router: &Router) -> String {
    let mut interfaces = String::new();
    if !router.neighbors.is_empty() {
        interfaces.push_str("interfaces {\n");
        for (i, neigh) in router.neighbors.iter().enumerate() {
            interfaces.push_str(&format!(
                "    eth{i} {{
        unit 0 {{
            family inet {{
                address {cidr};
            }}
        }}
    }}
",
                cidr = neigh.self_cidr(),
            ));
        }
        interfaces.push('}');
    }

    let mut statics = String::new();
    if !router.networks.is_empty() {
        statics.push_str("    static {\n");
        for network in &router.networks {
            statics.push_str(&format!("        route {network}/{NETWORK_PREFIX_LEN} discard;\n"));
        }
        statics.push_str("    }\n");
    }

    // Hold time is set for the whole BGP block; cRPD derives keepalive from it.
    let mut groups = String::new();
    for neigh in &router.neighbors {
        groups.push_str(&format!(
            "group to_{remote_as} {{
            type external;
            import send-static;
            export send-static;
            neighbor {ip} {{
                peer-as {remote_as};
            }}
        }}
",
            remote_as = neigh.remote_as,
            ip = neigh.neighbor_ip,
        ));
    }

    format!(
        "system {{
    host-name crpd{idx};
}}
{interfaces}
policy-options {{
    policy-statement send-static {{
        term block {{
            from {{
                route-filter 169.0.0.0/8 longer;
            }}
            then reject;
        }}
        term others {{
            then accept;
        }}
    }}
}}
routing-options {{
    autonomous-system {bgp_as};
    maximum-ecmp 64;
    router-id {router_id};
    {statics}
}}
protocols {{
    bgp {{
        multipath;
        hold-time 0;
        {groups}
    }}
}}
policy-options {{
    policy-statement send-static {{
        term 1 {{
            then {{
                accept;
            }}
        }}
    }}
}}
",
        idx = router.idx,
        bgp_as = router.bgp_as,
        router_id = router.bgpid,
    )
}
