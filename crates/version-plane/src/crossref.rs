//! Join between the descriptor links of an `app.k8s.io` Application and the
//! ports declared in the `kots.io` Application. Pure functions, no I/O.
//!
//! The join key is exact string equality of `link.url` and
//! `port.application_url`. `forwarded_ports` is a plain nested-loop join and
//! keeps every match, so two links pointing at the same URL yield the port
//! twice. Callers that want distinct ports must dedup explicitly.
use crate::kinds::{ApplicationDescriptor, ApplicationPort, KotsApplication};
use crate::models::{ForwardedPort, RealizedLink};

fn ports_of(ports: Option<&KotsApplication>) -> &[ApplicationPort] {
    ports.map(|k| k.spec.application_ports.as_slice()).unwrap_or(&[])
}

/// One entry per descriptor link, in descriptor order. A link whose URL matches
/// a declared port is rewritten to `http://localhost:<local_port>`; when several
/// ports match, the last one wins.
pub fn realized_links(descriptor: Option<&ApplicationDescriptor>, ports: Option<&KotsApplication>) -> Vec<RealizedLink> {
    let Some(descriptor) = descriptor else { return Vec::new(); };
    let ports = ports_of(ports);
    descriptor.spec.descriptor.links.iter().map(|link| {
        let uri = ports.iter().rev()
            .find(|p| p.application_url == link.url)
            .map(|p| format!("http://localhost:{}", p.local_port))
            .unwrap_or_else(|| link.url.clone());
        RealizedLink { title: link.description.clone(), uri }
    }).collect()
}

pub fn forwarded_ports(descriptor: Option<&ApplicationDescriptor>, ports: Option<&KotsApplication>) -> Vec<ForwardedPort> {
    let Some(descriptor) = descriptor else { return Vec::new(); };
    let ports = ports_of(ports);
    let mut out = Vec::new();
    for link in &descriptor.spec.descriptor.links {
        for port in ports.iter().filter(|p| p.application_url == link.url) {
            out.push(ForwardedPort {
                service_name: port.service_name.clone(),
                service_port: port.service_port,
                local_port: port.local_port,
                application_url: port.application_url.clone(),
            });
        }
    }
    out
}
